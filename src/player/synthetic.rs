use crate::core::{
    AudioFrame, AudioStreamInfo, ChannelLayout, FrameRate, PixelFormat, Result, SampleFormat,
    VideoFrame, VideoStreamInfo, TIME_BASE,
};
use crate::player::demuxer_source::{DemuxerSource, MediaUnit};
use std::thread;
use std::time::Duration;

/// 测试信号源参数
#[derive(Debug, Clone)]
pub struct SyntheticSourceOptions {
    pub name: String,
    pub frame_rate: FrameRate,
    /// None 表示无限长
    pub nb_frames: Option<u32>,
    pub width: u32,
    pub height: u32,
    pub has_video: bool,
    pub has_audio: bool,
    pub sample_rate: u32,
    pub channels: u16,
    /// 每个原生帧的模拟读取耗时
    pub unit_delay: Duration,
    /// 视频结束后额外输出的纯音频块数（音频比视频长）
    pub audio_tail: u32,
}

impl Default for SyntheticSourceOptions {
    fn default() -> Self {
        Self {
            name: "bars".to_string(),
            frame_rate: FrameRate::new(25, 1),
            nb_frames: Some(250),
            width: 64,
            height: 36,
            has_video: true,
            has_audio: true,
            sample_rate: 48000,
            channels: 2,
            unit_delay: Duration::ZERO,
            audio_tail: 0,
        }
    }
}

/// 程序生成的媒体源：彩条画面 + 正弦音
///
/// 每个画面的前 4 个字节写入原生帧号（小端），测试用 [`frame_index`] 读回。
/// 音频按帧间隔精确切分，总采样数不随帧率取整漂移。
pub struct SyntheticSource {
    options: SyntheticSourceOptions,
    next_frame: u32,
    pending_audio: Option<AudioFrame>,
}

impl SyntheticSource {
    pub fn new(options: SyntheticSourceOptions) -> Self {
        Self {
            options,
            next_frame: 0,
            pending_audio: None,
        }
    }

    /// 第 frame 帧开始时已经输出的每声道采样数
    fn samples_before(&self, frame: u32) -> u64 {
        let rate = self.options.frame_rate;
        if rate.num == 0 {
            return 0;
        }
        frame as u64 * self.options.sample_rate as u64 * rate.den as u64 / rate.num as u64
    }

    fn make_video(&self, frame: u32) -> VideoFrame {
        let width = self.options.width.max(1);
        let height = self.options.height.max(1);
        let mut data = vec![0u8; (width * height * 4) as usize];
        let shade = (frame % 256) as u8;
        for (i, pixel) in data.chunks_exact_mut(4).enumerate() {
            let bar = (i as u32 % width) * 8 / width;
            pixel[0] = (bar * 32) as u8;
            pixel[1] = shade;
            pixel[2] = 255 - (bar * 32) as u8;
            pixel[3] = 255;
        }
        data[..4].copy_from_slice(&frame.to_le_bytes());

        VideoFrame {
            pts: self.options.frame_rate.time_from_frame_number(frame),
            duration: self.options.frame_rate.frame_duration(),
            width,
            height,
            format: PixelFormat::BGRA,
            data,
        }
    }

    fn make_audio(&self, frame: u32) -> AudioFrame {
        let first = self.samples_before(frame);
        let count = (self.samples_before(frame + 1) - first) as usize;
        let channels = self.options.channels.max(1);
        let sample_rate = self.options.sample_rate;
        let mut data = Vec::with_capacity(count * channels as usize);
        for n in 0..count {
            let t = (first + n as u64) as f32 / sample_rate.max(1) as f32;
            let value = (t * 1000.0 * std::f32::consts::TAU).sin() * 0.1;
            data.extend(std::iter::repeat(value).take(channels as usize));
        }
        AudioFrame {
            pts: (first as i64 * TIME_BASE) / sample_rate.max(1) as i64,
            sample_rate,
            channels,
            format: SampleFormat::F32,
            layout: ChannelLayout::for_channels(channels),
            data,
        }
    }
}

impl DemuxerSource for SyntheticSource {
    fn read_unit(&mut self) -> Result<Option<MediaUnit>> {
        if let Some(audio) = self.pending_audio.take() {
            return Ok(Some(MediaUnit::Audio(audio)));
        }
        if let Some(total) = self.options.nb_frames {
            if self.next_frame >= total {
                let tail_end = total.saturating_add(self.options.audio_tail);
                if !self.options.has_audio || self.next_frame >= tail_end {
                    return Ok(None);
                }
                let frame = self.next_frame;
                self.next_frame += 1;
                return Ok(Some(MediaUnit::Audio(self.make_audio(frame))));
            }
        }
        if !self.options.has_video && !self.options.has_audio {
            return Ok(None);
        }
        if !self.options.unit_delay.is_zero() {
            thread::sleep(self.options.unit_delay);
        }

        let frame = self.next_frame;
        self.next_frame += 1;

        let audio = self.options.has_audio.then(|| self.make_audio(frame));
        if self.options.has_video {
            self.pending_audio = audio;
            Ok(Some(MediaUnit::Video(self.make_video(frame))))
        } else {
            Ok(audio.map(MediaUnit::Audio))
        }
    }

    fn seek(&mut self, time: i64) -> Result<()> {
        let mut frame = self.options.frame_rate.frame_number_from_time(time);
        if let Some(total) = self.options.nb_frames {
            frame = frame.min(total);
        }
        self.next_frame = frame;
        self.pending_audio = None;
        Ok(())
    }

    fn video_stream(&self) -> Option<VideoStreamInfo> {
        self.options.has_video.then(|| VideoStreamInfo {
            width: self.options.width.max(1),
            height: self.options.height.max(1),
            frame_rate: self.options.frame_rate,
            progressive: true,
        })
    }

    fn audio_stream(&self) -> Option<AudioStreamInfo> {
        self.options.has_audio.then(|| AudioStreamInfo {
            sample_rate: self.options.sample_rate,
            channels: self.options.channels.max(1),
            layout: ChannelLayout::for_channels(self.options.channels.max(1)),
        })
    }

    fn nb_frames(&self) -> Option<u32> {
        if self.options.has_video {
            self.options.nb_frames
        } else {
            None
        }
    }

    fn description(&self) -> String {
        format!("synthetic://{}", self.options.name)
    }
}

/// 读回测试画面里写入的原生帧号
pub fn frame_index(frame: &VideoFrame) -> Option<u32> {
    let bytes: [u8; 4] = frame.data.get(..4)?.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alternates_video_and_audio() {
        let mut source = SyntheticSource::new(SyntheticSourceOptions {
            nb_frames: Some(2),
            ..Default::default()
        });
        let mut kinds = Vec::new();
        while let Some(unit) = source.read_unit().unwrap() {
            kinds.push(unit.unit_type());
        }
        use crate::player::demuxer_source::UnitType::*;
        assert_eq!(kinds, vec![Video, Audio, Video, Audio]);
    }

    #[test]
    fn test_audio_tail_outlasts_video() {
        let mut source = SyntheticSource::new(SyntheticSourceOptions {
            nb_frames: Some(2),
            audio_tail: 3,
            ..Default::default()
        });
        let mut kinds = Vec::new();
        while let Some(unit) = source.read_unit().unwrap() {
            kinds.push(unit.unit_type());
        }
        use crate::player::demuxer_source::UnitType::*;
        assert_eq!(kinds, vec![Video, Audio, Video, Audio, Audio, Audio, Audio]);
    }

    #[test]
    fn test_audio_split_is_exact() {
        let mut source = SyntheticSource::new(SyntheticSourceOptions {
            frame_rate: FrameRate::new(30000, 1001),
            nb_frames: Some(5),
            has_video: false,
            ..Default::default()
        });
        let mut total = 0;
        while let Some(MediaUnit::Audio(block)) = source.read_unit().unwrap() {
            total += block.samples_per_channel();
        }
        assert_eq!(total, 8008);
    }

    #[test]
    fn test_seek_and_frame_index() {
        let mut source = SyntheticSource::new(SyntheticSourceOptions::default());
        source.seek(FrameRate::new(25, 1).time_from_frame_number(42)).unwrap();
        match source.read_unit().unwrap() {
            Some(MediaUnit::Video(frame)) => {
                assert_eq!(frame_index(&frame), Some(42));
                assert_eq!(frame.pts, 1_680_000);
            }
            _ => panic!("应该读到视频帧"),
        }
    }
}
