use crate::core::{
    log_ctx, AudioFrame, ChannelLayout, FrameHints, FrameRate, OutputFormat, OutputFrame,
    SampleFormat, VideoFrame, TIME_BASE,
};
use crate::player::decoder::remix_channels;
use log::{debug, warn};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// 帧率比较的相对容差
const RATE_TOLERANCE: f64 = 0.05;

/// 原生帧率到输出帧率的转换方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    /// 一个原生帧对应一个输出帧
    Simple,
    /// 一个原生帧输出两次（原生帧率约为输出的一半）
    Duplicate,
    /// 两个原生帧交织成一个输出帧（原生帧率约为输出的两倍）
    Interlace,
}

impl DisplayMode {
    /// 根据原生帧率与输出帧率选择转换方式
    pub fn select(native_fps: f64, output_fps: f64) -> Self {
        if native_fps <= 0.0 || output_fps <= 0.0 {
            return DisplayMode::Simple;
        }
        let ratio = native_fps / output_fps;
        if (ratio - 2.0).abs() < 2.0 * RATE_TOLERANCE {
            DisplayMode::Interlace
        } else if (ratio - 0.5).abs() < 0.5 * RATE_TOLERANCE {
            DisplayMode::Duplicate
        } else {
            DisplayMode::Simple
        }
    }

    /// 原生帧数换算为输出帧数
    pub fn calc_nb_frames(&self, native: u32) -> u32 {
        match self {
            DisplayMode::Simple => native,
            DisplayMode::Duplicate => native.saturating_mul(2),
            DisplayMode::Interlace => native / 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayMode::Simple => "simple",
            DisplayMode::Duplicate => "duplicate",
            DisplayMode::Interlace => "interlace",
        }
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 帧复用器（Frame Muxer）
///
/// 把原生帧率的画面和任意大小的音频块配对成输出帧：
/// - 画面按 [`DisplayMode`] 做一对一、重复或交织
/// - 每个输出帧按输出格式的音频节奏取走固定数量的采样，剩余采样留给下一帧
pub struct FrameMuxer {
    format: OutputFormat,
    mode: DisplayMode,
    layout: ChannelLayout,

    video_queue: VecDeque<(Arc<VideoFrame>, FrameHints)>,
    audio_samples: VecDeque<f32>,
    audio_clock: i64,
    cadence_pos: usize,

    frame_buffer: VecDeque<OutputFrame>,
    /// 尚待丢弃的输出帧数
    skip: usize,
    produced: u64,
}

impl FrameMuxer {
    /// `native_rate` 为 None 表示没有视频流，始终一对一输出
    pub fn new(
        native_rate: Option<FrameRate>,
        format: &OutputFormat,
        layout: ChannelLayout,
    ) -> Self {
        let native_fps = native_rate.map(|r| r.as_f64()).unwrap_or(0.0);
        let mode = DisplayMode::select(native_fps, format.fps());
        debug!(
            "{} 帧复用器: 原生 {:.2} fps -> 输出 {} ({})",
            log_ctx(),
            native_fps,
            format.name,
            mode
        );

        Self {
            format: format.clone(),
            mode,
            layout,
            video_queue: VecDeque::new(),
            audio_samples: VecDeque::new(),
            audio_clock: 0,
            cadence_pos: 0,
            frame_buffer: VecDeque::new(),
            skip: 0,
            produced: 0,
        }
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn channel_layout(&self) -> &ChannelLayout {
        &self.layout
    }

    /// 原生帧数换算为输出帧数
    pub fn calc_nb_frames(&self, native: u32) -> u32 {
        self.mode.calc_nb_frames(native)
    }

    /// 推入一个画面；None 不做任何事
    pub fn push_video(&mut self, video: Option<VideoFrame>, hints: FrameHints) {
        if let Some(video) = video {
            self.video_queue.push_back((Arc::new(video), hints));
        }
    }

    /// 推入一个音频块；None 不做任何事
    pub fn push_audio(&mut self, audio: Option<AudioFrame>) {
        let Some(audio) = audio else {
            return;
        };
        let channels = self.layout.num_channels;
        let data = if audio.channels != channels {
            warn!(
                "{} ⚠️ 音频块声道数 {} 与输出布局 {} 不一致，已转换",
                log_ctx(),
                audio.channels,
                self.layout.name
            );
            remix_channels(&audio.data, audio.channels, channels)
        } else {
            audio.data
        };
        if self.audio_samples.is_empty() {
            self.audio_clock = audio.pts;
        }
        self.audio_samples.extend(data);
    }

    fn video_units_needed(&self) -> usize {
        match self.mode {
            DisplayMode::Interlace => 2,
            _ => 1,
        }
    }

    fn cadence_at(&self, offset: usize) -> usize {
        let cadence = &self.format.audio_cadence;
        if cadence.is_empty() {
            return 0;
        }
        cadence[(self.cadence_pos + offset) % cadence.len()] as usize
    }

    /// 下一步输出需要的每声道采样数
    pub fn audio_samples_needed(&self) -> usize {
        match self.mode {
            DisplayMode::Duplicate => self.cadence_at(0) + self.cadence_at(1),
            _ => self.cadence_at(0),
        }
    }

    pub fn video_ready(&self) -> bool {
        self.video_queue.len() >= self.video_units_needed()
    }

    pub fn audio_ready(&self) -> bool {
        self.audio_samples.len() >= self.audio_samples_needed() * self.layout.num_channels as usize
    }

    /// 缓冲中剩余的每声道采样数
    pub fn buffered_audio_samples(&self) -> usize {
        self.audio_samples.len() / self.layout.num_channels.max(1) as usize
    }

    /// 没有可输出的内容
    pub fn is_empty(&self) -> bool {
        self.frame_buffer.is_empty() && !(self.video_ready() && self.audio_ready())
    }

    /// 取出下一个输出帧
    pub fn poll(&mut self) -> Option<OutputFrame> {
        loop {
            if self.frame_buffer.is_empty() && !self.generate() {
                return None;
            }
            let frame = self.frame_buffer.pop_front()?;
            if self.skip > 0 {
                self.skip -= 1;
                continue;
            }
            self.produced += 1;
            return Some(frame);
        }
    }

    /// 用队列中的画面和音频生成下一组输出帧
    fn generate(&mut self) -> bool {
        if !self.video_ready() || !self.audio_ready() {
            return false;
        }

        match self.mode {
            DisplayMode::Simple => {
                let Some((video, hints)) = self.video_queue.pop_front() else {
                    return false;
                };
                let audio = self.take_audio();
                self.frame_buffer.push_back(OutputFrame::new(video, audio, hints));
            }
            DisplayMode::Duplicate => {
                let Some((video, hints)) = self.video_queue.pop_front() else {
                    return false;
                };
                let first = self.take_audio();
                let second = self.take_audio();
                self.frame_buffer
                    .push_back(OutputFrame::new(video.clone(), first, hints));
                self.frame_buffer.push_back(OutputFrame::new(video, second, hints));
            }
            DisplayMode::Interlace => {
                let (Some((first, hints)), Some((second, _))) =
                    (self.video_queue.pop_front(), self.video_queue.pop_front())
                else {
                    return false;
                };
                let audio = self.take_audio();
                self.frame_buffer.push_back(OutputFrame::interlace(
                    first,
                    second,
                    self.format.field_mode,
                    audio,
                    hints,
                ));
            }
        }

        true
    }

    /// 按节奏取走一帧的音频
    fn take_audio(&mut self) -> Option<Arc<AudioFrame>> {
        let samples = self.cadence_at(0);
        let cadence_len = self.format.audio_cadence.len().max(1);
        self.cadence_pos = (self.cadence_pos + 1) % cadence_len;

        let channels = self.layout.num_channels;
        let count = (samples * channels as usize).min(self.audio_samples.len());
        let data: Vec<f32> = self.audio_samples.drain(..count).collect();

        let pts = self.audio_clock;
        let sample_rate = self.format.audio_sample_rate.max(1);
        self.audio_clock += samples as i64 * TIME_BASE / sample_rate as i64;

        Some(Arc::new(AudioFrame {
            pts,
            sample_rate,
            channels,
            format: SampleFormat::F32,
            layout: self.layout.clone(),
            data,
        }))
    }

    /// 清空所有状态（seek 时调用）
    pub fn clear(&mut self) {
        self.video_queue.clear();
        self.audio_samples.clear();
        self.frame_buffer.clear();
        self.skip = 0;
        self.cadence_pos = 0;
        self.audio_clock = 0;
    }

    /// 丢弃接下来生成的 `count` 个输出帧（含音频）
    ///
    /// 重复模式下 seek 到奇数帧号时，第一对的前一帧已经不属于目标位置。
    pub fn skip_frames(&mut self, count: usize) {
        self.skip = count;
    }

    /// 已交付的输出帧数
    pub fn produced(&self) -> u64 {
        self.produced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PixelFormat;

    fn video(pts: i64) -> VideoFrame {
        VideoFrame {
            pts,
            duration: 0,
            width: 4,
            height: 4,
            format: PixelFormat::BGRA,
            data: vec![0; 64],
        }
    }

    fn audio(samples: usize, layout: &ChannelLayout) -> AudioFrame {
        AudioFrame::silence(samples, 48000, layout.clone())
    }

    #[test]
    fn test_mode_selection() {
        assert_eq!(DisplayMode::select(50.0, 25.0), DisplayMode::Interlace);
        assert_eq!(DisplayMode::select(59.94, 29.97), DisplayMode::Interlace);
        assert_eq!(DisplayMode::select(25.0, 50.0), DisplayMode::Duplicate);
        assert_eq!(DisplayMode::select(25.0, 25.0), DisplayMode::Simple);
        assert_eq!(DisplayMode::select(29.97, 25.0), DisplayMode::Simple);
        assert_eq!(DisplayMode::select(0.0, 25.0), DisplayMode::Simple);
    }

    #[test]
    fn test_calc_nb_frames() {
        assert_eq!(DisplayMode::Interlace.calc_nb_frames(101), 50);
        assert_eq!(DisplayMode::Duplicate.calc_nb_frames(10), 20);
        assert_eq!(DisplayMode::Simple.calc_nb_frames(10), 10);
        assert_eq!(DisplayMode::Duplicate.calc_nb_frames(u32::MAX), u32::MAX);
    }

    #[test]
    fn test_simple_pairs_one_to_one() {
        let format = OutputFormat::by_name("1080p2500").unwrap();
        let layout = ChannelLayout::stereo();
        let mut muxer = FrameMuxer::new(Some(FrameRate::new(25, 1)), &format, layout.clone());

        assert!(muxer.poll().is_none());
        muxer.push_video(Some(video(0)), FrameHints::NONE);
        assert!(muxer.poll().is_none());
        muxer.push_audio(Some(audio(1920, &layout)));

        let frame = muxer.poll().unwrap();
        assert!(frame.video().is_some());
        assert_eq!(frame.audio_samples(), 1920);
        assert!(muxer.poll().is_none());
        assert_eq!(muxer.produced(), 1);
    }

    #[test]
    fn test_duplicate_reuses_picture() {
        let format = OutputFormat::by_name("720p5000").unwrap();
        let layout = ChannelLayout::stereo();
        let mut muxer = FrameMuxer::new(Some(FrameRate::new(25, 1)), &format, layout.clone());
        assert_eq!(muxer.mode(), DisplayMode::Duplicate);
        assert_eq!(muxer.audio_samples_needed(), 1920);

        muxer.push_video(Some(video(0)), FrameHints::NONE);
        muxer.push_audio(Some(audio(1920, &layout)));
        let first = muxer.poll().unwrap();
        let second = muxer.poll().unwrap();
        assert!(first.same_picture(&second));
        assert_eq!(first.audio_samples(), 960);
        assert_eq!(second.audio_samples(), 960);
        assert_eq!(second.audio().unwrap().pts, 20_000);
        assert!(muxer.poll().is_none());
        assert_eq!(muxer.produced(), 2);
    }

    #[test]
    fn test_skip_frames_drops_first_copy() {
        let format = OutputFormat::by_name("720p5000").unwrap();
        let layout = ChannelLayout::stereo();
        let mut muxer = FrameMuxer::new(Some(FrameRate::new(25, 1)), &format, layout.clone());

        muxer.skip_frames(1);
        muxer.push_video(Some(video(0)), FrameHints::NONE);
        muxer.push_audio(Some(audio(1920, &layout)));
        let frame = muxer.poll().unwrap();
        assert_eq!(frame.video().unwrap().pts, 0);
        assert_eq!(frame.audio().unwrap().pts, 20_000);
        assert!(muxer.poll().is_none());
        assert_eq!(muxer.produced(), 1);

        muxer.push_video(Some(video(40_000)), FrameHints::NONE);
        muxer.push_audio(Some(audio(1920, &layout)));
        assert_eq!(muxer.poll().unwrap().video().unwrap().pts, 40_000);
        assert_eq!(muxer.poll().unwrap().video().unwrap().pts, 40_000);
        assert_eq!(muxer.produced(), 3);
    }

    #[test]
    fn test_interlace_combines_pairs() {
        let format = OutputFormat::by_name("1080i5000").unwrap();
        let layout = ChannelLayout::stereo();
        let mut muxer = FrameMuxer::new(Some(FrameRate::new(50, 1)), &format, layout.clone());
        assert_eq!(muxer.mode(), DisplayMode::Interlace);

        let mut frames = Vec::new();
        for i in 0..10 {
            muxer.push_video(Some(video(i * 20_000)), FrameHints::NONE);
            if !muxer.audio_ready() {
                muxer.push_audio(Some(audio(1920, &layout)));
            }
            while let Some(frame) = muxer.poll() {
                frames.push(frame);
            }
        }
        assert_eq!(frames.len(), 5);
        for (i, frame) in frames.iter().enumerate() {
            let (first, second, mode) = frame.fields().unwrap();
            assert_eq!(first.pts, i as i64 * 40_000);
            assert_eq!(second.pts, i as i64 * 40_000 + 20_000);
            assert_eq!(mode, format.field_mode);
            assert_eq!(frame.audio_samples(), 1920);
        }
    }

    #[test]
    fn test_cadence_conserves_samples() {
        let format = OutputFormat::by_name("1080p2997").unwrap();
        let layout = ChannelLayout::stereo();
        let mut muxer =
            FrameMuxer::new(Some(FrameRate::new(30000, 1001)), &format, layout.clone());

        let mut pushed = 0usize;
        let mut counts = Vec::new();
        while counts.len() < 20 {
            if !muxer.video_ready() {
                muxer.push_video(Some(video(0)), FrameHints::NONE);
            }
            if !muxer.audio_ready() {
                muxer.push_audio(Some(audio(1000, &layout)));
                pushed += 1000;
            }
            if let Some(frame) = muxer.poll() {
                counts.push(frame.audio_samples());
            }
        }

        let expected: Vec<usize> = format
            .audio_cadence
            .iter()
            .cycle()
            .take(20)
            .map(|&n| n as usize)
            .collect();
        assert_eq!(counts, expected);
        let consumed: usize = counts.iter().sum();
        assert_eq!(consumed + muxer.buffered_audio_samples(), pushed);
    }

    #[test]
    fn test_silence_fills_missing_audio() {
        let format = OutputFormat::by_name("1080i5000").unwrap();
        let layout = ChannelLayout::stereo();
        let mut muxer = FrameMuxer::new(None, &format, layout.clone());

        muxer.push_video(Some(VideoFrame::empty()), FrameHints::NONE);
        assert!(!muxer.audio_ready());
        let needed = muxer.audio_samples_needed();
        muxer.push_audio(Some(AudioFrame::silence(needed, 48000, layout)));

        let frame = muxer.poll().unwrap();
        assert!(frame.video().is_none());
        assert_eq!(frame.audio_samples(), 1920);
    }

    #[test]
    fn test_clear_resets_state() {
        let format = OutputFormat::by_name("1080p2997").unwrap();
        let layout = ChannelLayout::stereo();
        let mut muxer =
            FrameMuxer::new(Some(FrameRate::new(30000, 1001)), &format, layout.clone());

        muxer.push_video(Some(video(0)), FrameHints::NONE);
        muxer.push_audio(Some(audio(4000, &layout)));
        assert_eq!(muxer.poll().unwrap().audio_samples(), 1602);
        assert_eq!(muxer.audio_samples_needed(), 1601);

        muxer.push_video(Some(video(1)), FrameHints::NONE);
        muxer.clear();
        assert!(!muxer.video_ready());
        assert_eq!(muxer.buffered_audio_samples(), 0);
        assert_eq!(muxer.audio_samples_needed(), 1602);
        assert!(muxer.is_empty());
    }

    #[test]
    fn test_mismatched_channels_are_remixed() {
        let format = OutputFormat::by_name("1080p2500").unwrap();
        let mut muxer =
            FrameMuxer::new(Some(FrameRate::new(25, 1)), &format, ChannelLayout::stereo());
        muxer.push_video(Some(video(0)), FrameHints::NONE);
        muxer.push_audio(Some(AudioFrame::silence(1920, 48000, ChannelLayout::mono())));
        let frame = muxer.poll().unwrap();
        assert_eq!(frame.audio().unwrap().channels, 2);
        assert_eq!(frame.audio_samples(), 1920);
    }
}
