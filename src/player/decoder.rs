use crate::core::{
    log_ctx, AudioFrame, ChannelLayout, FrameRate, OutputFormat, PlayerError, Result, VideoFrame,
    VideoStreamInfo,
};
use crate::player::source_reader::{SourceReader, StreamReceiver};
use log::{debug, info, warn};

/// 视频解码器
///
/// 从读取线程的视频通道取出当前 epoch 的画面，补全缺失的时长。
pub struct VideoDecoder {
    rx: StreamReceiver<VideoFrame>,
    info: VideoStreamInfo,
    nb_frames: Option<u32>,
    decoded: u64,
}

impl VideoDecoder {
    /// 从读取线程取走视频流；媒体源没有视频流时返回 StreamNotFound
    pub fn from_reader(reader: &mut SourceReader) -> Result<Self> {
        let info = reader.video_info().cloned().ok_or_else(|| {
            PlayerError::StreamNotFound(format!("{} 没有视频流", reader.description()))
        })?;
        let rx = reader.take_video_receiver().ok_or_else(|| {
            PlayerError::StreamNotFound(format!("{} 的视频流已被占用", reader.description()))
        })?;

        info!(
            "{} 🎞️ 视频解码器: {}x{} {}{} fps",
            log_ctx(),
            info.width,
            info.height,
            if info.progressive { "p" } else { "i" },
            info.frame_rate
        );

        Ok(Self {
            rx,
            info,
            nb_frames: reader.nb_frames(),
            decoded: 0,
        })
    }

    /// 非阻塞地取出下一个画面
    pub fn poll(&mut self) -> Option<VideoFrame> {
        let mut frame = self.rx.try_next()?;
        if frame.duration <= 0 {
            frame.duration = self.info.frame_rate.frame_duration();
        }
        self.decoded += 1;
        Some(frame)
    }

    /// seek 之后调用；过期单元由 epoch 过滤，这里只记录
    pub fn seek(&mut self, time: i64) {
        debug!(
            "{} 视频解码器 seek 到 {}us（已丢弃 {} 个过期单元）",
            log_ctx(),
            time,
            self.rx.discarded()
        );
    }

    pub fn is_drained(&self) -> bool {
        self.rx.is_drained()
    }

    pub fn width(&self) -> u32 {
        self.info.width
    }

    pub fn height(&self) -> u32 {
        self.info.height
    }

    pub fn frame_rate(&self) -> FrameRate {
        self.info.frame_rate
    }

    pub fn is_progressive(&self) -> bool {
        self.info.progressive
    }

    /// 原生帧总数
    pub fn nb_frames(&self) -> Option<u32> {
        self.nb_frames
    }

    pub fn decoded(&self) -> u64 {
        self.decoded
    }
}

/// 音频解码器
///
/// 把媒体源的音频整理成输出需要的声道布局。
pub struct AudioDecoder {
    rx: StreamReceiver<AudioFrame>,
    source_channels: u16,
    layout: ChannelLayout,
    decoded_samples: u64,
}

impl AudioDecoder {
    /// 从读取线程取走音频流
    ///
    /// `layout` 为 None 时沿用媒体源自身的布局。
    pub fn from_reader(
        reader: &mut SourceReader,
        format: &OutputFormat,
        layout: Option<ChannelLayout>,
    ) -> Result<Self> {
        let info = reader.audio_info().cloned().ok_or_else(|| {
            PlayerError::StreamNotFound(format!("{} 没有音频流", reader.description()))
        })?;
        let rx = reader.take_audio_receiver().ok_or_else(|| {
            PlayerError::StreamNotFound(format!("{} 的音频流已被占用", reader.description()))
        })?;

        if info.sample_rate != format.audio_sample_rate {
            warn!(
                "{} ⚠️ 音频采样率 {} 与输出 {} 不一致，按输出节奏切分",
                log_ctx(),
                info.sample_rate,
                format.audio_sample_rate
            );
        }

        let layout = layout.unwrap_or_else(|| info.layout.clone());
        info!(
            "{} 🔊 音频解码器: {}Hz {} 声道 -> {}",
            log_ctx(),
            info.sample_rate,
            info.channels,
            layout.name
        );

        Ok(Self {
            rx,
            source_channels: info.channels,
            layout,
            decoded_samples: 0,
        })
    }

    /// 非阻塞地取出下一个音频块，并转换到输出布局
    pub fn poll(&mut self) -> Option<AudioFrame> {
        let mut frame = self.rx.try_next()?;
        let from = if frame.channels == 0 {
            self.source_channels
        } else {
            frame.channels
        };
        if from != self.layout.num_channels {
            frame.data = remix_channels(&frame.data, from, self.layout.num_channels);
        }
        frame.channels = self.layout.num_channels;
        frame.layout = self.layout.clone();
        self.decoded_samples += frame.samples_per_channel() as u64;
        Some(frame)
    }

    pub fn seek(&mut self, time: i64) {
        debug!(
            "{} 音频解码器 seek 到 {}us（已丢弃 {} 个过期单元）",
            log_ctx(),
            time,
            self.rx.discarded()
        );
    }

    pub fn is_drained(&self) -> bool {
        self.rx.is_drained()
    }

    pub fn channel_layout(&self) -> &ChannelLayout {
        &self.layout
    }

    pub fn decoded_samples(&self) -> u64 {
        self.decoded_samples
    }
}

/// 声道数转换（交错采样）
///
/// 单声道扩展时复制到所有声道；其他情况多出的声道补零，多余的声道丢弃。
pub fn remix_channels(data: &[f32], from: u16, to: u16) -> Vec<f32> {
    let (from, to) = (from.max(1) as usize, to as usize);
    let frames = data.len() / from;
    let mut out = Vec::with_capacity(frames * to);
    for frame in data.chunks_exact(from) {
        for ch in 0..to {
            let value = if from == 1 {
                frame[0]
            } else if ch < from {
                frame[ch]
            } else {
                0.0
            };
            out.push(value);
        }
    }
    out
}
