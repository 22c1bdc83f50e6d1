use serde::{Deserialize, Serialize};
use std::fmt;

/// 原生时间基：微秒
pub const TIME_BASE: i64 = 1_000_000;

/// 像素格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    BGRA,
    RGBA,
    YUV420P,
    NV12,
}

/// 音频采样格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    F32,
    I16,
}

/// 有理数帧率（例如 30000/1001）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRate {
    pub num: u32,
    pub den: u32,
}

impl FrameRate {
    pub const fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    pub fn as_f64(&self) -> f64 {
        if self.den == 0 {
            0.0
        } else {
            self.num as f64 / self.den as f64
        }
    }

    /// 单帧时长（微秒，向下取整）
    pub fn frame_duration(&self) -> i64 {
        if self.num == 0 {
            0
        } else {
            TIME_BASE * self.den as i64 / self.num as i64
        }
    }

    /// 帧号 -> 原生时间（微秒）
    pub fn time_from_frame_number(&self, frame: u32) -> i64 {
        if self.num == 0 {
            0
        } else {
            frame as i64 * TIME_BASE * self.den as i64 / self.num as i64
        }
    }

    /// 原生时间（微秒） -> 帧号，向下取整
    pub fn frame_number_from_time(&self, time: i64) -> u32 {
        if time <= 0 || self.den == 0 {
            return 0;
        }
        let frames = time as i128 * self.num as i128 / (TIME_BASE as i128 * self.den as i128);
        frames.min(u32::MAX as i128) as u32
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.as_f64())
    }
}

/// 声道布局
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelLayout {
    pub name: String,
    pub num_channels: u16,
}

impl ChannelLayout {
    pub fn new(name: &str, num_channels: u16) -> Self {
        Self {
            name: name.to_string(),
            num_channels,
        }
    }

    pub fn mono() -> Self {
        Self::new("MONO", 1)
    }

    pub fn stereo() -> Self {
        Self::new("STEREO", 2)
    }

    /// 按名称查找常用布局（大小写不敏感）
    pub fn by_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "MONO" => Some(Self::mono()),
            "STEREO" => Some(Self::stereo()),
            "DUAL-STEREO" => Some(Self::new("DUAL-STEREO", 4)),
            "SMPTE" => Some(Self::new("SMPTE", 6)),
            "DOLBYE" => Some(Self::new("DOLBYE", 8)),
            _ => None,
        }
    }

    /// 按声道数推断布局
    pub fn for_channels(num_channels: u16) -> Self {
        match num_channels {
            1 => Self::mono(),
            2 => Self::stereo(),
            4 => Self::new("DUAL-STEREO", 4),
            6 => Self::new("SMPTE", 6),
            8 => Self::new("DOLBYE", 8),
            n => Self::new("PASSTHRU", n),
        }
    }
}

/// 解码后的视频帧（DecodedVideoUnit）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoFrame {
    pub pts: i64,           // 显示时间戳（微秒）
    pub duration: i64,      // 帧持续时间（微秒），0 表示未知
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Vec<u8>,      // CPU 内存数据
}

impl VideoFrame {
    /// 空画面，用于没有视频流的媒体源
    pub fn empty() -> Self {
        Self {
            pts: 0,
            duration: 0,
            width: 0,
            height: 0,
            format: PixelFormat::BGRA,
            data: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// 解码后的音频块（DecodedAudioUnit），交错存储
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub pts: i64,           // 显示时间戳（微秒）
    pub sample_rate: u32,
    pub channels: u16,
    pub format: SampleFormat,
    pub layout: ChannelLayout,
    pub data: Vec<f32>,     // 统一使用 f32 格式
}

impl AudioFrame {
    /// 静音块，用于没有音频流的媒体源
    pub fn silence(samples_per_channel: usize, sample_rate: u32, layout: ChannelLayout) -> Self {
        let channels = layout.num_channels;
        Self {
            pts: 0,
            sample_rate,
            channels,
            format: SampleFormat::F32,
            layout,
            data: vec![0.0; samples_per_channel * channels as usize],
        }
    }

    /// 每声道采样数
    pub fn samples_per_channel(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.data.len() / self.channels as usize
        }
    }
}

/// 视频流静态信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoStreamInfo {
    pub width: u32,
    pub height: u32,
    pub frame_rate: FrameRate,
    pub progressive: bool,
}

/// 音频流静态信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioStreamInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub layout: ChannelLayout,
}

/// receive 时携带的提示
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameHints {
    pub deinterlace: bool,
    pub alpha_only: bool,
}

impl FrameHints {
    pub const NONE: FrameHints = FrameHints {
        deinterlace: false,
        alpha_only: false,
    };
}

/// 帧数：有限或无界（循环播放）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameCount {
    Finite(u32),
    Unbounded,
}

impl FrameCount {
    pub fn finite(&self) -> Option<u32> {
        match self {
            FrameCount::Finite(n) => Some(*n),
            FrameCount::Unbounded => None,
        }
    }

    /// 对外报告的数值形式，无界为 -1
    pub fn as_i64(&self) -> i64 {
        match self {
            FrameCount::Finite(n) => *n as i64,
            FrameCount::Unbounded => -1,
        }
    }
}

/// 生产者交付一帧时的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePosition {
    /// 正常交付，携带 FrameIndex
    At(u32),
    /// 媒体源已结束，重复最后一帧（对外报告 -1）
    End,
    /// 暂时没有准备好的帧
    Late,
}

impl FramePosition {
    pub fn index(&self) -> Option<u32> {
        match self {
            FramePosition::At(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> i64 {
        self.index().map(|n| n as i64).unwrap_or(-1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_rate_time_conversion() {
        let pal = FrameRate::new(25, 1);
        assert_eq!(pal.frame_duration(), 40_000);
        assert_eq!(pal.time_from_frame_number(5), 200_000);
        assert_eq!(pal.frame_number_from_time(200_000), 5);
        assert_eq!(pal.frame_number_from_time(219_999), 5);
        assert_eq!(pal.frame_number_from_time(-10), 0);

        let ntsc = FrameRate::new(30000, 1001);
        let t = ntsc.time_from_frame_number(300);
        assert_eq!(ntsc.frame_number_from_time(t), 300);
    }

    #[test]
    fn test_channel_layout_lookup() {
        assert_eq!(ChannelLayout::by_name("stereo"), Some(ChannelLayout::stereo()));
        assert_eq!(ChannelLayout::by_name("smpte").map(|l| l.num_channels), Some(6));
        assert!(ChannelLayout::by_name("quad-ish").is_none());
        assert_eq!(ChannelLayout::for_channels(3).name, "PASSTHRU");
    }

    #[test]
    fn test_frame_count_and_position() {
        assert_eq!(FrameCount::Finite(10).as_i64(), 10);
        assert_eq!(FrameCount::Unbounded.as_i64(), -1);
        assert_eq!(FramePosition::At(3).as_i64(), 3);
        assert_eq!(FramePosition::End.as_i64(), -1);
        assert_eq!(FramePosition::Late.index(), None);
    }

    #[test]
    fn test_silence_block() {
        let block = AudioFrame::silence(1920, 48000, ChannelLayout::stereo());
        assert_eq!(block.data.len(), 3840);
        assert_eq!(block.samples_per_channel(), 1920);
    }
}
