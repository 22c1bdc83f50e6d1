use crate::core::{AudioFrame, AudioStreamInfo, Result, VideoFrame, VideoStreamInfo};

/// 媒体单元类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitType {
    Video,
    Audio,
}

/// 媒体源交出的单元（已解码的画面或音频块）
#[derive(Debug, Clone)]
pub enum MediaUnit {
    Video(VideoFrame),
    Audio(AudioFrame),
}

impl MediaUnit {
    pub fn unit_type(&self) -> UnitType {
        match self {
            MediaUnit::Video(_) => UnitType::Video,
            MediaUnit::Audio(_) => UnitType::Audio,
        }
    }
}

/// Demuxer 数据源抽象接口
///
/// 容器解析和编解码细节都在实现方内部；核心只依赖这里的契约。
/// 不同的媒体源（本地文件、网络流、程序生成的测试信号等）实现这个接口，
/// 由 [`SourceReader`](super::source_reader::SourceReader) 在独立线程中驱动。
pub trait DemuxerSource: Send {
    /// 读取下一个媒体单元
    ///
    /// 返回：
    /// - Ok(Some(unit)): 成功读取一个单元
    /// - Ok(None): 到达文件末尾
    /// - Err(e): 读取错误
    fn read_unit(&mut self) -> Result<Option<MediaUnit>>;

    /// Seek 到指定原生时间（微秒）
    fn seek(&mut self, time: i64) -> Result<()>;

    /// 视频流信息，没有视频流时为 None
    fn video_stream(&self) -> Option<VideoStreamInfo>;

    /// 音频流信息，没有音频流时为 None
    fn audio_stream(&self) -> Option<AudioStreamInfo>;

    /// 原生视频帧总数，未知时为 None
    fn nb_frames(&self) -> Option<u32>;

    /// 是否支持 seek
    fn is_seekable(&self) -> bool {
        true
    }

    /// 获取描述信息（用于日志）
    fn description(&self) -> String;
}
