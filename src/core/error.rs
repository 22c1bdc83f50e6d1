use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON 错误: {0}")]
    JsonError(#[from] serde_json::Error),

    /// 媒体源中既没有视频流也没有音频流
    #[error("无法找到可用的媒体流: {0}")]
    StreamNotFound(String),

    #[error("无效的命令: {0}")]
    InvalidCommand(String),

    #[error("渲染器错误: {0}")]
    RendererError(String),

    #[error("配置错误: {0}")]
    ConfigurationError(String),

    #[error("媒体源错误: {0}")]
    SourceError(String),

    #[error("工作线程已停止: {0}")]
    WorkerStopped(String),

    #[error("其他错误: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, PlayerError>;
