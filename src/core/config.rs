use super::error::{PlayerError, Result};
use log::info;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// 播出核心的可调参数
///
/// 所有字段都有默认值，JSON 中只需要写想覆盖的部分。
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PlayoutConfig {
    /// 通道输出格式名称，例如 "1080i5000"
    pub video_mode: String,
    /// 文件生产者的预读队列深度
    pub look_ahead: usize,
    /// 每次 receive 最多尝试的解码迭代次数
    pub max_decode_iterations: usize,
    /// 读包线程到解码器的通道容量
    pub packet_queue_capacity: usize,
    /// 缩略图网格边长（N×N）
    pub thumbnail_grid: u32,
    /// 取指定帧时的最大重试次数
    pub thumbnail_retries: u32,
    /// 每次重试之间的等待（毫秒）
    pub thumbnail_settle_ms: u64,
    /// 渲染器输出队列深度，不设置时按输出帧率选择
    pub renderer_buffer_depth: Option<usize>,
    /// 渲染器连续无输出时的最大重试次数
    pub renderer_idle_retries: u32,
}

impl Default for PlayoutConfig {
    fn default() -> Self {
        Self {
            video_mode: "1080i5000".to_string(),
            look_ahead: 2,
            max_decode_iterations: 16,
            packet_queue_capacity: 32,
            thumbnail_grid: 2,
            thumbnail_retries: 32,
            thumbnail_settle_ms: 40,
            renderer_buffer_depth: None,
            renderer_idle_retries: 4,
        }
    }
}

impl PlayoutConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PlayoutConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// 从 JSON 文件加载
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("📄 加载配置文件: {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.look_ahead == 0 {
            return Err(PlayerError::ConfigurationError("look-ahead 不能为 0".to_string()));
        }
        if self.max_decode_iterations == 0 {
            return Err(PlayerError::ConfigurationError(
                "max-decode-iterations 不能为 0".to_string(),
            ));
        }
        if self.packet_queue_capacity == 0 {
            return Err(PlayerError::ConfigurationError(
                "packet-queue-capacity 不能为 0".to_string(),
            ));
        }
        if self.thumbnail_grid < 1 {
            return Err(PlayerError::ConfigurationError(
                "thumbnail-grid 不能小于 1".to_string(),
            ));
        }
        if self.renderer_buffer_depth == Some(0) {
            return Err(PlayerError::ConfigurationError(
                "renderer-buffer-depth 不能为 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn thumbnail_settle(&self) -> Duration {
        Duration::from_millis(self.thumbnail_settle_ms)
    }

    /// 渲染器输出队列深度：高帧率通道缓冲 4 帧，否则 2 帧
    pub fn renderer_buffer_depth_for(&self, output_fps: f64) -> usize {
        self.renderer_buffer_depth
            .unwrap_or(if output_fps > 30.0 { 4 } else { 2 })
    }
}
