use crate::core::{FrameCount, FrameHints, OutputFrame, PlayerError, Result};
use crate::player::file_producer::{FileProducer, FileProducerInfo};
use crate::renderer::{RendererProducer, RendererProducerInfo};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;

/// `call` 的异步应答
pub type CallFuture = Pin<Box<dyn Future<Output = Result<String>> + Send>>;

/// 生产者对外报告的信息
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ProducerInfo {
    FileProducer(FileProducerInfo),
    RendererProducer(RendererProducerInfo),
    EmptyProducer,
}

/// 帧生产者
///
/// 通道只通过这个统一接口取帧；不支持的操作返回各自的默认结果。
pub struct Producer {
    inner: ProducerKind,
}

/// 生产者内部类型
enum ProducerKind {
    File(FileProducer),
    Renderer(RendererProducer),
    Empty,
}

impl Producer {
    pub fn file(producer: FileProducer) -> Self {
        Self {
            inner: ProducerKind::File(producer),
        }
    }

    pub fn renderer(producer: RendererProducer) -> Self {
        Self {
            inner: ProducerKind::Renderer(producer),
        }
    }

    /// 始终交付空帧
    pub fn empty() -> Self {
        Self {
            inner: ProducerKind::Empty,
        }
    }

    /// 取下一帧；没有准备好时返回迟到帧
    pub fn receive(&self, hints: FrameHints) -> OutputFrame {
        match &self.inner {
            ProducerKind::File(producer) => producer.receive(hints),
            ProducerKind::Renderer(producer) => producer.receive(hints),
            ProducerKind::Empty => OutputFrame::empty(),
        }
    }

    /// 最近交付的帧，用于替换迟到帧
    pub fn last_frame(&self) -> OutputFrame {
        match &self.inner {
            ProducerKind::File(producer) => producer.last_frame(),
            ProducerKind::Renderer(producer) => producer.last_frame(),
            ProducerKind::Empty => OutputFrame::empty(),
        }
    }

    pub fn seek(&self, frame: u32) -> Result<()> {
        match &self.inner {
            ProducerKind::File(producer) => producer.seek(frame),
            _ => Err(PlayerError::InvalidCommand(format!(
                "{} 不支持 seek",
                self.print()
            ))),
        }
    }

    pub fn nb_frames(&self) -> FrameCount {
        match &self.inner {
            ProducerKind::File(producer) => producer.nb_frames(),
            ProducerKind::Renderer(producer) => producer.nb_frames(),
            ProducerKind::Empty => FrameCount::Finite(0),
        }
    }

    /// 执行运行时命令
    pub fn call(&self, param: &str) -> CallFuture {
        match &self.inner {
            ProducerKind::File(producer) => Box::pin(std::future::ready(producer.call(param))),
            ProducerKind::Renderer(producer) => producer.call(param),
            ProducerKind::Empty => Box::pin(std::future::ready(Err(
                PlayerError::InvalidCommand(param.to_string()),
            ))),
        }
    }

    pub fn info(&self) -> ProducerInfo {
        match &self.inner {
            ProducerKind::File(producer) => ProducerInfo::FileProducer(producer.info()),
            ProducerKind::Renderer(producer) => ProducerInfo::RendererProducer(producer.info()),
            ProducerKind::Empty => ProducerInfo::EmptyProducer,
        }
    }

    pub fn print(&self) -> String {
        match &self.inner {
            ProducerKind::File(producer) => producer.print(),
            ProducerKind::Renderer(producer) => producer.print(),
            ProducerKind::Empty => "empty[]".to_string(),
        }
    }

    /// 生成缩略图；只有文件生产者有内容可取
    pub async fn create_thumbnail_frame(&self) -> Result<OutputFrame> {
        match &self.inner {
            ProducerKind::File(producer) => producer.create_thumbnail_frame().await,
            _ => Ok(OutputFrame::empty()),
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self.inner, ProducerKind::File(_))
    }

    pub fn is_renderer(&self) -> bool {
        matches!(self.inner, ProducerKind::Renderer(_))
    }
}
