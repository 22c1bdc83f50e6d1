// 渲染器模块：由外部渲染引擎生成画面的生产者

pub mod procedural;
pub mod producer;

use crate::core::{log_ctx, Result, VideoFrame};
use log::debug;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub use procedural::{ProceduralRenderer, ProceduralRendererOptions};
pub use producer::{sync_factor, RendererProducer, RendererProducerInfo};

/// 外部渲染引擎的抽象接口
///
/// 实现方自己维护动画时间；`advance` 每调用一次前进一帧。
pub trait Renderer: Send {
    /// 渲染器自身的帧率
    fn fps(&self) -> f64;

    /// 是否已经可以出图（加载期间返回 false）
    fn is_ready(&mut self) -> bool {
        true
    }

    /// 没有任何内容可以显示（例如模板已经播完）
    fn is_empty(&self) -> bool;

    /// 前进一帧；画面有变化时返回新画面，没有变化时返回 None
    fn advance(&mut self) -> Result<Option<VideoFrame>>;

    /// 转发给渲染引擎的调用
    fn call(&mut self, param: &str) -> Result<String>;

    fn description(&self) -> String;
}

/// 按需创建渲染器实例
pub type RendererFactory = Arc<dyn Fn() -> Result<Box<dyn Renderer>> + Send + Sync>;

/// 渲染器宿主
///
/// 渲染引擎的创建和销毁不可并发，所有渲染器实例都经过这里。
/// 出图过程不持有这把锁。
pub struct RendererHost {
    lifecycle: Mutex<()>,
    created: AtomicU64,
    destroyed: AtomicU64,
}

impl RendererHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            lifecycle: Mutex::new(()),
            created: AtomicU64::new(0),
            destroyed: AtomicU64::new(0),
        })
    }

    pub fn create(&self, factory: &RendererFactory) -> Result<Box<dyn Renderer>> {
        let _guard = self.lifecycle.lock();
        let renderer = factory()?;
        self.created.fetch_add(1, Ordering::Relaxed);
        debug!("{} 🎨 创建渲染器: {}", log_ctx(), renderer.description());
        Ok(renderer)
    }

    pub fn destroy(&self, renderer: Box<dyn Renderer>) {
        let _guard = self.lifecycle.lock();
        debug!("{} 🗑️ 销毁渲染器: {}", log_ctx(), renderer.description());
        drop(renderer);
        self.destroyed.fetch_add(1, Ordering::Relaxed);
    }

    /// 当前存活的渲染器数量
    pub fn live_renderers(&self) -> u64 {
        self.created
            .load(Ordering::Relaxed)
            .saturating_sub(self.destroyed.load(Ordering::Relaxed))
    }

    pub fn created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }
}
