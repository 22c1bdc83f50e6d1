use super::{Renderer, RendererFactory, RendererHost};
use crate::core::{
    log_ctx, FieldMode, FrameCount, FrameHints, FrameTimer, OutputFormat, OutputFrame,
    PlayerError, PlayoutConfig, Result,
};
use crate::player::muxer::DisplayMode;
use crate::player::producer::CallFuture;
use crate::player::worker::Worker;
use crossbeam::queue::ArrayQueue;
use log::{debug, error, info, warn};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// 只初始化渲染器、不转发给渲染引擎的调用
pub const START_RENDERING: &str = "start_rendering";

const SYNC_EPSILON: f64 = 0.00001;
const IDLE_WAIT: Duration = Duration::from_millis(10);

/// 自适应节奏系数
///
/// r 为输出队列的填充比例（按 `buffer_size - 1` 计，截断到 1），
/// 返回 `2r - r²`：队列越空等待越短，满队列时按实时速度出图。
pub fn sync_factor(buffered: usize, buffer_size: usize) -> f64 {
    let capacity = buffer_size.saturating_sub(1).max(1) as f64;
    let ratio = (buffered as f64 / capacity).min(1.0);
    2.0 * ratio - ratio * ratio
}

/// 把两个渲染帧合成一个隔行帧；任一帧没有画面时直接使用第一帧
fn interlace_frames(
    first: &OutputFrame,
    second: &OutputFrame,
    field_mode: FieldMode,
) -> OutputFrame {
    match (first.video(), second.video()) {
        (Some(a), Some(b)) => {
            OutputFrame::interlace(a.clone(), b.clone(), field_mode, None, FrameHints::NONE)
        }
        _ => first.clone(),
    }
}

/// 一个存活的渲染器实例及其节奏状态
struct RenderSession {
    renderer: Option<Box<dyn Renderer>>,
    host: Arc<RendererHost>,
    timer: FrameTimer,
    head: OutputFrame,
    fallback_fps: f64,
}

impl RenderSession {
    fn new(host: Arc<RendererHost>, factory: &RendererFactory, fallback_fps: f64) -> Result<Self> {
        let renderer = host.create(factory)?;
        let mut session = Self {
            renderer: Some(renderer),
            host,
            timer: FrameTimer::new(),
            head: OutputFrame::late(),
            fallback_fps,
        };
        session.render_frame(0.0)?;
        Ok(session)
    }

    fn fps(&self) -> f64 {
        match self.renderer.as_ref().map(|r| r.fps()) {
            Some(fps) if fps.is_finite() && fps > 0.0 => fps,
            _ => self.fallback_fps,
        }
    }

    fn is_empty(&self) -> bool {
        self.renderer.as_ref().map_or(true, |r| r.is_empty())
    }

    /// 渲染一帧；sync 为本帧等待时长相对于一个帧间隔的比例
    fn render_frame(&mut self, sync: f64) -> Result<OutputFrame> {
        let frame_time = 1.0 / self.fps();
        let Some(renderer) = self.renderer.as_mut() else {
            return Err(PlayerError::RendererError("渲染器已销毁".to_string()));
        };

        if !renderer.is_ready() {
            return Ok(self.head.clone());
        }
        if renderer.is_empty() {
            return Ok(OutputFrame::empty());
        }

        if sync > SYNC_EPSILON {
            if let Ok(period) = Duration::try_from_secs_f64(frame_time * sync) {
                self.timer.tick(period);
            }
        }

        if let Some(image) = renderer.advance()? {
            self.head = OutputFrame::new(Arc::new(image), None, FrameHints::NONE);
        }
        Ok(self.head.clone())
    }

    fn call(&mut self, param: &str) -> Result<String> {
        match self.renderer.as_mut() {
            Some(renderer) => renderer.call(param),
            None => Err(PlayerError::RendererError("渲染器已销毁".to_string())),
        }
    }
}

impl Drop for RenderSession {
    fn drop(&mut self) {
        if let Some(renderer) = self.renderer.take() {
            self.host.destroy(renderer);
        }
    }
}

/// 工作线程独占的渲染状态
struct RendererState {
    name: String,
    format: OutputFormat,
    factory: RendererFactory,
    host: Arc<RendererHost>,
    session: Option<RenderSession>,
    /// 已渲染、尚未进入输出队列的帧
    frame_buffer: VecDeque<OutputFrame>,
    output_buffer: Arc<ArrayQueue<OutputFrame>>,
    buffer_size: usize,
    idle_retries: u32,
    has_renderer: Arc<AtomicBool>,
    fps: Arc<AtomicU32>,
}

impl RendererState {
    fn call(&mut self, param: &str) -> Result<String> {
        let initialize = self.session.is_none();
        if initialize {
            info!("{} 🎨 {} 初始化渲染器", log_ctx(), self.name);
            match RenderSession::new(self.host.clone(), &self.factory, self.format.fps()) {
                Ok(session) => {
                    self.session = Some(session);
                    self.has_renderer.store(true, Ordering::Release);
                }
                Err(e) => {
                    error!("{} ❌ {} 渲染器创建失败: {}", log_ctx(), self.name, e);
                    return Err(e);
                }
            }
        }

        let result = match self.session.as_mut() {
            Some(_) if param == START_RENDERING => Ok(String::new()),
            Some(session) => session.call(param),
            None => Err(PlayerError::RendererError("渲染器不存在".to_string())),
        };

        match result {
            Ok(reply) => {
                if initialize {
                    self.fill_buffer(false);
                }
                Ok(reply)
            }
            Err(e) => {
                error!("{} ❌ {} 调用失败: {}", log_ctx(), self.name, e);
                self.teardown();
                Err(e)
            }
        }
    }

    /// 把输出队列补满
    ///
    /// `allow_faster` 为 false 时按实时速度出图（初次填充）。
    fn fill_buffer(&mut self, allow_faster: bool) {
        let to_render = self.buffer_size.saturating_sub(self.output_buffer.len());
        let mut rendered = 0;
        let mut idle = 0;
        while rendered < to_render {
            if self.next(allow_faster) {
                rendered += 1;
                idle = 0;
            } else if idle < self.idle_retries {
                idle += 1;
                thread::sleep(IDLE_WAIT);
            } else {
                debug!("{} {} 连续 {} 次没有出图，放入空帧", log_ctx(), self.name, idle);
                let _ = self.output_buffer.push(OutputFrame::empty());
                break;
            }
        }
    }

    /// 向输出队列推进一帧，成功返回 true
    fn next(&mut self, allow_faster: bool) -> bool {
        if self.frame_buffer.is_empty() {
            if self.session.is_none() {
                self.frame_buffer.push_back(OutputFrame::empty());
            } else if let Err(e) = self.render_into_buffer(allow_faster) {
                error!("{} ❌ {} 出图失败: {}", log_ctx(), self.name, e);
                self.teardown();
            }
        }

        match self.frame_buffer.pop_front() {
            Some(frame) => {
                if self.output_buffer.push(frame).is_err() {
                    warn!("{} ⚠️ {} 输出队列已满，丢弃一帧", log_ctx(), self.name);
                }
                true
            }
            None => false,
        }
    }

    /// 按渲染器帧率与输出帧率的关系渲染一帧或两帧
    fn render_into_buffer(&mut self, allow_faster: bool) -> Result<()> {
        let sync = if allow_faster {
            sync_factor(self.output_buffer.len(), self.buffer_size)
        } else {
            1.0
        };
        let field_mode = self.format.field_mode;
        let output_fps = self.format.fps();
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };

        let renderer_fps = session.fps();
        match DisplayMode::select(renderer_fps, output_fps) {
            DisplayMode::Interlace => {
                let first = session.render_frame(sync)?;
                if !first.is_late() {
                    let second = session.render_frame(sync)?;
                    self.frame_buffer
                        .push_back(interlace_frames(&first, &second, field_mode));
                }
            }
            DisplayMode::Duplicate => {
                let frame = session.render_frame(sync)?;
                if !frame.is_late() {
                    self.frame_buffer.push_back(frame.clone());
                    self.frame_buffer.push_back(frame);
                }
            }
            DisplayMode::Simple => {
                let frame = session.render_frame(sync)?;
                if !frame.is_late() {
                    self.frame_buffer.push_back(frame);
                }
            }
        }
        self.fps
            .store((renderer_fps * 100.0).round() as u32, Ordering::Relaxed);

        if session.is_empty() {
            info!("{} {} 渲染器没有内容，销毁", log_ctx(), self.name);
            self.teardown();
        }
        Ok(())
    }

    fn teardown(&mut self) {
        if self.session.take().is_some() {
            self.has_renderer.store(false, Ordering::Release);
        }
    }
}

/// 渲染器生产者对外报告的信息
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RendererProducerInfo {
    pub renderer: String,
    pub fps: f64,
    pub buffered: usize,
    pub buffer_size: usize,
    pub has_renderer: bool,
    pub late_frames: u64,
}

/// 渲染器生产者（Producer 的外部渲染实现）
///
/// 渲染在专属工作线程中进行，结果放进固定深度的输出队列；
/// `receive` 只从队列取帧，然后安排一次补满。渲染器在第一次 `call` 时才创建。
pub struct RendererProducer {
    name: String,
    worker: Worker<RendererState>,
    output_buffer: Arc<ArrayQueue<OutputFrame>>,
    last_frame: Arc<RwLock<OutputFrame>>,
    has_renderer: Arc<AtomicBool>,
    fps: Arc<AtomicU32>,
    fill_pending: Arc<AtomicBool>,
    late_frames: AtomicU64,
    buffer_size: usize,
}

impl RendererProducer {
    pub fn new(
        name: &str,
        factory: RendererFactory,
        host: Arc<RendererHost>,
        format: &OutputFormat,
        config: &PlayoutConfig,
    ) -> Result<Self> {
        let buffer_size = config.renderer_buffer_depth_for(format.fps());
        let output_buffer = Arc::new(ArrayQueue::new(buffer_size));
        let has_renderer = Arc::new(AtomicBool::new(false));
        let fps = Arc::new(AtomicU32::new(0));

        let state = RendererState {
            name: name.to_string(),
            format: format.clone(),
            factory,
            host,
            session: None,
            frame_buffer: VecDeque::new(),
            output_buffer: output_buffer.clone(),
            buffer_size,
            idle_retries: config.renderer_idle_retries,
            has_renderer: has_renderer.clone(),
            fps: fps.clone(),
        };

        info!(
            "{} 🎨 创建渲染器生产者: {}（输出队列 {} 帧）",
            log_ctx(),
            name,
            buffer_size
        );

        Ok(Self {
            name: name.to_string(),
            worker: Worker::spawn(name, state)?,
            output_buffer,
            last_frame: Arc::new(RwLock::new(OutputFrame::empty())),
            has_renderer,
            fps,
            fill_pending: Arc::new(AtomicBool::new(false)),
            late_frames: AtomicU64::new(0),
            buffer_size,
        })
    }

    /// 取出一帧，然后安排补满输出队列
    pub fn receive(&self, _hints: FrameHints) -> OutputFrame {
        let frame = match self.output_buffer.pop() {
            Some(frame) => {
                *self.last_frame.write() = frame.clone();
                frame
            }
            None => {
                self.late_frames.fetch_add(1, Ordering::Relaxed);
                debug!("{} ⏳ {} 输出队列为空，返回迟到帧", log_ctx(), self.name);
                OutputFrame::late()
            }
        };
        self.schedule_fill();
        frame
    }

    fn schedule_fill(&self) {
        if self.fill_pending.swap(true, Ordering::AcqRel) {
            return;
        }
        let pending = self.fill_pending.clone();
        let posted = self.worker.post(move |state| {
            state.fill_buffer(true);
            pending.store(false, Ordering::Release);
        });
        if let Err(e) = posted {
            self.fill_pending.store(false, Ordering::Release);
            warn!("{} ⚠️ {} 无法安排出图: {}", log_ctx(), self.name, e);
        }
    }

    pub fn last_frame(&self) -> OutputFrame {
        self.last_frame.read().clone()
    }

    pub fn nb_frames(&self) -> FrameCount {
        FrameCount::Unbounded
    }

    /// 转发调用；`?` 查询渲染器是否存在，应答 "1" 或 "0"
    pub fn call(&self, param: &str) -> CallFuture {
        if param == "?" {
            let reply = if self.has_renderer() { "1" } else { "0" };
            return Box::pin(std::future::ready(Ok(reply.to_string())));
        }
        let param = param.to_string();
        let reply = self.worker.begin_invoke(move |state| state.call(&param));
        Box::pin(async move { reply.await? })
    }

    pub fn has_renderer(&self) -> bool {
        self.has_renderer.load(Ordering::Acquire)
    }

    /// 渲染器最近一次报告的帧率
    pub fn fps(&self) -> f64 {
        self.fps.load(Ordering::Relaxed) as f64 / 100.0
    }

    pub fn buffered(&self) -> usize {
        self.output_buffer.len()
    }

    pub fn late_frames(&self) -> u64 {
        self.late_frames.load(Ordering::Relaxed)
    }

    pub fn info(&self) -> RendererProducerInfo {
        RendererProducerInfo {
            renderer: self.name.clone(),
            fps: self.fps(),
            buffered: self.buffered(),
            buffer_size: self.buffer_size,
            has_renderer: self.has_renderer(),
            late_frames: self.late_frames(),
        }
    }

    pub fn print(&self) -> String {
        format!("renderer[{}|{:.2}]", self.name, self.fps())
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
