// 通道：按输出格式的帧率驱动调度器

pub mod scheduler;

use crate::core::{log_ctx, FrameTimer, OutputFormat, Result};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{info, warn};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub use scheduler::{ChannelFrame, ChannelInfo, LayerInfo, Scheduler};

/// 播出通道
///
/// 节拍线程每个帧周期执行一次 [`Scheduler::tick`]，结果放进有界输出队列；
/// 消费端跟不上时丢弃最旧的帧。
pub struct Channel {
    scheduler: Arc<Scheduler>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    output_rx: Receiver<ChannelFrame>,
    timer: FrameTimer,
    dropped: Arc<AtomicU64>,
}

impl Channel {
    pub fn start(format: OutputFormat, output_capacity: usize) -> Result<Self> {
        let period = Duration::from_micros(format.frame_rate.frame_duration().max(0) as u64);
        info!(
            "{} 📺 启动通道: {} ({} fps)",
            log_ctx(),
            format.name,
            format.frame_rate
        );

        let scheduler = Arc::new(Scheduler::new(format));
        let running = Arc::new(AtomicBool::new(true));
        let timer = FrameTimer::new();
        let dropped = Arc::new(AtomicU64::new(0));
        let (output_tx, output_rx) = bounded(output_capacity.max(1));

        let handle = {
            let scheduler = scheduler.clone();
            let running = running.clone();
            let timer = timer.clone();
            let dropped = dropped.clone();
            let drain_rx = output_rx.clone();
            thread::Builder::new()
                .name("channel-tick".to_string())
                .spawn(move || {
                    Self::run(scheduler, running, timer, period, output_tx, drain_rx, dropped)
                })?
        };

        Ok(Self {
            scheduler,
            running,
            handle: Some(handle),
            output_rx,
            timer,
            dropped,
        })
    }

    fn run(
        scheduler: Arc<Scheduler>,
        running: Arc<AtomicBool>,
        timer: FrameTimer,
        period: Duration,
        output_tx: Sender<ChannelFrame>,
        drain_rx: Receiver<ChannelFrame>,
        dropped: Arc<AtomicU64>,
    ) {
        info!("{} 🎬 通道节拍线程启动", log_ctx());
        while running.load(Ordering::Acquire) {
            timer.tick(period);
            let frame = scheduler.tick();

            // 节拍线程自己持有接收端副本，输出通道不会断开，停止只看 running
            if let Err(TrySendError::Full(frame)) = output_tx.try_send(frame) {
                // 丢弃最旧的一帧，保证输出是最新的
                if drain_rx.try_recv().is_ok() {
                    dropped.fetch_add(1, Ordering::Relaxed);
                }
                if output_tx.try_send(frame).is_err() {
                    dropped.fetch_add(1, Ordering::Relaxed);
                }
                warn!("{} ⚠️ 通道输出队列已满，丢弃最旧的帧", log_ctx());
            }
        }
        info!(
            "{} 🛑 通道节拍线程退出（{} 个节拍，{} 次落后）",
            log_ctx(),
            timer.ticks(),
            timer.overruns()
        );
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// 输出队列的接收端
    pub fn output(&self) -> &Receiver<ChannelFrame> {
        &self.output_rx
    }

    pub fn frames_dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// 节拍线程落后重新对齐的次数
    pub fn overruns(&self) -> u64 {
        self.timer.overruns()
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("{} ⚠️ 通道节拍线程异常退出", log_ctx());
            }
        }
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.stop();
    }
}
