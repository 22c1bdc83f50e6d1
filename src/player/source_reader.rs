use crate::core::{
    log_ctx, AudioFrame, AudioStreamInfo, PlayerError, Result, VideoFrame, VideoStreamInfo,
};
use crate::player::demuxer_source::{DemuxerSource, MediaUnit};
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender, TryRecvError};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// 读包线程命令
enum ReaderCommand {
    /// 跳转到原生时间（微秒），并切换到新的 epoch
    Seek { time: i64, epoch: u64 },
    Stop,
}

/// 带 epoch 的单元：seek 之后旧 epoch 的单元全部作废
pub(crate) struct Sequenced<T> {
    pub epoch: u64,
    pub unit: T,
}

/// 解码端持有的接收端
///
/// 只交出当前 epoch 的单元，旧的在取出时直接丢弃。
pub(crate) struct StreamReceiver<T> {
    rx: Receiver<Sequenced<T>>,
    epoch: Arc<AtomicU64>,
    discarded: u64,
}

impl<T> StreamReceiver<T> {
    /// 非阻塞地取出下一个当前 epoch 的单元
    pub fn try_next(&mut self) -> Option<T> {
        let current = self.epoch.load(Ordering::Acquire);
        loop {
            match self.rx.try_recv() {
                Ok(item) if item.epoch == current => return Some(item.unit),
                Ok(_) => self.discarded += 1,
                Err(_) => return None,
            }
        }
    }

    /// 通道里没有任何待取单元
    pub fn is_drained(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn discarded(&self) -> u64 {
        self.discarded
    }
}

/// 发送结果
enum Delivery {
    Sent,
    /// 阻塞期间收到命令，当前单元被放弃
    Interrupted(ReaderCommand),
    /// 接收端已经关闭
    Disconnected,
}

/// 媒体源读取线程（Source Reader）
///
/// - 在独立线程里驱动 [`DemuxerSource`]，通过有界通道把单元交给解码端（背压）
/// - Seek/Stop 走无界命令通道；通道满时也能及时响应命令
/// - 每次 seek 递增 epoch，解码端据此丢弃过期单元
pub struct SourceReader {
    description: String,
    video_info: Option<VideoStreamInfo>,
    audio_info: Option<AudioStreamInfo>,
    nb_frames: Option<u32>,
    seekable: bool,

    thread_handle: Option<JoinHandle<()>>,
    command_tx: Sender<ReaderCommand>,
    epoch: Arc<AtomicU64>,
    eof_epoch: Arc<AtomicU64>,

    video_rx: Option<Receiver<Sequenced<VideoFrame>>>,
    audio_rx: Option<Receiver<Sequenced<AudioFrame>>>,
}

/// EOF 尚未出现时的标记值
const NO_EOF: u64 = u64::MAX;

impl SourceReader {
    /// 启动读取线程
    ///
    /// `capacity` 为每个流的通道容量；只为媒体源实际拥有的流建立通道。
    pub fn start(source: Box<dyn DemuxerSource>, capacity: usize) -> Result<Self> {
        let description = source.description();
        let video_info = source.video_stream();
        let audio_info = source.audio_stream();
        let nb_frames = source.nb_frames();
        let seekable = source.is_seekable();

        let (command_tx, command_rx) = unbounded::<ReaderCommand>();
        let (video_tx, video_rx) = match video_info {
            Some(_) => {
                let (tx, rx) = bounded(capacity.max(1));
                (Some(tx), Some(rx))
            }
            None => (None, None),
        };
        let (audio_tx, audio_rx) = match audio_info {
            Some(_) => {
                let (tx, rx) = bounded(capacity.max(1));
                (Some(tx), Some(rx))
            }
            None => (None, None),
        };

        let epoch = Arc::new(AtomicU64::new(0));
        let eof_epoch = Arc::new(AtomicU64::new(NO_EOF));
        let thread_eof = eof_epoch.clone();

        let thread_handle = thread::Builder::new()
            .name("source-reader".to_string())
            .spawn(move || {
                Self::read_loop(source, command_rx, video_tx, audio_tx, thread_eof);
            })?;

        Ok(Self {
            description,
            video_info,
            audio_info,
            nb_frames,
            seekable,
            thread_handle: Some(thread_handle),
            command_tx,
            epoch,
            eof_epoch,
            video_rx,
            audio_rx,
        })
    }

    /// 读取循环（在独立线程中运行）
    fn read_loop(
        mut source: Box<dyn DemuxerSource>,
        command_rx: Receiver<ReaderCommand>,
        mut video_tx: Option<Sender<Sequenced<VideoFrame>>>,
        mut audio_tx: Option<Sender<Sequenced<AudioFrame>>>,
        eof_epoch: Arc<AtomicU64>,
    ) {
        info!("{} 🎬 读取线程启动: {}", log_ctx(), source.description());

        let mut current_epoch = 0u64;
        let mut pending: Option<ReaderCommand> = None;
        let mut video_count: u64 = 0;
        let mut audio_count: u64 = 0;

        'outer: loop {
            // 先处理所有命令，连续的 seek 只执行最后一个
            let mut last_seek = None;
            loop {
                let command = match pending.take() {
                    Some(command) => command,
                    None => match command_rx.try_recv() {
                        Ok(command) => command,
                        Err(TryRecvError::Empty) => break,
                        Err(TryRecvError::Disconnected) => break 'outer,
                    },
                };
                match command {
                    ReaderCommand::Seek { time, epoch } => last_seek = Some((time, epoch)),
                    ReaderCommand::Stop => {
                        info!("{} ⏹ 读取线程收到停止命令", log_ctx());
                        break 'outer;
                    }
                }
            }

            if let Some((time, epoch)) = last_seek {
                debug!("{} ⏩ 读取线程 Seek: {}us (epoch {})", log_ctx(), time, epoch);
                if let Err(e) = source.seek(time) {
                    error!("{} ❌ Seek 失败: {}", log_ctx(), e);
                }
                current_epoch = epoch;
            }

            if video_tx.is_none() && audio_tx.is_none() {
                // 所有接收端都已关闭，只等待命令
                match command_rx.recv() {
                    Ok(command) => {
                        pending = Some(command);
                        continue;
                    }
                    Err(_) => break,
                }
            }

            let delivery = match source.read_unit() {
                Ok(Some(MediaUnit::Video(frame))) => match &video_tx {
                    Some(tx) => {
                        video_count += 1;
                        let item = Sequenced { epoch: current_epoch, unit: frame };
                        match Self::deliver(tx, item, &command_rx) {
                            Delivery::Disconnected => {
                                debug!("{} 视频接收端已关闭", log_ctx());
                                video_tx = None;
                                Delivery::Sent
                            }
                            other => other,
                        }
                    }
                    None => Delivery::Sent,
                },
                Ok(Some(MediaUnit::Audio(frame))) => match &audio_tx {
                    Some(tx) => {
                        audio_count += 1;
                        let item = Sequenced { epoch: current_epoch, unit: frame };
                        match Self::deliver(tx, item, &command_rx) {
                            Delivery::Disconnected => {
                                debug!("{} 音频接收端已关闭", log_ctx());
                                audio_tx = None;
                                Delivery::Sent
                            }
                            other => other,
                        }
                    }
                    None => Delivery::Sent,
                },
                Ok(None) => {
                    // EOF：记录当前 epoch，阻塞等待下一条命令
                    eof_epoch.store(current_epoch, Ordering::Release);
                    info!(
                        "{} 📄 读取线程到达末尾（{} 视频，{} 音频），等待命令",
                        log_ctx(),
                        video_count,
                        audio_count
                    );
                    match command_rx.recv() {
                        Ok(command) => Delivery::Interrupted(command),
                        Err(_) => break,
                    }
                }
                Err(e) => {
                    // 读取错误按流结束处理
                    error!("{} ❌ 读取失败: {}", log_ctx(), e);
                    eof_epoch.store(current_epoch, Ordering::Release);
                    match command_rx.recv() {
                        Ok(command) => Delivery::Interrupted(command),
                        Err(_) => break,
                    }
                }
            };

            if let Delivery::Interrupted(command) = delivery {
                pending = Some(command);
            }
        }

        info!(
            "{} 🛑 读取线程退出（共 {} 视频，{} 音频）",
            log_ctx(),
            video_count,
            audio_count
        );
    }

    /// 发送一个单元；通道满时同时等待命令
    fn deliver<T>(
        tx: &Sender<Sequenced<T>>,
        item: Sequenced<T>,
        command_rx: &Receiver<ReaderCommand>,
    ) -> Delivery {
        select! {
            send(tx, item) -> res => match res {
                Ok(()) => Delivery::Sent,
                Err(_) => Delivery::Disconnected,
            },
            recv(command_rx) -> command => match command {
                Ok(command) => Delivery::Interrupted(command),
                Err(_) => Delivery::Interrupted(ReaderCommand::Stop),
            },
        }
    }

    /// 发送 Seek 命令（原生时间，微秒）
    ///
    /// 立即切换 epoch：之后解码端只会拿到 seek 之后读出的单元。
    pub fn seek(&self, time: i64) -> Result<()> {
        if !self.seekable {
            warn!("{} ⚠️ 媒体源不支持 seek: {}", log_ctx(), self.description);
        }
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        self.command_tx
            .send(ReaderCommand::Seek { time, epoch })
            .map_err(|e| PlayerError::SourceError(format!("发送 Seek 命令失败: {}", e)))
    }

    /// 当前 epoch 的读取是否已经到达末尾
    pub fn is_eof(&self) -> bool {
        self.eof_epoch.load(Ordering::Acquire) == self.epoch.load(Ordering::Acquire)
    }

    pub(crate) fn take_video_receiver(&mut self) -> Option<StreamReceiver<VideoFrame>> {
        self.video_rx.take().map(|rx| StreamReceiver {
            rx,
            epoch: self.epoch.clone(),
            discarded: 0,
        })
    }

    pub(crate) fn take_audio_receiver(&mut self) -> Option<StreamReceiver<AudioFrame>> {
        self.audio_rx.take().map(|rx| StreamReceiver {
            rx,
            epoch: self.epoch.clone(),
            discarded: 0,
        })
    }

    /// 丢掉未被取走的接收端，读取线程不再为这些流阻塞
    pub fn release_unused(&mut self) {
        self.video_rx = None;
        self.audio_rx = None;
    }

    pub fn video_info(&self) -> Option<&VideoStreamInfo> {
        self.video_info.as_ref()
    }

    pub fn audio_info(&self) -> Option<&AudioStreamInfo> {
        self.audio_info.as_ref()
    }

    pub fn nb_frames(&self) -> Option<u32> {
        self.nb_frames
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// 停止线程并等待退出
    pub fn stop(&mut self) {
        let _ = self.command_tx.send(ReaderCommand::Stop);
        self.release_unused();
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                error!("{} ❌ 读取线程异常退出", log_ctx());
            }
        }
    }
}

impl Drop for SourceReader {
    fn drop(&mut self) {
        self.stop();
    }
}
