use crate::core::{
    log_ctx, AudioFrame, ChannelLayout, FrameCount, FrameHints, FramePosition, FrameTransform,
    OutputFormat, OutputFrame, PlayerError, PlayoutConfig, Result, VideoFrame,
};
use crate::player::decoder::{AudioDecoder, VideoDecoder};
use crate::player::demuxer_source::DemuxerSource;
use crate::player::muxer::{DisplayMode, FrameMuxer};
use crate::player::params::{FileProducerOptions, ProducerCommand};
use crate::player::source_reader::SourceReader;
use crate::player::worker::Worker;
use log::{debug, info, trace, warn};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 在工作线程之外也能读取的状态
struct SharedStatus {
    looping: AtomicBool,
    /// 最近一次交付的帧号
    position: AtomicU32,
    late_frames: AtomicU64,
    last_frame: RwLock<OutputFrame>,
}

/// 打开时确定、之后不变的流信息
#[derive(Debug, Clone)]
struct StreamSummary {
    width: u32,
    height: u32,
    progressive: bool,
    fps: f64,
    has_video: bool,
    has_audio: bool,
    file_nb_frames: Option<u32>,
    mode: DisplayMode,
}

/// 文件生产者对外报告的信息
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct FileProducerInfo {
    pub filename: String,
    pub width: u32,
    pub height: u32,
    pub progressive: bool,
    pub fps: f64,
    #[serde(rename = "loop")]
    pub looping: bool,
    pub has_video: bool,
    pub has_audio: bool,
    pub mode: String,
    pub frame_number: i64,
    pub nb_frames: i64,
    pub file_frame_number: u32,
    pub file_nb_frames: i64,
    pub late_frames: u64,
}

/// 工作线程独占的播放状态
struct FileState {
    name: String,
    format: OutputFormat,
    reader: SourceReader,
    video_decoder: Option<VideoDecoder>,
    audio_decoder: Option<AudioDecoder>,
    muxer: FrameMuxer,

    start: u32,
    length: u32,
    look_ahead: usize,
    max_decode_iterations: usize,

    /// 预读队列：输出帧及其帧号
    frame_buffer: VecDeque<(OutputFrame, u32)>,
    /// 下一个进入预读队列的帧号
    file_frame_number: u32,
    last_frame: OutputFrame,
    shared: Arc<SharedStatus>,
}

impl FileState {
    fn limit(&self) -> u32 {
        self.start.saturating_add(self.length)
    }

    /// 读取端已到结尾，且复用器再也凑不出下一帧
    ///
    /// 复用器等待的流已经取空时，另一条流剩下的内容不再有用。
    fn source_exhausted(&self) -> bool {
        if !self.reader.is_eof() {
            return false;
        }
        let video_drained = self.video_decoder.as_ref().map_or(true, |d| d.is_drained());
        let audio_drained = self.audio_decoder.as_ref().map_or(true, |d| d.is_drained());
        let video_starved =
            self.video_decoder.is_some() && video_drained && !self.muxer.video_ready();
        let audio_starved =
            self.audio_decoder.is_some() && audio_drained && !self.muxer.audio_ready();

        video_starved
            || audio_starved
            || (video_drained && audio_drained && self.muxer.is_empty())
    }

    fn is_finished(&self) -> bool {
        !self.shared.looping.load(Ordering::Acquire)
            && (self.file_frame_number >= self.limit() || self.source_exhausted())
    }

    /// 交付下一帧
    fn render_frame(&mut self, hints: FrameHints) -> (OutputFrame, FramePosition) {
        for _ in 0..self.max_decode_iterations {
            if self.frame_buffer.len() >= self.look_ahead {
                break;
            }
            self.try_decode_frame(hints);
        }

        match self.frame_buffer.pop_front() {
            Some((frame, index)) => {
                self.last_frame = frame.clone();
                *self.shared.last_frame.write() = frame.clone();
                self.shared.position.store(index, Ordering::Release);
                (frame, FramePosition::At(index))
            }
            None if self.is_finished() => {
                trace!("{} {} 已结束，重复最后一帧", log_ctx(), self.name);
                (self.last_frame.without_audio().paused(), FramePosition::End)
            }
            None => {
                self.shared.late_frames.fetch_add(1, Ordering::Relaxed);
                debug!("{} ⏳ {} 预读队列为空，返回迟到帧", log_ctx(), self.name);
                (OutputFrame::late(), FramePosition::Late)
            }
        }
    }

    /// 推进一次解码：取原生单元交给复用器，把得到的输出帧放进预读队列
    fn try_decode_frame(&mut self, hints: FrameHints) {
        let limit = self.limit();
        let looping = self.shared.looping.load(Ordering::Acquire);

        if looping && (self.file_frame_number >= limit || self.source_exhausted()) {
            self.rewind();
        }
        if self.file_frame_number >= limit {
            return;
        }

        let (video, audio) = self.decode_frame();
        self.muxer.push_video(video, hints);
        self.muxer.push_audio(audio);

        if self.audio_decoder.is_none() && !self.muxer.audio_ready() {
            let samples = self.muxer.audio_samples_needed();
            let silence = AudioFrame::silence(
                samples,
                self.format.audio_sample_rate,
                self.muxer.channel_layout().clone(),
            );
            self.muxer.push_audio(Some(silence));
        }
        if self.video_decoder.is_none() && !self.muxer.video_ready() {
            self.muxer.push_video(Some(VideoFrame::empty()), hints);
        }

        while self.file_frame_number < limit {
            let Some(frame) = self.muxer.poll() else {
                break;
            };
            self.frame_buffer.push_back((frame, self.file_frame_number));
            self.file_frame_number += 1;
        }
    }

    /// 视频和音频并行取下一个单元
    ///
    /// 一条流已经取空时也继续取另一条，读取线程才不会卡在满的队列上。
    fn decode_frame(&mut self) -> (Option<VideoFrame>, Option<AudioFrame>) {
        let video_drained = self.video_decoder.as_ref().map_or(true, |d| d.is_drained());
        let audio_drained = self.audio_decoder.as_ref().map_or(true, |d| d.is_drained());
        let video_wanted = !self.muxer.video_ready() || audio_drained;
        let audio_wanted = !self.muxer.audio_ready() || video_drained;
        let video_decoder = &mut self.video_decoder;
        let audio_decoder = &mut self.audio_decoder;

        rayon::join(
            || match video_decoder {
                Some(decoder) if video_wanted => decoder.poll(),
                _ => None,
            },
            || match audio_decoder {
                Some(decoder) if audio_wanted => decoder.poll(),
                _ => None,
            },
        )
    }

    fn seek_source(&mut self, frame: u32) {
        let time = self.format.frame_rate.time_from_frame_number(frame);
        if let Err(e) = self.reader.seek(time) {
            warn!("{} ⚠️ {} seek 失败: {}", log_ctx(), self.name, e);
        }
        if let Some(decoder) = self.video_decoder.as_mut() {
            decoder.seek(time);
        }
        if let Some(decoder) = self.audio_decoder.as_mut() {
            decoder.seek(time);
        }
        self.muxer.clear();
        if self.muxer.mode() == DisplayMode::Duplicate && frame % 2 == 1 {
            // 源定位到半帧之前，第一对的前一帧属于上一个帧号
            self.muxer.skip_frames(1);
        }
        self.file_frame_number = frame;
    }

    /// 循环回到起点，已经预读的帧保留
    fn rewind(&mut self) {
        info!("{} 🔁 {} 循环回到第 {} 帧", log_ctx(), self.name, self.start);
        self.seek_source(self.start);
    }

    /// 跳转到指定输出帧号，预读队列清空
    fn seek(&mut self, frame: u32) {
        info!("{} ⏩ {} seek 到第 {} 帧", log_ctx(), self.name, frame);
        self.frame_buffer.clear();
        self.seek_source(frame);
        self.shared.position.store(frame, Ordering::Release);
    }
}

/// 文件生产者（Producer 的媒体文件实现）
///
/// 解码、复用和预读都在专属工作线程中完成；`receive` 同步等待一帧，
/// 缩略图相关的操作是 async 的，等待时不占用调用方线程。
pub struct FileProducer {
    name: String,
    worker: Worker<FileState>,
    shared: Arc<SharedStatus>,
    summary: StreamSummary,
    start: u32,
    length: u32,
    thumbnail_grid: u32,
    thumbnail_retries: u32,
    thumbnail_settle: Duration,
}

impl FileProducer {
    /// 打开媒体源
    ///
    /// 单个流缺失只记录警告；视频和音频都没有时返回 StreamNotFound。
    pub fn open(
        source: Box<dyn DemuxerSource>,
        format: &OutputFormat,
        options: FileProducerOptions,
        config: &PlayoutConfig,
    ) -> Result<Self> {
        let mut reader = SourceReader::start(source, config.packet_queue_capacity)?;
        let name = reader.description().to_string();

        let video_decoder = match VideoDecoder::from_reader(&mut reader) {
            Ok(decoder) => Some(decoder),
            Err(e) => {
                warn!("{} ⚠️ {}", log_ctx(), e);
                None
            }
        };
        let audio_decoder = if options.thumbnail_mode {
            None
        } else {
            match AudioDecoder::from_reader(&mut reader, format, options.channel_layout.clone()) {
                Ok(decoder) => Some(decoder),
                Err(e) => {
                    warn!("{} ⚠️ {}", log_ctx(), e);
                    None
                }
            }
        };
        // 没有被解码器取走的流不再占用读取线程
        reader.release_unused();

        if video_decoder.is_none() && audio_decoder.is_none() {
            return Err(PlayerError::StreamNotFound(format!(
                "{} 中没有可用的视频或音频流",
                name
            )));
        }

        let layout = audio_decoder
            .as_ref()
            .map(|d| d.channel_layout().clone())
            .or_else(|| options.channel_layout.clone())
            .unwrap_or_else(ChannelLayout::stereo);
        let muxer = FrameMuxer::new(
            video_decoder.as_ref().map(|d| d.frame_rate()),
            format,
            layout,
        );

        let summary = StreamSummary {
            width: video_decoder.as_ref().map_or(0, |d| d.width()),
            height: video_decoder.as_ref().map_or(0, |d| d.height()),
            progressive: video_decoder.as_ref().map_or(true, |d| d.is_progressive()),
            fps: video_decoder
                .as_ref()
                .map_or(0.0, |d| d.frame_rate().as_f64()),
            has_video: video_decoder.is_some(),
            has_audio: audio_decoder.is_some(),
            file_nb_frames: video_decoder.as_ref().and_then(|d| d.nb_frames()),
            mode: muxer.mode(),
        };

        let shared = Arc::new(SharedStatus {
            looping: AtomicBool::new(options.looping),
            position: AtomicU32::new(options.start),
            late_frames: AtomicU64::new(0),
            last_frame: RwLock::new(OutputFrame::empty()),
        });

        let mut state = FileState {
            name: name.clone(),
            format: format.clone(),
            reader,
            video_decoder,
            audio_decoder,
            muxer,
            start: options.start,
            length: options.length,
            look_ahead: config.look_ahead,
            max_decode_iterations: config.max_decode_iterations,
            frame_buffer: VecDeque::new(),
            file_frame_number: 0,
            last_frame: OutputFrame::empty(),
            shared: shared.clone(),
        };
        if options.start > 0 {
            state.seek(options.start);
        }

        info!(
            "{} 🎬 打开文件生产者: {} ({}x{} {:.2} fps, {}, loop={})",
            log_ctx(),
            name,
            summary.width,
            summary.height,
            summary.fps,
            summary.mode,
            options.looping
        );

        let worker = Worker::spawn(&name, state)?;

        Ok(Self {
            name,
            worker,
            shared,
            summary,
            start: options.start,
            length: options.length,
            thumbnail_grid: config.thumbnail_grid,
            thumbnail_retries: config.thumbnail_retries,
            thumbnail_settle: config.thumbnail_settle(),
        })
    }

    /// 交付下一帧及其位置
    pub fn render_frame(&self, hints: FrameHints) -> (OutputFrame, FramePosition) {
        match self.worker.invoke(move |state| state.render_frame(hints)) {
            Ok(result) => result,
            Err(e) => {
                warn!("{} ⚠️ {} 无法交付帧: {}", log_ctx(), self.name, e);
                (OutputFrame::late(), FramePosition::Late)
            }
        }
    }

    pub fn receive(&self, hints: FrameHints) -> OutputFrame {
        self.render_frame(hints).0
    }

    /// 最近交付的帧（静止、无声）
    pub fn last_frame(&self) -> OutputFrame {
        self.shared.last_frame.read().without_audio().paused()
    }

    /// 跳转到输出帧号
    pub fn seek(&self, frame: u32) -> Result<()> {
        self.worker.invoke(move |state| state.seek(frame))
    }

    /// 可交付的输出帧数；循环时为无界
    pub fn nb_frames(&self) -> FrameCount {
        if self.is_looping() {
            return FrameCount::Unbounded;
        }
        match self.summary.file_nb_frames {
            Some(native) => {
                FrameCount::Finite(self.length.min(self.summary.mode.calc_nb_frames(native)))
            }
            None if self.length != u32::MAX => FrameCount::Finite(self.length),
            None => FrameCount::Unbounded,
        }
    }

    pub fn is_looping(&self) -> bool {
        self.shared.looping.load(Ordering::Acquire)
    }

    pub fn set_looping(&self, looping: bool) {
        self.shared.looping.store(looping, Ordering::Release);
    }

    /// 最近一次交付（或 seek 目标）的帧号
    pub fn frame_number(&self) -> u32 {
        self.shared.position.load(Ordering::Acquire)
    }

    pub fn late_frames(&self) -> u64 {
        self.shared.late_frames.load(Ordering::Relaxed)
    }

    /// 预读队列中的帧数
    pub fn buffered_frames(&self) -> Result<usize> {
        self.worker.invoke(|state| state.frame_buffer.len())
    }

    /// 执行运行时命令，返回应答
    pub fn call(&self, param: &str) -> Result<String> {
        match ProducerCommand::parse(param)? {
            ProducerCommand::Loop(value) => {
                if let Some(looping) = value {
                    info!("{} 🔁 {} loop={}", log_ctx(), self.name, looping);
                    self.set_looping(looping);
                }
                Ok("LOOP OK".to_string())
            }
            ProducerCommand::Seek(frame) => {
                self.seek(frame)?;
                Ok("SEEK OK".to_string())
            }
        }
    }

    pub fn info(&self) -> FileProducerInfo {
        FileProducerInfo {
            filename: self.name.clone(),
            width: self.summary.width,
            height: self.summary.height,
            progressive: self.summary.progressive,
            fps: self.summary.fps,
            looping: self.is_looping(),
            has_video: self.summary.has_video,
            has_audio: self.summary.has_audio,
            mode: self.summary.mode.to_string(),
            frame_number: self.frame_number().saturating_sub(self.start) as i64,
            nb_frames: self.nb_frames().as_i64(),
            file_frame_number: self.frame_number(),
            file_nb_frames: self.summary.file_nb_frames.map_or(-1, |n| n as i64),
            late_frames: self.late_frames(),
        }
    }

    pub fn print(&self) -> String {
        format!(
            "file[{}|{}x{}{}{:.2}|{}/{}]",
            self.name,
            self.summary.width,
            self.summary.height,
            if self.summary.progressive { "p" } else { "i" },
            self.summary.fps,
            self.frame_number(),
            self.nb_frames().as_i64()
        )
    }

    /// 按配置的网格大小生成缩略图
    pub async fn create_thumbnail_frame(&self) -> Result<OutputFrame> {
        self.create_thumbnail_grid(self.thumbnail_grid).await
    }

    /// 生成 grid×grid 的缩略图
    ///
    /// grid 为 1 时直接返回中间那一帧；否则返回一个组合帧，
    /// 子帧按行优先平铺。
    pub async fn create_thumbnail_grid(&self, grid: u32) -> Result<OutputFrame> {
        if grid < 1 {
            return Err(PlayerError::ConfigurationError(format!(
                "缩略图网格必须大于 0，实际为 {}",
                grid
            )));
        }
        let total = self.nb_frames().finite().ok_or_else(|| {
            PlayerError::ConfigurationError(format!("{} 长度无界，无法生成缩略图", self.name))
        })?;

        if grid == 1 {
            return Ok(self.render_specific_frame(total / 2, FrameHints::NONE).await);
        }

        let targets = thumbnail_targets(total, grid);
        let mut tiles = Vec::with_capacity(targets.len());
        for (i, &target) in targets.iter().enumerate() {
            let frame = self.render_specific_frame(target, FrameHints::NONE).await;
            tiles.push(frame.with_transform(tile_transform(i as u32, grid)));
        }
        debug!("{} 🖼️ {} 生成 {}x{} 缩略图", log_ctx(), self.name, grid, grid);
        Ok(OutputFrame::composite(tiles))
    }

    /// 取出帧号恰好为 position 的那一帧，重试用尽后返回空帧
    pub async fn render_specific_frame(&self, position: u32, hints: FrameHints) -> OutputFrame {
        if position > 0 {
            if let Err(e) = self.worker.begin_invoke(move |state| state.seek(position)).await {
                warn!("{} ⚠️ {} seek 失败: {}", log_ctx(), self.name, e);
                return OutputFrame::empty();
            }
            tokio::time::sleep(self.thumbnail_settle).await;
        }

        for _ in 0..self.thumbnail_retries {
            tokio::time::sleep(self.thumbnail_settle).await;
            let rendered = self
                .worker
                .begin_invoke(move |state| state.render_frame(hints))
                .await;
            match rendered {
                Ok((frame, FramePosition::At(index))) if index == position => return frame,
                Ok(_) => continue,
                Err(e) => {
                    warn!("{} ⚠️ {} 取帧失败: {}", log_ctx(), self.name, e);
                    break;
                }
            }
        }

        trace!("{} {} 放弃查找第 {} 帧", log_ctx(), self.name, position);
        OutputFrame::empty()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// 缩略图各格对应的帧号：首格为 0，末格为最后一帧，中间均匀分布
pub fn thumbnail_targets(total: u32, grid: u32) -> Vec<u32> {
    let cells = grid.saturating_mul(grid);
    if cells == 0 {
        return Vec::new();
    }
    if cells == 1 {
        return vec![total / 2];
    }
    (0..cells)
        .map(|i| {
            if i == 0 {
                0
            } else if i == cells - 1 {
                total.saturating_sub(1)
            } else {
                (total as u64 * i as u64 / (cells - 1) as u64) as u32
            }
        })
        .collect()
}

/// 第 index 格的缩放与平移
pub fn tile_transform(index: u32, grid: u32) -> FrameTransform {
    let grid = grid.max(1) as f64;
    let x = (index as f64 % grid).floor();
    let y = (index as f64 / grid).floor();
    FrameTransform {
        fill_scale: [1.0 / grid, 1.0 / grid],
        fill_translation: [x / grid, y / grid],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FrameRate;
    use crate::player::synthetic::{frame_index, SyntheticSource, SyntheticSourceOptions};
    use std::thread;
    use std::time::Instant;

    fn test_config() -> PlayoutConfig {
        PlayoutConfig {
            thumbnail_settle_ms: 2,
            ..Default::default()
        }
    }

    fn open(
        source: SyntheticSourceOptions,
        format: &str,
        options: FileProducerOptions,
    ) -> FileProducer {
        let format = OutputFormat::by_name(format).unwrap();
        FileProducer::open(
            Box::new(SyntheticSource::new(source)),
            &format,
            options,
            &test_config(),
        )
        .unwrap()
    }

    /// 跳过读取线程尚未跟上时的迟到帧
    fn next_ready(producer: &FileProducer) -> (OutputFrame, FramePosition) {
        for _ in 0..2000 {
            let (frame, position) = producer.render_frame(FrameHints::NONE);
            if position != FramePosition::Late {
                return (frame, position);
            }
            thread::sleep(Duration::from_millis(1));
        }
        panic!("等待帧超时");
    }

    fn native_index(frame: &OutputFrame) -> Option<u32> {
        frame.video().and_then(|v| frame_index(v))
    }

    #[test]
    fn test_duplicate_with_length_limit() {
        let producer = open(
            SyntheticSourceOptions {
                nb_frames: Some(100),
                ..Default::default()
            },
            "720p5000",
            FileProducerOptions {
                length: 10,
                ..Default::default()
            },
        );
        assert_eq!(producer.nb_frames(), FrameCount::Finite(10));

        let mut frames = Vec::new();
        for expected in 0..10 {
            let (frame, position) = next_ready(&producer);
            assert_eq!(position, FramePosition::At(expected));
            assert_eq!(frame.audio_samples(), 960);
            frames.push(frame);
        }
        assert_eq!(native_index(&frames[9]), Some(4));
        assert!(frames[8].same_picture(&frames[9]));

        let (still, position) = next_ready(&producer);
        assert_eq!(position, FramePosition::End);
        assert_eq!(position.as_i64(), -1);
        assert!(still.is_paused());
        assert_eq!(still.audio_samples(), 0);
        assert!(still.same_picture(&frames[9]));
    }

    #[test]
    fn test_interlace_halves_frame_count() {
        let producer = open(
            SyntheticSourceOptions {
                frame_rate: FrameRate::new(50, 1),
                nb_frames: Some(20),
                ..Default::default()
            },
            "1080i5000",
            FileProducerOptions::default(),
        );
        assert_eq!(producer.nb_frames(), FrameCount::Finite(10));

        let (frame, position) = next_ready(&producer);
        assert_eq!(position, FramePosition::At(0));
        let (first, second, _) = frame.fields().unwrap();
        assert_eq!(frame_index(first), Some(0));
        assert_eq!(frame_index(second), Some(1));
        assert_eq!(frame.audio_samples(), 1920);
    }

    #[test]
    fn test_seek_clears_look_ahead() {
        let producer = open(
            SyntheticSourceOptions::default(),
            "1080p2500",
            FileProducerOptions::default(),
        );
        next_ready(&producer);
        next_ready(&producer);

        producer.seek(40).unwrap();
        assert_eq!(producer.buffered_frames().unwrap(), 0);
        assert_eq!(producer.frame_number(), 40);

        let (frame, position) = next_ready(&producer);
        assert_eq!(position, FramePosition::At(40));
        assert_eq!(native_index(&frame), Some(40));
    }

    #[test]
    fn test_end_of_file_repeats_last_frame() {
        let producer = open(
            SyntheticSourceOptions {
                nb_frames: Some(5),
                ..Default::default()
            },
            "1080p2500",
            FileProducerOptions::default(),
        );
        let mut last = None;
        for expected in 0..5 {
            let (frame, position) = next_ready(&producer);
            assert_eq!(position, FramePosition::At(expected));
            last = Some(frame);
        }
        let last = last.unwrap();
        for _ in 0..3 {
            let (frame, position) = next_ready(&producer);
            assert_eq!(position, FramePosition::End);
            assert!(frame.same_picture(&last));
            assert!(frame.is_paused());
        }
        assert!(producer.last_frame().same_picture(&last));
    }

    #[test]
    fn test_loop_wraps_to_start() {
        let producer = open(
            SyntheticSourceOptions {
                nb_frames: Some(20),
                ..Default::default()
            },
            "1080p2500",
            FileProducerOptions {
                looping: true,
                ..Default::default()
            },
        );
        assert_eq!(producer.nb_frames(), FrameCount::Unbounded);

        let positions: Vec<u32> = (0..45)
            .map(|_| next_ready(&producer).1.index().unwrap())
            .collect();
        let expected: Vec<u32> = (0..20).chain(0..20).chain(0..5).collect();
        assert_eq!(positions, expected);
    }

    #[test]
    fn test_loop_within_range() {
        let producer = open(
            SyntheticSourceOptions::default(),
            "1080p2500",
            FileProducerOptions {
                looping: true,
                start: 5,
                length: 10,
                ..Default::default()
            },
        );
        let mut seen = Vec::new();
        for _ in 0..25 {
            let (frame, position) = next_ready(&producer);
            let index = position.index().unwrap();
            assert_eq!(native_index(&frame), Some(index));
            seen.push(index);
        }
        let expected: Vec<u32> = (5..15).chain(5..15).chain(5..10).collect();
        assert_eq!(seen, expected);
    }

    fn longer_audio_source() -> SyntheticSourceOptions {
        SyntheticSourceOptions {
            nb_frames: Some(3),
            audio_tail: 40,
            ..Default::default()
        }
    }

    #[test]
    fn test_longer_audio_reaches_end() {
        let producer = open(
            longer_audio_source(),
            "1080p2500",
            FileProducerOptions::default(),
        );
        for expected in 0..3 {
            assert_eq!(next_ready(&producer).1, FramePosition::At(expected));
        }
        let (still, position) = next_ready(&producer);
        assert_eq!(position, FramePosition::End);
        assert_eq!(native_index(&still), Some(2));
        assert_eq!(next_ready(&producer).1, FramePosition::End);
    }

    #[test]
    fn test_longer_audio_still_loops() {
        let producer = open(
            longer_audio_source(),
            "1080p2500",
            FileProducerOptions {
                looping: true,
                ..Default::default()
            },
        );
        let positions: Vec<u32> = (0..8)
            .map(|_| next_ready(&producer).1.index().unwrap())
            .collect();
        assert_eq!(positions, vec![0, 1, 2, 0, 1, 2, 0, 1]);
    }

    #[test]
    fn test_duplicate_seek_to_odd_frame_matches_playback() {
        let linear = open(
            SyntheticSourceOptions::default(),
            "720p5000",
            FileProducerOptions::default(),
        );
        let played: Vec<Option<u32>> = (0..9)
            .map(|_| native_index(&next_ready(&linear).0))
            .collect();
        assert_eq!(&played[5..9], &[Some(2), Some(3), Some(3), Some(4)]);

        let seeked = open(
            SyntheticSourceOptions::default(),
            "720p5000",
            FileProducerOptions::default(),
        );
        seeked.seek(5).unwrap();
        for expected in 5..9u32 {
            let (frame, position) = next_ready(&seeked);
            assert_eq!(position, FramePosition::At(expected));
            assert_eq!(native_index(&frame), played[expected as usize]);
            assert_eq!(frame.audio_samples(), 960);
        }
    }

    #[test]
    fn test_stalled_source_returns_late() {
        let producer = open(
            SyntheticSourceOptions {
                unit_delay: Duration::from_millis(300),
                ..Default::default()
            },
            "1080p2500",
            FileProducerOptions::default(),
        );
        let begin = Instant::now();
        let (frame, position) = producer.render_frame(FrameHints::NONE);
        assert!(begin.elapsed() < Duration::from_millis(200));
        assert!(frame.is_late());
        assert_eq!(position, FramePosition::Late);
        assert_eq!(producer.late_frames(), 1);
        assert!(producer.last_frame().is_empty());
    }

    #[test]
    fn test_missing_both_streams_fails() {
        let format = OutputFormat::by_name("1080p2500").unwrap();
        let result = FileProducer::open(
            Box::new(SyntheticSource::new(SyntheticSourceOptions {
                has_video: false,
                has_audio: false,
                ..Default::default()
            })),
            &format,
            FileProducerOptions::default(),
            &test_config(),
        );
        assert!(matches!(result, Err(PlayerError::StreamNotFound(_))));
    }

    #[test]
    fn test_audio_only_source() {
        let producer = open(
            SyntheticSourceOptions {
                has_video: false,
                nb_frames: Some(10),
                ..Default::default()
            },
            "1080i5000",
            FileProducerOptions::default(),
        );
        let (frame, position) = next_ready(&producer);
        assert_eq!(position, FramePosition::At(0));
        assert!(frame.video().is_none());
        assert_eq!(frame.audio_samples(), 1920);
        assert_eq!(producer.nb_frames(), FrameCount::Unbounded);
    }

    #[test]
    fn test_video_only_source_gets_silence() {
        let producer = open(
            SyntheticSourceOptions {
                has_audio: false,
                ..Default::default()
            },
            "1080p2997",
            FileProducerOptions::default(),
        );
        let (_, position) = next_ready(&producer);
        assert_eq!(position, FramePosition::At(0));
        let samples: Vec<usize> = (0..4).map(|_| next_ready(&producer).0.audio_samples()).collect();
        assert_eq!(samples, vec![1601, 1602, 1601, 1602]);
    }

    #[test]
    fn test_call_commands() {
        let producer = open(
            SyntheticSourceOptions::default(),
            "1080p2500",
            FileProducerOptions::default(),
        );
        assert_eq!(producer.call("LOOP").unwrap(), "LOOP OK");
        assert!(!producer.is_looping());
        assert_eq!(producer.call("loop 1").unwrap(), "LOOP OK");
        assert_eq!(producer.nb_frames(), FrameCount::Unbounded);

        assert_eq!(producer.call("SEEK 5").unwrap(), "SEEK OK");
        assert_eq!(next_ready(&producer).1, FramePosition::At(5));

        assert!(matches!(producer.call("PLAY"), Err(PlayerError::InvalidCommand(_))));
        assert!(matches!(producer.call("LOOP 2"), Err(PlayerError::InvalidCommand(_))));
    }

    #[test]
    fn test_info_and_print() {
        let producer = open(
            SyntheticSourceOptions {
                name: "clip".to_string(),
                nb_frames: Some(100),
                ..Default::default()
            },
            "1080p2500",
            FileProducerOptions::default(),
        );
        next_ready(&producer);
        let info = serde_json::to_value(producer.info()).unwrap();
        assert_eq!(info["filename"], "synthetic://clip");
        assert_eq!(info["nb-frames"], 100);
        assert_eq!(info["loop"], false);
        assert_eq!(info["mode"], "simple");
        assert_eq!(producer.print(), "file[synthetic://clip|64x36p25.00|0/100]");
    }

    #[test]
    fn test_thumbnail_targets_and_tiles() {
        assert_eq!(thumbnail_targets(100, 2), vec![0, 33, 66, 99]);
        assert_eq!(thumbnail_targets(100, 1), vec![50]);
        assert_eq!(thumbnail_targets(2, 2), vec![0, 0, 1, 1]);
        assert!(thumbnail_targets(100, 0).is_empty());

        let tile = tile_transform(3, 2);
        assert_eq!(tile.fill_scale, [0.5, 0.5]);
        assert_eq!(tile.fill_translation, [0.5, 0.5]);
        let tile = tile_transform(5, 3);
        assert_eq!(tile.fill_translation, [2.0 / 3.0, 1.0 / 3.0]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_thumbnail_grid() {
        let producer = open(
            SyntheticSourceOptions {
                nb_frames: Some(12),
                has_audio: false,
                ..Default::default()
            },
            "1080p2500",
            FileProducerOptions {
                thumbnail_mode: true,
                ..Default::default()
            },
        );
        let thumb = producer.create_thumbnail_frame().await.unwrap();
        let tiles = thumb.children();
        assert_eq!(tiles.len(), 4);
        let indices: Vec<Option<u32>> = tiles.iter().map(native_index).collect();
        assert_eq!(indices, vec![Some(0), Some(4), Some(8), Some(11)]);
        assert_eq!(tiles[1].transform().fill_translation, [0.5, 0.0]);

        let single = producer.create_thumbnail_grid(1).await.unwrap();
        assert_eq!(native_index(&single), Some(6));

        assert!(matches!(
            producer.create_thumbnail_grid(0).await,
            Err(PlayerError::ConfigurationError(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_thumbnail_short_source_uses_empty_tiles() {
        let producer = open(
            SyntheticSourceOptions {
                nb_frames: Some(2),
                ..Default::default()
            },
            "1080p2500",
            FileProducerOptions {
                thumbnail_mode: true,
                ..Default::default()
            },
        );
        let thumb = producer.create_thumbnail_grid(2).await.unwrap();
        let tiles = thumb.children();
        assert_eq!(tiles.len(), 4);
        assert_eq!(native_index(&tiles[0]), Some(0));
        assert!(tiles[1].is_empty());
        assert_eq!(native_index(&tiles[2]), Some(1));
        assert_eq!(native_index(&tiles[3]), Some(1));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unbounded_thumbnail_rejected() {
        let producer = open(
            SyntheticSourceOptions::default(),
            "1080p2500",
            FileProducerOptions {
                looping: true,
                ..Default::default()
            },
        );
        assert!(matches!(
            producer.create_thumbnail_frame().await,
            Err(PlayerError::ConfigurationError(_))
        ));
    }
}
