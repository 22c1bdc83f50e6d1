use crate::core::{log_ctx, FrameHints, OutputFormat, OutputFrame};
use crate::player::{Producer, ProducerInfo};
use log::{debug, info};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// 一个节拍的输出：按层号从小到大排列的各层帧
#[derive(Debug, Clone)]
pub struct ChannelFrame {
    pub frame_number: u64,
    pub layers: Vec<(i32, OutputFrame)>,
}

impl ChannelFrame {
    pub fn layer(&self, index: i32) -> Option<&OutputFrame> {
        self.layers
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, frame)| frame)
    }
}

struct Layer {
    producer: Arc<Producer>,
    hints: FrameHints,
    frames: u64,
    late_frames: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct LayerInfo {
    pub index: i32,
    pub frames: u64,
    pub late_frames: u64,
    pub producer: ProducerInfo,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ChannelInfo {
    pub video_mode: String,
    pub frame_number: u64,
    pub layers: Vec<LayerInfo>,
}

/// 通道调度器
///
/// 每个节拍向所有层的生产者各取一帧。迟到帧用该生产者的最后一帧替换，
/// 不会因为某一层没准备好而阻塞整个通道。
pub struct Scheduler {
    format: OutputFormat,
    layers: Mutex<BTreeMap<i32, Layer>>,
    frame_number: AtomicU64,
}

impl Scheduler {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            layers: Mutex::new(BTreeMap::new()),
            frame_number: AtomicU64::new(0),
        }
    }

    pub fn format(&self) -> &OutputFormat {
        &self.format
    }

    /// 把生产者放到指定层，替换原有的生产者
    pub fn load(&self, index: i32, producer: Arc<Producer>, hints: FrameHints) {
        info!("{} 📺 第 {} 层载入 {}", log_ctx(), index, producer.print());
        let previous = self.layers.lock().insert(
            index,
            Layer {
                producer,
                hints,
                frames: 0,
                late_frames: 0,
            },
        );
        if let Some(previous) = previous {
            debug!("{} 第 {} 层替换掉 {}", log_ctx(), index, previous.producer.print());
        }
    }

    /// 清空指定层，返回原来的生产者
    pub fn clear(&self, index: i32) -> Option<Arc<Producer>> {
        let removed = self.layers.lock().remove(&index).map(|layer| layer.producer);
        if removed.is_some() {
            info!("{} 📺 第 {} 层已清空", log_ctx(), index);
        }
        removed
    }

    pub fn clear_all(&self) {
        self.layers.lock().clear();
    }

    pub fn producer(&self, index: i32) -> Option<Arc<Producer>> {
        self.layers.lock().get(&index).map(|layer| layer.producer.clone())
    }

    pub fn layer_count(&self) -> usize {
        self.layers.lock().len()
    }

    /// 执行一个节拍
    pub fn tick(&self) -> ChannelFrame {
        let frame_number = self.frame_number.fetch_add(1, Ordering::AcqRel);

        // 取帧期间不持有层表的锁
        let snapshot: Vec<(i32, Arc<Producer>, FrameHints)> = self
            .layers
            .lock()
            .iter()
            .map(|(index, layer)| (*index, layer.producer.clone(), layer.hints))
            .collect();

        let mut layers = Vec::with_capacity(snapshot.len());
        let mut late = Vec::new();
        for (index, producer, hints) in &snapshot {
            let mut frame = producer.receive(*hints);
            if frame.is_late() {
                debug!("{} ⏳ 第 {} 层迟到，使用最后一帧", log_ctx(), index);
                frame = producer.last_frame();
                late.push(*index);
            }
            layers.push((*index, frame));
        }

        let mut table = self.layers.lock();
        for (index, producer, _) in &snapshot {
            if let Some(layer) = table.get_mut(index) {
                if Arc::ptr_eq(&layer.producer, producer) {
                    layer.frames += 1;
                    if late.contains(index) {
                        layer.late_frames += 1;
                    }
                }
            }
        }

        ChannelFrame {
            frame_number,
            layers,
        }
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number.load(Ordering::Acquire)
    }

    pub fn info(&self) -> ChannelInfo {
        let layers = self
            .layers
            .lock()
            .iter()
            .map(|(index, layer)| LayerInfo {
                index: *index,
                frames: layer.frames,
                late_frames: layer.late_frames,
                producer: layer.producer.info(),
            })
            .collect();
        ChannelInfo {
            video_mode: self.format.name.clone(),
            frame_number: self.frame_number(),
            layers,
        }
    }
}
