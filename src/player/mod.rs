// 生产者核心模块

pub mod demuxer_source;  // 媒体源抽象接口
pub mod source_reader;   // 读取线程（epoch 丢弃过期单元）
pub mod decoder;
pub mod muxer;
pub mod worker;
pub mod params;
pub mod file_producer;
pub mod producer;
pub mod synthetic;       // 程序生成的测试信号源

pub use demuxer_source::{DemuxerSource, MediaUnit, UnitType};
pub use source_reader::SourceReader;
pub use decoder::{AudioDecoder, VideoDecoder};
pub use muxer::{DisplayMode, FrameMuxer};
pub use worker::Worker;
pub use params::{FileProducerOptions, ProducerCommand};
pub use file_producer::{FileProducer, FileProducerInfo};
pub use producer::{CallFuture, Producer, ProducerInfo};
pub use synthetic::{SyntheticSource, SyntheticSourceOptions};
