// 核心数据结构和类型定义

pub mod types;
pub mod format;
pub mod frame;
pub mod clock;
pub mod config;
pub mod error;

use std::process;
use std::thread;

pub use types::*;
pub use format::{FieldMode, OutputFormat};
pub use frame::{FrameKind, FrameTransform, OutputFrame, Picture};
pub use clock::FrameTimer;
pub use config::PlayoutConfig;
pub use error::*;

/// 日志上下文前缀
pub fn log_ctx() -> String {
    format!("[pid:{} tid:{:?}]", process::id(), thread::current().id())
}
