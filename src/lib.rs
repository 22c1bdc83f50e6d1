// 播出核心：帧复用、生产者与通道调度

pub mod core;
pub mod player;
pub mod renderer;
pub mod channel;
