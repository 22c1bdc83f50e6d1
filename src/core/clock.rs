use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// 帧节奏定时器 - 用于通道节拍与渲染器限速
///
/// `tick(period)` 阻塞到下一个截止时间；落后超过一个周期时直接以当前时刻
/// 重新对齐，不做突发追赶。
#[derive(Clone)]
pub struct FrameTimer {
    inner: Arc<Mutex<TimerInner>>,
}

struct TimerInner {
    deadline: Option<Instant>,  // 上一次节拍的截止时刻
    ticks: u64,
    overruns: u64,              // 落后重新对齐的次数
}

impl FrameTimer {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(TimerInner {
                deadline: None,
                ticks: 0,
                overruns: 0,
            })),
        }
    }

    /// 等待一个周期；周期为零时立即返回
    pub fn tick(&self, period: Duration) {
        let wait = {
            let mut inner = self.inner.lock();
            inner.ticks += 1;
            let now = Instant::now();
            let next = match inner.deadline {
                Some(prev) => prev + period,
                None => now + period,
            };
            if next + period < now {
                // 落后太多，重新对齐
                inner.overruns += 1;
                inner.deadline = Some(now);
                Duration::ZERO
            } else {
                inner.deadline = Some(next);
                next.saturating_duration_since(now)
            }
        };

        if !wait.is_zero() {
            thread::sleep(wait);
        }
    }

    /// 丢弃节拍相位，下次 tick 从当前时刻重新计算
    pub fn reset(&self) {
        self.inner.lock().deadline = None;
    }

    pub fn ticks(&self) -> u64 {
        self.inner.lock().ticks
    }

    pub fn overruns(&self) -> u64 {
        self.inner.lock().overruns
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_paces_to_period() {
        let timer = FrameTimer::new();
        let start = Instant::now();
        for _ in 0..3 {
            timer.tick(Duration::from_millis(10));
        }
        assert!(start.elapsed() >= Duration::from_millis(25));
        assert_eq!(timer.ticks(), 3);
    }

    #[test]
    fn test_zero_period_does_not_block() {
        let timer = FrameTimer::new();
        let start = Instant::now();
        for _ in 0..100 {
            timer.tick(Duration::ZERO);
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_realigns_after_stall() {
        let timer = FrameTimer::new();
        timer.tick(Duration::from_millis(1));
        thread::sleep(Duration::from_millis(20));
        let start = Instant::now();
        timer.tick(Duration::from_millis(1));
        assert!(start.elapsed() < Duration::from_millis(10));
        assert_eq!(timer.overruns(), 1);
    }
}
