//! 宿主侧运行时
//!
//! - `driver`: 在单个 tokio 任务上持有引擎，串行处理帧、命令与计时器推进
//! - `replay`: JSON-lines 录制文件作为帧源，支持虚拟时钟与实时两种回放

pub mod driver;
pub mod replay;

use chrono::{DateTime, Duration, Utc};
use tokio::time::Instant;

use crate::proctor::clock::Clock;

/// 以 tokio 单调时钟推进的墙钟，暂停时间的测试中随 `tokio::time` 一起前进
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: Instant,
    origin_wall: DateTime<Utc>,
}

impl TokioClock {
    pub fn new() -> Self {
        Self::anchored_at(Utc::now())
    }

    pub fn anchored_at(origin_wall: DateTime<Utc>) -> Self {
        Self {
            origin: Instant::now(),
            origin_wall,
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = Instant::now().saturating_duration_since(self.origin);
        let elapsed = Duration::from_std(elapsed).unwrap_or_else(|_| Duration::zero());
        self.origin_wall + elapsed
    }
}
