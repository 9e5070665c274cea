//! 风险聚合
//!
//! 所有违规都经由 `RiskAggregator::try_record` 进入会话：
//! 先做节流判断，再追加到违规列表、累加风险分并更新分类计数。

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::proctor::types::{GazeDirection, SessionStats, ViolationEvent, ViolationKind};

/// 分类计数，会话内单调不减
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ViolationCounters {
    pub excessive_blink_count: u32,
    pub gaze_away_count: u32,
    pub no_face_count: u32,
    pub multiple_faces_count: u32,
    pub talking_count: u32,
    pub eyes_closed_count: u32,
}

impl ViolationCounters {
    pub fn record(&mut self, kind: ViolationKind) {
        match kind {
            ViolationKind::ExcessiveBlinking => self.excessive_blink_count += 1,
            ViolationKind::GazeAway(_) => self.gaze_away_count += 1,
            ViolationKind::LeftFrame => self.no_face_count += 1,
            ViolationKind::MultipleFaces => self.multiple_faces_count += 1,
            ViolationKind::Talking => self.talking_count += 1,
            ViolationKind::EyesClosed => self.eyes_closed_count += 1,
            // 头部偏转与噪声只计入风险分
            ViolationKind::HeadTurned | ViolationKind::LoudNoise => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskAggregator {
    stats: SessionStats,
    counters: ViolationCounters,
    throttle: Duration,
}

impl RiskAggregator {
    pub fn new(throttle_ms: i64) -> Self {
        Self {
            stats: SessionStats::default(),
            counters: ViolationCounters::default(),
            throttle: Duration::milliseconds(throttle_ms),
        }
    }

    /// 节流：仅与最近一条记录比较，同类型且间隔小于节流窗口则丢弃
    pub fn is_throttled(&self, kind: ViolationKind, at: DateTime<Utc>) -> bool {
        match self.stats.violations.last() {
            Some(last) if last.kind == kind => at - last.timestamp < self.throttle,
            _ => false,
        }
    }

    /// 尝试记录一次违规，被节流时返回 `None`
    pub fn try_record(&mut self, kind: ViolationKind, at: DateTime<Utc>) -> Option<ViolationEvent> {
        if self.is_throttled(kind, at) {
            tracing::debug!(kind = %kind, "Violation throttled");
            return None;
        }

        let event = ViolationEvent::new(kind, at);
        self.stats.risk_score += event.severity.risk_weight();
        self.counters.record(kind);
        self.stats.violations.push(event.clone());

        tracing::info!(
            kind = %kind,
            severity = %event.severity,
            risk_score = self.stats.risk_score,
            "Violation recorded"
        );
        Some(event)
    }

    pub fn record_blink(&mut self) -> u32 {
        self.stats.total_blinks += 1;
        self.stats.total_blinks
    }

    pub fn set_gaze_direction(&mut self, direction: GazeDirection) {
        self.stats.gaze_direction = direction;
    }

    pub fn set_faces_detected(&mut self, count: usize) {
        self.stats.faces_detected = count;
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn counters(&self) -> &ViolationCounters {
        &self.counters
    }
}
