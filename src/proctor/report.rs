//! 会话报告
//!
//! 停止监控时从聚合器状态生成一次，之后只读。字段名与已存储报告保持一致。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_SUBJECT_LABEL;
use crate::proctor::risk::RiskAggregator;
use crate::proctor::types::ViolationEvent;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub filename: String,
    /// `YYYYmmdd_HHMMSS`
    pub timestamp: String,
    /// `YYYY-mm-dd HH:MM:SS`
    pub date: String,
    pub duration_seconds: i64,
    pub total_violations: usize,
    pub risk_score: u32,
    pub total_blinks: u32,
    pub excessive_blink_count: u32,
    pub gaze_away_count: u32,
    pub no_face_count: u32,
    pub multiple_faces_count: u32,
    pub talking_count: u32,
    pub eyes_closed_count: u32,
    pub violations: Vec<ViolationEvent>,
}

impl SessionReport {
    /// 只读取聚合器，不修改会话状态
    pub fn build(
        aggregator: &RiskAggregator,
        started_at: DateTime<Utc>,
        stopped_at: DateTime<Utc>,
        label: &str,
    ) -> Self {
        let stats = aggregator.stats();
        let counters = aggregator.counters();
        let timestamp = stopped_at.format("%Y%m%d_%H%M%S").to_string();

        Self {
            filename: format!("exam_report_{}_{}.json", sanitize_label(label), timestamp),
            date: stopped_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            timestamp,
            duration_seconds: (stopped_at - started_at).num_seconds().max(0),
            total_violations: stats.violations.len(),
            risk_score: stats.risk_score,
            total_blinks: stats.total_blinks,
            excessive_blink_count: counters.excessive_blink_count,
            gaze_away_count: counters.gaze_away_count,
            no_face_count: counters.no_face_count,
            multiple_faces_count: counters.multiple_faces_count,
            talking_count: counters.talking_count,
            eyes_closed_count: counters.eyes_closed_count,
            violations: stats.violations.clone(),
        }
    }
}

/// 文件名中只保留 `[A-Za-z0-9_-]`，空标识使用占位
fn sanitize_label(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        DEFAULT_SUBJECT_LABEL.to_string()
    } else {
        cleaned
    }
}
