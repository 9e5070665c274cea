//! 违规状态机
//!
//! 一个监控会话的全部可变状态集中在 `MonitoringState`，逐帧以独占引用传入。
//! 每帧先推进计时器，再依次执行：无人脸分支、多人脸、眨眼/闭眼、视线、
//! 说话、头部偏转、环境噪声。所有违规都经由 `RiskAggregator` 节流后记录。

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};

use crate::proctor::calibration::Calibration;
use crate::proctor::config::{LandmarkLayout, ThresholdConfig};
use crate::proctor::features::{self, FrameFeatures, MouthWindow};
use crate::proctor::risk::RiskAggregator;
use crate::proctor::timers::{Condition, DetectionTimers};
use crate::proctor::types::{GazeDirection, LandmarkFrame, ViolationEvent, ViolationKind};

/// 眨眼计数状态
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlinkState {
    pub closed_frames: u32,
    pub last_blink_at: Option<DateTime<Utc>>,
    /// 统计窗口内已接受的眨眼时间
    pub history: VecDeque<DateTime<Utc>>,
}

impl BlinkState {
    fn prune(&mut self, now: DateTime<Utc>, window: Duration) {
        while let Some(&oldest) = self.history.front() {
            if now - oldest < window {
                break;
            }
            self.history.pop_front();
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonitoringState {
    pub calibration: Calibration,
    pub blink: BlinkState,
    pub timers: DetectionTimers,
    pub mouth: MouthWindow,
    pub aggregator: RiskAggregator,
    /// 连续超过噪声阈值的帧数
    pub noise_frames: u32,
}

impl MonitoringState {
    pub fn new(calibration: Calibration, thresholds: &ThresholdConfig) -> Self {
        Self {
            calibration,
            blink: BlinkState::default(),
            timers: DetectionTimers::new(),
            mouth: MouthWindow::new(thresholds.mouth_window, thresholds.mouth_min_samples),
            aggregator: RiskAggregator::new(thresholds.throttle_ms),
            noise_frames: 0,
        }
    }
}

/// 标定阶段的一帧：只取第一张人脸的虹膜中心与本帧音量
pub fn feed_calibration(calibration: &mut Calibration, frame: &LandmarkFrame, layout: &LandmarkLayout) {
    if let Some(gaze) = frame
        .primary_face()
        .and_then(|face| features::extract(face, layout).gaze)
    {
        calibration.accumulate(gaze);
    }
    if let Some(rms) = frame.audio_rms {
        calibration.accumulate_audio(rms);
    }
}

/// 触发所有 `deadline <= now` 的去抖计时器，事件时间取各自的到期时刻
pub fn advance(state: &mut MonitoringState, now: DateTime<Utc>) -> Vec<ViolationEvent> {
    state
        .timers
        .take_due(now)
        .into_iter()
        .filter_map(|due| {
            tracing::debug!(condition = due.condition.as_str(), "Debounce timer fired");
            state.aggregator.try_record(due.kind, due.deadline)
        })
        .collect()
}

/// 处理一帧，返回本次调用中被接受的违规（含先行到期的计时器）
pub fn process_frame(
    state: &mut MonitoringState,
    frame: &LandmarkFrame,
    now: DateTime<Utc>,
    thresholds: &ThresholdConfig,
    layout: &LandmarkLayout,
) -> Vec<ViolationEvent> {
    let mut events = advance(state, now);

    let Some(face) = frame.primary_face() else {
        state.aggregator.set_gaze_direction(GazeDirection::NoFace);
        state.aggregator.set_faces_detected(0);
        state
            .timers
            .arm(Condition::NoFace, now, thresholds.no_face_ms, ViolationKind::LeftFrame);
        return events;
    };

    state.timers.clear(Condition::NoFace);
    let face_count = frame.face_count();
    state.aggregator.set_faces_detected(face_count);
    if face_count > 1 {
        events.extend(state.aggregator.try_record(ViolationKind::MultipleFaces, now));
    }

    let feats = features::extract(face, layout);

    if let Some(ear) = feats.ear {
        events.extend(analyze_eyes(state, ear, now, thresholds));
    }
    analyze_gaze(state, &feats, now, thresholds);
    if let Some(opening) = feats.mouth_opening {
        analyze_mouth(state, opening, now, thresholds);
    }
    if let Some(yaw) = feats.head_yaw {
        if yaw > thresholds.head_turn_threshold {
            events.extend(state.aggregator.try_record(ViolationKind::HeadTurned, now));
        }
    }
    if let Some(rms) = frame.audio_rms {
        events.extend(analyze_noise(state, rms, now, thresholds));
    }

    events
}

fn analyze_eyes(
    state: &mut MonitoringState,
    ear: f64,
    now: DateTime<Utc>,
    thresholds: &ThresholdConfig,
) -> Option<ViolationEvent> {
    if ear < thresholds.ear_blink {
        state.blink.closed_frames += 1;
        state.timers.arm(
            Condition::EyesClosed,
            now,
            thresholds.eyes_closed_ms,
            ViolationKind::EyesClosed,
        );
        return None;
    }

    state.timers.clear(Condition::EyesClosed);
    let completed = state.blink.closed_frames >= thresholds.blink_frames;
    state.blink.closed_frames = 0;
    if !completed {
        return None;
    }

    let separated = state.blink.last_blink_at.map_or(true, |last| {
        now - last > Duration::milliseconds(thresholds.blink_min_sep_ms)
    });
    if !separated {
        tracing::trace!("Blink too close to previous one, ignored");
        return None;
    }

    state.blink.last_blink_at = Some(now);
    let total = state.aggregator.record_blink();
    state.blink.history.push_back(now);
    state
        .blink
        .prune(now, Duration::milliseconds(thresholds.blink_window_ms));
    tracing::trace!(total_blinks = total, window = state.blink.history.len(), "Blink counted");

    if state.blink.history.len() > thresholds.excessive_blinks {
        return state
            .aggregator
            .try_record(ViolationKind::ExcessiveBlinking, now);
    }
    None
}

fn analyze_gaze(
    state: &mut MonitoringState,
    feats: &FrameFeatures,
    now: DateTime<Utc>,
    thresholds: &ThresholdConfig,
) {
    let Some(gaze) = feats.gaze else {
        return;
    };
    if !state.calibration.is_calibrated() {
        state.calibration.accumulate(gaze);
        return;
    }

    let direction = features::classify_gaze(gaze, state.calibration.baseline(), thresholds);
    if direction == GazeDirection::Center {
        state.timers.clear(Condition::GazeAway);
    } else {
        state.timers.arm(
            Condition::GazeAway,
            now,
            thresholds.gaze_away_ms,
            ViolationKind::GazeAway(direction),
        );
    }
    state.aggregator.set_gaze_direction(direction);
}

fn analyze_mouth(
    state: &mut MonitoringState,
    opening: f64,
    now: DateTime<Utc>,
    thresholds: &ThresholdConfig,
) {
    state.mouth.push(opening);
    let Some(variance) = state.mouth.variance() else {
        return;
    };
    if variance > thresholds.mouth_movement {
        state
            .timers
            .arm(Condition::Talking, now, thresholds.talking_ms, ViolationKind::Talking);
    } else {
        state.timers.clear(Condition::Talking);
    }
}

fn analyze_noise(
    state: &mut MonitoringState,
    rms: f64,
    now: DateTime<Utc>,
    thresholds: &ThresholdConfig,
) -> Option<ViolationEvent> {
    let Some(baseline) = state.calibration.audio_baseline() else {
        state.calibration.accumulate_audio(rms);
        return None;
    };

    if rms <= baseline * thresholds.noise_sensitivity {
        state.noise_frames = 0;
        return None;
    }

    state.noise_frames += 1;
    if state.noise_frames <= thresholds.noise_frames {
        return None;
    }
    state.noise_frames = 0;
    state.aggregator.try_record(ViolationKind::LoudNoise, now)
}
