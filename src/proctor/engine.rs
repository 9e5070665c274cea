//! 监考引擎
//!
//! 生命周期：Idle → Calibrating → Calibrated → Monitoring → Stopped。
//! 任意非监控状态都可以重新开始标定；开始监控时创建全新的会话状态，
//! 上一个会话在此之前保持可查询。
//!
//! 引擎不可重入，所有方法都需要 `&mut self`，单帧处理完成前不会开始下一帧。

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::constants::DEFAULT_SUBJECT_LABEL;
use crate::error::EngineError;
use crate::proctor::calibration::{Baseline, Calibration};
use crate::proctor::clock::{Clock, SystemClock};
use crate::proctor::config::{validate_all, LandmarkLayout, ThresholdConfig};
use crate::proctor::detector::{self, MonitoringState};
use crate::proctor::report::SessionReport;
use crate::proctor::types::{iso_millis, GazeDirection, LandmarkFrame, SessionStats, ViolationEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnginePhase {
    Idle,
    Calibrating,
    Calibrated,
    Monitoring,
    Stopped,
}

impl EnginePhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Calibrating => "calibrating",
            Self::Calibrated => "calibrated",
            Self::Monitoring => "monitoring",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for EnginePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 违规事件的下游接收方，按发出顺序逐条投递
pub trait ViolationSink: Send {
    fn deliver(&mut self, event: &ViolationEvent);
}

/// 以闭包作为接收方
pub struct CallbackSink<F>(pub F);

impl<F> ViolationSink for CallbackSink<F>
where
    F: FnMut(&ViolationEvent) + Send,
{
    fn deliver(&mut self, event: &ViolationEvent) {
        (self.0)(event)
    }
}

impl ViolationSink for tokio::sync::mpsc::UnboundedSender<ViolationEvent> {
    fn deliver(&mut self, event: &ViolationEvent) {
        if self.send(event.clone()).is_err() {
            tracing::debug!(kind = %event.kind, "Violation receiver dropped");
        }
    }
}

/// 供实时观察者读取的只读快照
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub session_id: Option<Uuid>,
    pub phase: EnginePhase,
    #[serde(with = "iso_millis")]
    pub timestamp: DateTime<Utc>,
    pub total_blinks: u32,
    pub violations: Vec<ViolationEvent>,
    pub risk_score: u32,
    pub gaze_direction: GazeDirection,
    pub faces_detected: usize,
    pub calibrated: bool,
    pub baseline: Option<Baseline>,
}

struct Session {
    id: Uuid,
    started_at: DateTime<Utc>,
    state: MonitoringState,
    report: Option<SessionReport>,
}

pub struct ProctorEngine<C: Clock = SystemClock> {
    thresholds: ThresholdConfig,
    layout: LandmarkLayout,
    clock: C,
    phase: EnginePhase,
    /// 标定阶段的累积器，开始监控时移交给会话
    calibration: Calibration,
    session: Option<Session>,
    sink: Option<Box<dyn ViolationSink>>,
    subject_label: String,
}

impl<C: Clock> ProctorEngine<C> {
    /// 配置非法时立即失败
    pub fn new(thresholds: ThresholdConfig, layout: LandmarkLayout, clock: C) -> Result<Self, EngineError> {
        validate_all(&thresholds, &layout)?;
        Ok(Self {
            thresholds,
            layout,
            clock,
            phase: EnginePhase::Idle,
            calibration: Calibration::new(),
            session: None,
            sink: None,
            subject_label: DEFAULT_SUBJECT_LABEL.to_string(),
        })
    }

    pub fn with_subject_label(mut self, label: impl Into<String>) -> Self {
        self.subject_label = label.into();
        self
    }

    pub fn set_sink(&mut self, sink: impl ViolationSink + 'static) {
        self.sink = Some(Box::new(sink));
    }

    pub fn clear_sink(&mut self) {
        self.sink = None;
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    pub fn thresholds(&self) -> &ThresholdConfig {
        &self.thresholds
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session.as_ref().map(|s| s.id)
    }

    /// 当前（或刚停止的）会话统计
    pub fn stats(&self) -> Option<&SessionStats> {
        self.session.as_ref().map(|s| s.state.aggregator.stats())
    }

    /// 当前（或刚停止的）会话内部状态，停止后眨眼与嘴部缓冲仍可查看
    pub fn monitoring_state(&self) -> Option<&MonitoringState> {
        self.session.as_ref().map(|s| &s.state)
    }

    pub fn report(&self) -> Option<&SessionReport> {
        self.session.as_ref().and_then(|s| s.report.as_ref())
    }

    pub fn begin_calibration(&mut self) -> Result<(), EngineError> {
        if self.phase == EnginePhase::Monitoring {
            return Err(EngineError::InvalidPhase {
                expected: "idle, calibrated or stopped",
                actual: self.phase,
            });
        }
        self.calibration = Calibration::new();
        self.calibration.begin();
        self.phase = EnginePhase::Calibrating;
        tracing::info!("Calibration started");
        Ok(())
    }

    /// 结束标定并返回基线
    ///
    /// 监控中且会话尚未标定时也可调用，基线取会话开始后累积的视线样本。
    pub fn finish_calibration(&mut self) -> Result<Baseline, EngineError> {
        match self.phase {
            EnginePhase::Calibrating => {
                let baseline = self.calibration.finish();
                self.phase = EnginePhase::Calibrated;
                Ok(baseline)
            }
            EnginePhase::Monitoring => {
                let session = self.session.as_mut().ok_or(EngineError::NotMonitoring)?;
                if session.state.calibration.is_calibrated() {
                    return Err(EngineError::InvalidPhase {
                        expected: "calibrating",
                        actual: self.phase,
                    });
                }
                Ok(session.state.calibration.finish())
            }
            actual => Err(EngineError::InvalidPhase {
                expected: "calibrating",
                actual,
            }),
        }
    }

    /// 开始监控，统计在此归零；返回新会话 ID
    pub fn start_monitoring(&mut self) -> Result<Uuid, EngineError> {
        if self.phase == EnginePhase::Monitoring {
            return Err(EngineError::InvalidPhase {
                expected: "idle, calibrated or stopped",
                actual: self.phase,
            });
        }

        let calibration = std::mem::take(&mut self.calibration);
        if !calibration.is_calibrated() {
            tracing::warn!("Monitoring started without a finished calibration");
        }

        let id = Uuid::new_v4();
        let started_at = self.clock.now();
        self.session = Some(Session {
            id,
            started_at,
            state: MonitoringState::new(calibration, &self.thresholds),
            report: None,
        });
        self.phase = EnginePhase::Monitoring;
        tracing::info!(session_id = %id, "Monitoring started");
        Ok(id)
    }

    /// 处理一帧；非标定、非监控阶段的帧被忽略
    pub fn process_frame(&mut self, frame: &LandmarkFrame) -> Vec<ViolationEvent> {
        match self.phase {
            EnginePhase::Calibrating => {
                detector::feed_calibration(&mut self.calibration, frame, &self.layout);
                Vec::new()
            }
            EnginePhase::Monitoring => {
                let now = self.clock.now();
                let Some(session) = self.session.as_mut() else {
                    return Vec::new();
                };
                let events = detector::process_frame(
                    &mut session.state,
                    frame,
                    now,
                    &self.thresholds,
                    &self.layout,
                );
                self.deliver(&events);
                events
            }
            phase => {
                tracing::trace!(phase = %phase, "Frame ignored");
                Vec::new()
            }
        }
    }

    /// 按当前时钟触发到期的计时器，无新帧时由宿主周期调用
    pub fn advance(&mut self) -> Vec<ViolationEvent> {
        if self.phase != EnginePhase::Monitoring {
            return Vec::new();
        }
        let now = self.clock.now();
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        let events = detector::advance(&mut session.state, now);
        self.deliver(&events);
        events
    }

    /// 停止监控：先触发已到期的计时器，再取消全部计时器，最后生成报告
    ///
    /// 返回后不会再有任何违规事件发出。
    pub fn stop_monitoring(&mut self) -> Result<SessionReport, EngineError> {
        if self.phase != EnginePhase::Monitoring {
            return Err(EngineError::NotMonitoring);
        }
        let now = self.clock.now();
        let session = self.session.as_mut().ok_or(EngineError::NotMonitoring)?;
        let session_id = session.id;

        let events = detector::advance(&mut session.state, now);
        session.state.timers.cancel_all();

        let report = SessionReport::build(
            &session.state.aggregator,
            session.started_at,
            now,
            &self.subject_label,
        );
        session.report = Some(report.clone());
        self.phase = EnginePhase::Stopped;
        self.deliver(&events);

        tracing::info!(
            session_id = %session_id,
            duration_seconds = report.duration_seconds,
            total_violations = report.total_violations,
            risk_score = report.risk_score,
            "Monitoring stopped"
        );
        Ok(report)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let timestamp = self.clock.now();
        match &self.session {
            Some(session) => {
                let stats = session.state.aggregator.stats();
                let calibration = &session.state.calibration;
                StatsSnapshot {
                    session_id: Some(session.id),
                    phase: self.phase,
                    timestamp,
                    total_blinks: stats.total_blinks,
                    violations: stats.violations.clone(),
                    risk_score: stats.risk_score,
                    gaze_direction: stats.gaze_direction,
                    faces_detected: stats.faces_detected,
                    calibrated: calibration.is_calibrated(),
                    baseline: calibration.is_calibrated().then(|| calibration.summary()),
                }
            }
            None => {
                let stats = SessionStats::default();
                StatsSnapshot {
                    session_id: None,
                    phase: self.phase,
                    timestamp,
                    total_blinks: stats.total_blinks,
                    violations: stats.violations,
                    risk_score: stats.risk_score,
                    gaze_direction: stats.gaze_direction,
                    faces_detected: stats.faces_detected,
                    calibrated: self.calibration.is_calibrated(),
                    baseline: None,
                }
            }
        }
    }

    fn deliver(&mut self, events: &[ViolationEvent]) {
        if let Some(sink) = self.sink.as_mut() {
            for event in events {
                sink.deliver(event);
            }
        }
    }
}
