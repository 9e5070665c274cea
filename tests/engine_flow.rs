mod common;

use chrono::Duration;
use tokio::sync::mpsc;

use common::fixtures::{closed_frame, neutral_frame, two_face_frame, FaceBuilder, Harness, FRAME_MS};
use vigilcam_engine::proctor::config::ThresholdConfig;
use vigilcam_engine::proctor::engine::EnginePhase;
use vigilcam_engine::proctor::types::{GazeDirection, LandmarkFrame, Severity, ViolationKind};
use vigilcam_engine::EngineError;

fn kinds(events: &[vigilcam_engine::proctor::types::ViolationEvent]) -> Vec<ViolationKind> {
    events.iter().map(|e| e.kind).collect()
}

#[test]
fn e2e_empty_room_for_6001ms_is_one_left_frame() {
    let mut h = Harness::calibrated();
    h.hold(&LandmarkFrame::empty(), 6001);
    let report = h.engine.stop_monitoring().unwrap();

    assert_eq!(report.total_violations, 1);
    assert_eq!(kinds(&report.violations), vec![ViolationKind::LeftFrame]);
    assert_eq!(report.violations[0].severity, Severity::High);
    assert_eq!(report.no_face_count, 1);
    assert_eq!(report.risk_score, 10);
}

#[test]
fn e2e_stop_before_no_face_deadline_emits_nothing() {
    let mut h = Harness::calibrated();
    h.hold(&LandmarkFrame::empty(), 5900);
    let report = h.engine.stop_monitoring().unwrap();
    assert_eq!(report.total_violations, 0);
    assert_eq!(report.risk_score, 0);

    // 停止后不会再有事件，帧被忽略
    h.clock.advance_ms(60_000);
    assert!(h.engine.advance().is_empty());
    assert!(h.engine.process_frame(&LandmarkFrame::empty()).is_empty());
    assert_eq!(h.engine.phase(), EnginePhase::Stopped);
    assert_eq!(h.engine.report(), Some(&report));
}

#[test]
fn e2e_pending_timers_do_not_leak_into_next_session() {
    let mut h = Harness::calibrated();
    // 无人脸计时器在约 6000ms 到期，停止时仍挂起
    h.hold(&LandmarkFrame::empty(), 5000);
    let first = h.engine.stop_monitoring().unwrap();
    assert_eq!(first.total_violations, 0);

    h.calibrate_and_start();
    h.clock.advance_ms(10_000);
    assert!(h.engine.advance().is_empty());
    assert!(h.engine.stats().unwrap().violations.is_empty());

    // 闭眼计时器同理
    h.hold(&closed_frame(), 3000);
    h.engine.stop_monitoring().unwrap();
    h.calibrate_and_start();
    h.clock.advance_ms(10_000);
    assert!(h.engine.advance().is_empty());

    let report = h.engine.stop_monitoring().unwrap();
    assert_eq!(report.total_violations, 0);
    assert_eq!(report.no_face_count, 0);
    assert_eq!(report.eyes_closed_count, 0);
}

#[test]
fn e2e_face_returning_cancels_no_face_timer() {
    let mut h = Harness::calibrated();
    h.hold(&LandmarkFrame::empty(), 5000);
    h.hold(&neutral_frame(), 500);
    h.hold(&LandmarkFrame::empty(), 5000);
    let report = h.engine.stop_monitoring().unwrap();
    assert_eq!(report.no_face_count, 0);
}

#[test]
fn e2e_new_session_resets_stats() {
    let mut h = Harness::calibrated();
    h.blink();
    h.hold(&FaceBuilder::new().gaze(0.2, 0.5).frame(), 4500);
    h.hold(&LandmarkFrame::empty(), 100);
    let first = h.engine.stop_monitoring().unwrap();
    assert_eq!(first.total_blinks, 1);
    assert_eq!(first.gaze_away_count, 1);
    let first_id = h.engine.session_id();

    h.calibrate_and_start();
    let snap = h.engine.snapshot();
    assert_ne!(snap.session_id, first_id);
    assert_eq!(snap.total_blinks, 0);
    assert!(snap.violations.is_empty());
    assert_eq!(snap.risk_score, 0);
    assert_eq!(snap.gaze_direction, GazeDirection::Center);
    assert_eq!(snap.faces_detected, 0);
}

#[test]
fn e2e_blink_counting_rules() {
    let mut h = Harness::calibrated();

    // 单帧闭眼不算眨眼
    h.feed(&closed_frame(), FRAME_MS);
    h.feed(&neutral_frame(), FRAME_MS);
    assert_eq!(h.engine.stats().unwrap().total_blinks, 0);

    h.hold(&neutral_frame(), 400);
    h.blink();
    assert_eq!(h.engine.stats().unwrap().total_blinks, 1);

    // 紧接着的第二次眨眼距上次不足 350ms
    h.blink();
    assert_eq!(h.engine.stats().unwrap().total_blinks, 1);

    h.hold(&neutral_frame(), 400);
    h.blink();
    assert_eq!(h.engine.stats().unwrap().total_blinks, 2);
}

#[test]
fn e2e_excessive_blinking_is_throttled() {
    let mut h = Harness::calibrated();
    let mut events = Vec::new();

    // 每 429ms 一次眨眼
    for _ in 0..40 {
        events.extend(h.blink());
        events.extend(h.hold(&neutral_frame(), 300));
    }
    assert!(events.is_empty());
    assert_eq!(h.engine.stats().unwrap().total_blinks, 40);

    events.extend(h.blink());
    assert_eq!(kinds(&events), vec![ViolationKind::ExcessiveBlinking]);
    events.extend(h.hold(&neutral_frame(), 300));

    for _ in 0..11 {
        events.extend(h.blink());
        events.extend(h.hold(&neutral_frame(), 300));
    }
    assert_eq!(events.len(), 1);

    events.extend(h.blink());
    assert_eq!(events.len(), 2);
    assert!(events[1].timestamp - events[0].timestamp >= Duration::milliseconds(5000));

    let report = h.engine.stop_monitoring().unwrap();
    assert_eq!(report.excessive_blink_count, 2);
    assert_eq!(report.total_blinks, 53);
}

#[test]
fn e2e_eyes_closed_fires_at_deadline_once() {
    let mut h = Harness::calibrated();
    let started = h.clock.millis();
    let events = h.hold(&closed_frame(), 10_000);

    assert_eq!(kinds(&events), vec![ViolationKind::EyesClosed]);
    assert_eq!(events[0].timestamp.timestamp_millis(), started + 4000);
    assert_eq!(events[0].severity, Severity::Medium);
}

#[test]
fn e2e_gaze_away_reports_direction() {
    let mut h = Harness::calibrated();
    let events = h.hold(&FaceBuilder::new().gaze(0.3, 0.5).frame(), 4100);
    assert_eq!(
        kinds(&events),
        vec![ViolationKind::GazeAway(GazeDirection::Left)]
    );
    assert_eq!(events[0].kind.to_string(), "GAZE AWAY - LOOKING LEFT");
    assert_eq!(h.engine.stats().unwrap().gaze_direction, GazeDirection::Left);

    h.feed(&neutral_frame(), FRAME_MS);
    assert_eq!(h.engine.stats().unwrap().gaze_direction, GazeDirection::Center);

    // 视线偏离不足 4 秒就回到中心，不触发
    let events = h.hold(&FaceBuilder::new().gaze(0.5, 0.3).frame(), 3000);
    assert!(events.is_empty());
    assert_eq!(h.engine.stats().unwrap().gaze_direction, GazeDirection::Up);
    h.hold(&neutral_frame(), 3000);

    let report = h.engine.stop_monitoring().unwrap();
    assert_eq!(report.gaze_away_count, 1);
}

#[test]
fn e2e_missing_iris_skips_gaze_only() {
    let mut h = Harness::calibrated();
    let frame = FaceBuilder::new().without_iris().eyes_closed().frame();
    let events = h.hold(&frame, 4100);
    assert_eq!(kinds(&events), vec![ViolationKind::EyesClosed]);
    assert_eq!(h.engine.stats().unwrap().gaze_direction, GazeDirection::Center);
}

fn talking_frame(i: usize) -> LandmarkFrame {
    let gap = if i % 2 == 0 { 0.0 } else { 1.6 };
    FaceBuilder::new().mouth_gap(gap).frame()
}

#[test]
fn e2e_sustained_talking_fires_once() {
    let mut h = Harness::calibrated();
    let mut events = Vec::new();
    for i in 0..121 {
        events.extend(h.feed(&talking_frame(i), FRAME_MS));
    }
    assert_eq!(kinds(&events), vec![ViolationKind::Talking]);
    assert_eq!(events[0].severity, Severity::High);
}

#[test]
fn e2e_brief_talking_is_cancelled() {
    let mut h = Harness::calibrated();
    let mut events = Vec::new();
    for i in 0..30 {
        events.extend(h.feed(&talking_frame(i), FRAME_MS));
    }
    events.extend(h.hold(&neutral_frame(), 5000));
    assert!(events.is_empty());
    let report = h.engine.stop_monitoring().unwrap();
    assert_eq!(report.talking_count, 0);
}

#[test]
fn e2e_head_turn_is_immediate_and_throttled() {
    let mut h = Harness::calibrated();
    let events = h.hold(&FaceBuilder::new().nose_x(0.8).frame(), 6000);
    assert_eq!(
        kinds(&events),
        vec![ViolationKind::HeadTurned, ViolationKind::HeadTurned]
    );

    let report = h.engine.stop_monitoring().unwrap();
    assert_eq!(report.risk_score, 10);
    // 头部偏转没有独立计数
    assert_eq!(
        report.excessive_blink_count
            + report.gaze_away_count
            + report.no_face_count
            + report.multiple_faces_count
            + report.talking_count
            + report.eyes_closed_count,
        0
    );
}

#[test]
fn e2e_throttle_compares_against_last_event_only() {
    let mut h = Harness::calibrated();
    let turned = FaceBuilder::new().nose_x(0.1).frame();
    let mut events = h.feed(&turned, FRAME_MS);
    events.extend(h.feed(&two_face_frame(), FRAME_MS));
    events.extend(h.feed(&turned, FRAME_MS));
    assert_eq!(
        kinds(&events),
        vec![
            ViolationKind::HeadTurned,
            ViolationKind::MultipleFaces,
            ViolationKind::HeadTurned,
        ]
    );
    assert_eq!(h.engine.stats().unwrap().risk_score, 5 + 10 + 5);
}

#[test]
fn e2e_multiple_faces_once_per_window() {
    let mut h = Harness::calibrated();
    let events = h.hold(&two_face_frame(), 4900);
    assert_eq!(kinds(&events), vec![ViolationKind::MultipleFaces]);
    assert_eq!(h.engine.stats().unwrap().faces_detected, 2);
}

#[test]
fn e2e_sink_sees_events_in_emission_order() {
    let mut h = Harness::calibrated();
    let (tx, mut rx) = mpsc::unbounded_channel();
    h.engine.set_sink(tx);

    h.feed(&FaceBuilder::new().nose_x(0.9).frame(), FRAME_MS);
    h.feed(&two_face_frame(), FRAME_MS);
    h.hold(&closed_frame(), 4100);
    h.hold(&LandmarkFrame::empty(), 6100);
    let report = h.engine.stop_monitoring().unwrap();

    let mut delivered = Vec::new();
    while let Ok(event) = rx.try_recv() {
        delivered.push(event);
    }
    assert_eq!(delivered, report.violations);
    assert_eq!(
        kinds(&delivered),
        vec![
            ViolationKind::HeadTurned,
            ViolationKind::MultipleFaces,
            ViolationKind::EyesClosed,
            ViolationKind::LeftFrame,
        ]
    );
}

#[test]
fn e2e_calibration_can_finish_during_monitoring() {
    let mut h = Harness::new();
    h.engine.start_monitoring().unwrap();
    h.hold(&FaceBuilder::new().gaze(0.6, 0.5).frame(), 1000);
    assert!(!h.engine.snapshot().calibrated);

    let baseline = h.engine.finish_calibration().unwrap();
    assert!((baseline.x - 0.6).abs() < 1e-9);
    assert!(matches!(
        h.engine.finish_calibration(),
        Err(EngineError::InvalidPhase { .. })
    ));

    h.feed(&FaceBuilder::new().gaze(0.6, 0.5).frame(), FRAME_MS);
    assert_eq!(h.engine.stats().unwrap().gaze_direction, GazeDirection::Center);
    h.feed(&FaceBuilder::new().gaze(0.45, 0.5).frame(), FRAME_MS);
    assert_eq!(h.engine.stats().unwrap().gaze_direction, GazeDirection::Left);
}

#[test]
fn e2e_report_uses_subject_label_and_duration() {
    let mut h = Harness::calibrated();
    h.hold(&neutral_frame(), 65_000);
    let report = h.engine.stop_monitoring().unwrap();
    assert!(report.filename.starts_with("exam_report_tester_"));
    assert!(report.filename.ends_with(".json"));
    assert_eq!(report.duration_seconds, 65);
    assert_eq!(report.total_violations, 0);
}

#[test]
fn e2e_loud_noise_after_audio_calibration() {
    let mut h = Harness::with_config(ThresholdConfig {
        noise_frames: 5,
        ..ThresholdConfig::default()
    });
    h.engine.begin_calibration().unwrap();
    for _ in 0..30 {
        h.feed(&neutral_frame().with_audio(0.02), FRAME_MS);
    }
    let baseline = h.engine.finish_calibration().unwrap();
    assert!((baseline.audio_baseline.unwrap() - 0.03).abs() < 1e-9);
    h.engine.start_monitoring().unwrap();

    let events = h.hold(&neutral_frame().with_audio(0.5), 33 * 6);
    assert_eq!(kinds(&events), vec![ViolationKind::LoudNoise]);
    assert_eq!(events[0].severity, Severity::Low);
}
