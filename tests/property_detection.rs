use chrono::DateTime;
use proptest::prelude::*;

use vigilcam_engine::proctor::calibration::Calibration;
use vigilcam_engine::proctor::config::ThresholdConfig;
use vigilcam_engine::proctor::features::{classify_gaze, eye_aspect_ratio};
use vigilcam_engine::proctor::geometry;
use vigilcam_engine::proctor::risk::RiskAggregator;
use vigilcam_engine::proctor::types::{GazeDirection, Point, ViolationKind};

fn point() -> impl Strategy<Value = Point> {
    (0.0_f64..1.0, 0.0_f64..1.0).prop_map(|(x, y)| Point::new(x, y))
}

fn kind() -> impl Strategy<Value = ViolationKind> {
    prop_oneof![
        Just(ViolationKind::LeftFrame),
        Just(ViolationKind::MultipleFaces),
        Just(ViolationKind::EyesClosed),
        Just(ViolationKind::ExcessiveBlinking),
        Just(ViolationKind::GazeAway(GazeDirection::Left)),
        Just(ViolationKind::GazeAway(GazeDirection::Up)),
        Just(ViolationKind::Talking),
        Just(ViolationKind::HeadTurned),
        Just(ViolationKind::LoudNoise),
    ]
}

proptest! {
    #[test]
    fn pt_ear_zero_for_degenerate_width(corner in point(), lids in prop::array::uniform4(point())) {
        let eye = [corner, lids[0], lids[1], corner, lids[2], lids[3]];
        prop_assert_eq!(eye_aspect_ratio(&eye), 0.0);
    }

    #[test]
    fn pt_ear_non_negative(eye in prop::array::uniform6(point())) {
        prop_assert!(eye_aspect_ratio(&eye) >= 0.0);
    }

    #[test]
    fn pt_variance_non_negative(values in prop::collection::vec(0.0_f64..1.0, 0..64)) {
        prop_assert!(geometry::variance(&values) >= -1e-12);
    }

    #[test]
    fn pt_gaze_within_deltas_is_center(
        base in point(),
        dx in -0.07_f64..=0.07,
        dy in -0.06_f64..=0.06,
    ) {
        let cfg = ThresholdConfig::default();
        let gaze = Point::new(base.x + dx, base.y + dy);
        // 浮点加减可能越过边界
        prop_assume!((gaze.x - base.x).abs() <= cfg.gaze_x_delta);
        prop_assume!((gaze.y - base.y).abs() <= cfg.gaze_y_delta);
        prop_assert_eq!(classify_gaze(gaze, base, &cfg), GazeDirection::Center);
    }

    #[test]
    fn pt_gaze_direction_follows_dominant_axis(base in point(), gaze in point()) {
        let cfg = ThresholdConfig::default();
        let dx = gaze.x - base.x;
        let dy = gaze.y - base.y;
        let direction = classify_gaze(gaze, base, &cfg);
        match direction {
            GazeDirection::Center => {
                prop_assert!(dx.abs() <= cfg.gaze_x_delta && dy.abs() <= cfg.gaze_y_delta)
            }
            GazeDirection::Left => prop_assert!(dx < 0.0 && dx.abs() > dy.abs()),
            GazeDirection::Right => prop_assert!(dx > 0.0 && dx.abs() > dy.abs()),
            GazeDirection::Up => prop_assert!(dy < 0.0 && dy.abs() >= dx.abs()),
            GazeDirection::Down => prop_assert!(dy >= 0.0 && dy.abs() >= dx.abs()),
            GazeDirection::NoFace => prop_assert!(false, "classifier never yields NO_FACE"),
        }
    }

    #[test]
    fn pt_calibration_baseline_is_mean(samples in prop::collection::vec(point(), 1..50)) {
        let mut calib = Calibration::new();
        calib.begin();
        for p in &samples {
            calib.accumulate(*p);
        }
        let baseline = calib.finish();
        let n = samples.len() as f64;
        let mx = samples.iter().map(|p| p.x).sum::<f64>() / n;
        let my = samples.iter().map(|p| p.y).sum::<f64>() / n;
        prop_assert!((baseline.x - mx).abs() < 1e-9);
        prop_assert!((baseline.y - my).abs() < 1e-9);
        prop_assert!(calib.is_calibrated());
    }

    #[test]
    fn pt_risk_score_matches_recorded_events(
        attempts in prop::collection::vec((kind(), 0_i64..3000), 1..80),
    ) {
        let mut agg = RiskAggregator::new(5000);
        let mut now = 0_i64;
        for (kind, gap) in attempts {
            now += gap;
            let at = DateTime::from_timestamp_millis(now).unwrap();
            agg.try_record(kind, at);
        }
        let stats = agg.stats();
        let expected: u32 = stats.violations.iter().map(|e| e.severity.risk_weight()).sum();
        prop_assert_eq!(stats.risk_score, expected);

        // 相邻的同类事件间隔不小于节流窗口
        for pair in stats.violations.windows(2) {
            if pair[0].kind == pair[1].kind {
                prop_assert!((pair[1].timestamp - pair[0].timestamp).num_milliseconds() >= 5000);
            }
        }

        let c = agg.counters();
        let counted = c.excessive_blink_count
            + c.gaze_away_count
            + c.no_face_count
            + c.multiple_faces_count
            + c.talking_count
            + c.eyes_closed_count;
        let uncounted = stats
            .violations
            .iter()
            .filter(|e| matches!(e.kind, ViolationKind::HeadTurned | ViolationKind::LoudNoise))
            .count() as u32;
        prop_assert_eq!(counted + uncounted, stats.violations.len() as u32);
    }
}
