use vigilcam_engine::proctor::clock::ManualClock;
use vigilcam_engine::proctor::config::{LandmarkLayout, ThresholdConfig};
use vigilcam_engine::proctor::types::{FaceLandmarks, LandmarkFrame, Point, ViolationEvent};
use vigilcam_engine::ProctorEngine;

/// FaceMesh refined 布局的关键点总数
pub const FACE_POINTS: usize = 478;

/// 测试用会话起点 2023-11-14T22:13:20Z
pub const T0: i64 = 1_700_000_000_000;

/// 30fps 帧间隔
pub const FRAME_MS: i64 = 33;

#[derive(Debug, Clone)]
pub struct FaceBuilder {
    eyes_open: bool,
    gaze: Option<Point>,
    nose_x: f64,
    mouth_gap: f64,
}

impl Default for FaceBuilder {
    fn default() -> Self {
        Self {
            eyes_open: true,
            gaze: Some(Point::new(0.5, 0.5)),
            nose_x: 0.5,
            mouth_gap: 0.0,
        }
    }
}

impl FaceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eyes_closed(mut self) -> Self {
        self.eyes_open = false;
        self
    }

    pub fn gaze(mut self, x: f64, y: f64) -> Self {
        self.gaze = Some(Point::new(x, y));
        self
    }

    pub fn without_iris(mut self) -> Self {
        self.gaze = None;
        self
    }

    pub fn nose_x(mut self, x: f64) -> Self {
        self.nose_x = x;
        self
    }

    pub fn mouth_gap(mut self, gap: f64) -> Self {
        self.mouth_gap = gap;
        self
    }

    pub fn build(&self) -> FaceLandmarks {
        let layout = LandmarkLayout::default();
        let len = if self.gaze.is_some() {
            FACE_POINTS
        } else {
            // 无虹膜的旧版 468 点布局
            layout.left_iris
        };
        let mut points = vec![Point::new(0.5, 0.5); len];

        // 睁眼 EAR = 0.6，闭眼 EAR = 0.02
        let lid = if self.eyes_open { 0.03 } else { 0.001 };
        for (eye, cx) in [(layout.left_eye, 0.4), (layout.right_eye, 0.6)] {
            let shape = [
                Point::new(cx - 0.05, 0.4),
                Point::new(cx - 0.02, 0.4 - lid),
                Point::new(cx + 0.02, 0.4 - lid),
                Point::new(cx + 0.05, 0.4),
                Point::new(cx + 0.02, 0.4 + lid),
                Point::new(cx - 0.02, 0.4 + lid),
            ];
            for (idx, p) in eye.iter().zip(shape) {
                points[*idx] = p;
            }
        }

        if let Some(gaze) = self.gaze {
            points[layout.left_iris] = gaze;
            points[layout.right_iris] = gaze;
        }
        points[layout.nose_tip] = Point::new(self.nose_x, 0.5);
        points[layout.mouth_top] = Point::new(0.5, 0.7);
        points[layout.mouth_bottom] = Point::new(0.5, 0.7 + self.mouth_gap);
        FaceLandmarks::new(points)
    }

    pub fn frame(&self) -> LandmarkFrame {
        LandmarkFrame::new(vec![self.build()])
    }
}

pub fn neutral_frame() -> LandmarkFrame {
    FaceBuilder::new().frame()
}

pub fn closed_frame() -> LandmarkFrame {
    FaceBuilder::new().eyes_closed().frame()
}

pub fn two_face_frame() -> LandmarkFrame {
    let face = FaceBuilder::new().build();
    LandmarkFrame::new(vec![face.clone(), face])
}

/// 以虚拟时钟驱动的引擎
pub struct Harness {
    pub engine: ProctorEngine<ManualClock>,
    pub clock: ManualClock,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ThresholdConfig::default())
    }

    pub fn with_config(config: ThresholdConfig) -> Self {
        let clock = ManualClock::at_millis(T0);
        let engine = ProctorEngine::new(config, LandmarkLayout::default(), clock.clone())
            .expect("valid engine config")
            .with_subject_label("tester");
        Self { engine, clock }
    }

    /// 以画面中心为基线完成标定并开始监控
    pub fn calibrated() -> Self {
        let mut h = Self::new();
        h.calibrate_and_start();
        h
    }

    pub fn calibrate_and_start(&mut self) {
        self.engine.begin_calibration().expect("begin calibration");
        for _ in 0..10 {
            self.engine.process_frame(&neutral_frame());
            self.clock.advance_ms(FRAME_MS);
        }
        self.engine.finish_calibration().expect("finish calibration");
        self.engine.start_monitoring().expect("start monitoring");
    }

    pub fn elapsed_ms(&self) -> i64 {
        self.clock.millis() - T0
    }

    /// 处理一帧后时钟前进 `step_ms`
    pub fn feed(&mut self, frame: &LandmarkFrame, step_ms: i64) -> Vec<ViolationEvent> {
        let events = self.engine.process_frame(frame);
        self.clock.advance_ms(step_ms);
        events
    }

    /// 在 `duration_ms` 内以 30fps 重复同一帧
    pub fn hold(&mut self, frame: &LandmarkFrame, duration_ms: i64) -> Vec<ViolationEvent> {
        let mut events = Vec::new();
        let mut spent = 0;
        while spent < duration_ms {
            events.extend(self.feed(frame, FRAME_MS));
            spent += FRAME_MS;
        }
        events
    }

    /// 闭眼两帧后睁眼一帧，构成一次完整眨眼
    pub fn blink(&mut self) -> Vec<ViolationEvent> {
        let mut events = self.feed(&closed_frame(), FRAME_MS);
        events.extend(self.feed(&closed_frame(), FRAME_MS));
        events.extend(self.feed(&neutral_frame(), FRAME_MS));
        events
    }
}
