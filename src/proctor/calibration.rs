//! 视线标定
//!
//! 标定窗口内累积视线样本，结束时取均值作为基线；没有样本时退回画面中心。
//! 基线一旦确定，本会话内不再改变。窗口时长由调用方控制。
//!
//! 帧上附带音量时同时标定环境音量基线，没有音量样本则不启用噪声检测。

use serde::Serialize;

use crate::constants::{AUDIO_BASELINE_MARGIN, FRAME_CENTER, MIN_AUDIO_BASELINE};
use crate::proctor::geometry;
use crate::proctor::types::Point;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Baseline {
    pub x: f64,
    pub y: f64,
    /// 基线由多少个样本得出，0 表示使用了中心兜底
    pub sample_count: usize,
    pub audio_baseline: Option<f64>,
}

impl Baseline {
    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    gaze_x: Vec<f64>,
    gaze_y: Vec<f64>,
    audio_rms: Vec<f64>,
    baseline: Point,
    audio_baseline: Option<f64>,
    calibrated: bool,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            gaze_x: Vec::new(),
            gaze_y: Vec::new(),
            audio_rms: Vec::new(),
            baseline: Point::new(FRAME_CENTER, FRAME_CENTER),
            audio_baseline: None,
            calibrated: false,
        }
    }
}

impl Calibration {
    pub fn new() -> Self {
        Self::default()
    }

    /// 清空样本缓冲，开始新的标定窗口
    pub fn begin(&mut self) {
        if self.calibrated {
            tracing::debug!("Calibration already finished, ignoring restart");
            return;
        }
        self.gaze_x.clear();
        self.gaze_y.clear();
        self.audio_rms.clear();
    }

    /// 已完成标定时忽略样本
    pub fn accumulate(&mut self, gaze: Point) {
        if self.calibrated {
            return;
        }
        self.gaze_x.push(gaze.x);
        self.gaze_y.push(gaze.y);
    }

    pub fn accumulate_audio(&mut self, rms: f64) {
        if self.calibrated || !rms.is_finite() {
            return;
        }
        self.audio_rms.push(rms);
    }

    /// 计算基线并置位 `calibrated`；重复调用返回已有基线
    pub fn finish(&mut self) -> Baseline {
        if self.calibrated {
            return self.summary();
        }

        match (geometry::mean(&self.gaze_x), geometry::mean(&self.gaze_y)) {
            (Some(x), Some(y)) => {
                self.baseline = Point::new(x, y);
                tracing::info!(
                    baseline_x = x,
                    baseline_y = y,
                    samples = self.gaze_x.len(),
                    "Calibration complete"
                );
            }
            _ => {
                self.baseline = Point::new(FRAME_CENTER, FRAME_CENTER);
                tracing::warn!("Calibration collected no gaze samples, using frame center");
            }
        }
        self.audio_baseline = geometry::mean(&self.audio_rms)
            .map(|rms| (rms * AUDIO_BASELINE_MARGIN).max(MIN_AUDIO_BASELINE));

        self.calibrated = true;
        self.summary()
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    pub fn baseline(&self) -> Point {
        self.baseline
    }

    pub fn audio_baseline(&self) -> Option<f64> {
        self.audio_baseline
    }

    pub fn sample_count(&self) -> usize {
        self.gaze_x.len()
    }

    pub fn summary(&self) -> Baseline {
        Baseline {
            x: self.baseline.x,
            y: self.baseline.y,
            sample_count: self.gaze_x.len(),
            audio_baseline: self.audio_baseline,
        }
    }
}
