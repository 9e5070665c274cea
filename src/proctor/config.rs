use serde::{Deserialize, Serialize};

use crate::config::env_or_parse;
use crate::constants::*;
use crate::error::EngineError;

/// 检测阈值，会话内不可变，构造引擎时校验
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdConfig {
    pub ear_blink: f64,
    pub blink_frames: u32,
    pub blink_min_sep_ms: i64,
    pub eyes_closed_ms: i64,
    pub gaze_away_ms: i64,
    pub no_face_ms: i64,
    pub gaze_x_delta: f64,
    pub gaze_y_delta: f64,
    pub mouth_movement: f64,
    pub excessive_blinks: usize,
    pub head_turn_threshold: f64,
    #[serde(default = "default_talking_ms")]
    pub talking_ms: i64,
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: i64,
    #[serde(default = "default_blink_window_ms")]
    pub blink_window_ms: i64,
    #[serde(default = "default_mouth_window")]
    pub mouth_window: usize,
    #[serde(default = "default_mouth_min_samples")]
    pub mouth_min_samples: usize,
    #[serde(default = "default_noise_sensitivity")]
    pub noise_sensitivity: f64,
    #[serde(default = "default_noise_frames")]
    pub noise_frames: u32,
}

fn default_talking_ms() -> i64 {
    DEFAULT_TALKING_MS
}
fn default_throttle_ms() -> i64 {
    DEFAULT_THROTTLE_MS
}
fn default_blink_window_ms() -> i64 {
    DEFAULT_BLINK_WINDOW_MS
}
fn default_mouth_window() -> usize {
    DEFAULT_MOUTH_WINDOW
}
fn default_mouth_min_samples() -> usize {
    DEFAULT_MOUTH_MIN_SAMPLES
}
fn default_noise_sensitivity() -> f64 {
    DEFAULT_NOISE_SENSITIVITY
}
fn default_noise_frames() -> u32 {
    DEFAULT_NOISE_FRAMES
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            ear_blink: DEFAULT_EAR_BLINK,
            blink_frames: DEFAULT_BLINK_FRAMES,
            blink_min_sep_ms: DEFAULT_BLINK_MIN_SEP_MS,
            eyes_closed_ms: DEFAULT_EYES_CLOSED_MS,
            gaze_away_ms: DEFAULT_GAZE_AWAY_MS,
            no_face_ms: DEFAULT_NO_FACE_MS,
            gaze_x_delta: DEFAULT_GAZE_X_DELTA,
            gaze_y_delta: DEFAULT_GAZE_Y_DELTA,
            mouth_movement: DEFAULT_MOUTH_MOVEMENT,
            excessive_blinks: DEFAULT_EXCESSIVE_BLINKS,
            head_turn_threshold: DEFAULT_HEAD_TURN_THRESHOLD,
            talking_ms: DEFAULT_TALKING_MS,
            throttle_ms: DEFAULT_THROTTLE_MS,
            blink_window_ms: DEFAULT_BLINK_WINDOW_MS,
            mouth_window: DEFAULT_MOUTH_WINDOW,
            mouth_min_samples: DEFAULT_MOUTH_MIN_SAMPLES,
            noise_sensitivity: DEFAULT_NOISE_SENSITIVITY,
            noise_frames: DEFAULT_NOISE_FRAMES,
        }
    }
}

impl ThresholdConfig {
    /// 在默认值基础上应用 `PROCTOR_*` 环境变量覆盖
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            ear_blink: env_or_parse("PROCTOR_EAR_BLINK", d.ear_blink),
            blink_frames: env_or_parse("PROCTOR_BLINK_FRAMES", d.blink_frames),
            blink_min_sep_ms: env_or_parse("PROCTOR_BLINK_MIN_SEP_MS", d.blink_min_sep_ms),
            eyes_closed_ms: env_or_parse("PROCTOR_EYES_CLOSED_MS", d.eyes_closed_ms),
            gaze_away_ms: env_or_parse("PROCTOR_GAZE_AWAY_MS", d.gaze_away_ms),
            no_face_ms: env_or_parse("PROCTOR_NO_FACE_MS", d.no_face_ms),
            gaze_x_delta: env_or_parse("PROCTOR_GAZE_X_DELTA", d.gaze_x_delta),
            gaze_y_delta: env_or_parse("PROCTOR_GAZE_Y_DELTA", d.gaze_y_delta),
            mouth_movement: env_or_parse("PROCTOR_MOUTH_MOVEMENT", d.mouth_movement),
            excessive_blinks: env_or_parse("PROCTOR_EXCESSIVE_BLINKS", d.excessive_blinks),
            head_turn_threshold: env_or_parse("PROCTOR_HEAD_TURN_THRESHOLD", d.head_turn_threshold),
            talking_ms: env_or_parse("PROCTOR_TALKING_MS", d.talking_ms),
            throttle_ms: env_or_parse("PROCTOR_THROTTLE_MS", d.throttle_ms),
            blink_window_ms: env_or_parse("PROCTOR_BLINK_WINDOW_MS", d.blink_window_ms),
            mouth_window: env_or_parse("PROCTOR_MOUTH_WINDOW", d.mouth_window),
            mouth_min_samples: env_or_parse("PROCTOR_MOUTH_MIN_SAMPLES", d.mouth_min_samples),
            noise_sensitivity: env_or_parse("PROCTOR_NOISE_SENSITIVITY", d.noise_sensitivity),
            noise_frames: env_or_parse("PROCTOR_NOISE_FRAMES", d.noise_frames),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.ear_blink.is_finite() || self.ear_blink <= 0.0 || self.ear_blink >= 1.0 {
            return Err("ear_blink must be in (0,1)".to_string());
        }
        if self.blink_frames == 0 {
            return Err("blink_frames must be >= 1".to_string());
        }
        if !(0..=MAX_DURATION_MS).contains(&self.blink_min_sep_ms) {
            return Err(format!("blink_min_sep_ms must be in [0, {MAX_DURATION_MS}]"));
        }

        let durations = [
            ("eyes_closed_ms", self.eyes_closed_ms),
            ("gaze_away_ms", self.gaze_away_ms),
            ("no_face_ms", self.no_face_ms),
            ("talking_ms", self.talking_ms),
            ("throttle_ms", self.throttle_ms),
            ("blink_window_ms", self.blink_window_ms),
        ];
        if let Some((name, value)) = durations.iter().find(|(_, v)| *v <= 0) {
            return Err(format!("{name} must be > 0 (got {value})"));
        }
        if let Some((name, value)) = durations.iter().find(|(_, v)| *v > MAX_DURATION_MS) {
            return Err(format!("{name} must be <= {MAX_DURATION_MS} (got {value})"));
        }

        for (name, value) in [
            ("gaze_x_delta", self.gaze_x_delta),
            ("gaze_y_delta", self.gaze_y_delta),
            ("mouth_movement", self.mouth_movement),
            ("noise_sensitivity", self.noise_sensitivity),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{name} must be a finite value >= 0"));
            }
        }

        if self.excessive_blinks == 0 {
            return Err("excessive_blinks must be >= 1".to_string());
        }
        if !(self.head_turn_threshold > 0.0 && self.head_turn_threshold <= 0.5) {
            return Err("head_turn_threshold must be in (0,0.5]".to_string());
        }
        if self.mouth_min_samples == 0 || self.mouth_min_samples > self.mouth_window {
            return Err(format!(
                "mouth_min_samples must be in [1, mouth_window] (got {} with window {})",
                self.mouth_min_samples, self.mouth_window
            ));
        }

        Ok(())
    }
}

/// 关键点索引与语义的映射，需与提供方的关键点布局一致
///
/// 眼部六点顺序：外眼角、两个上眼睑点、内眼角、两个下眼睑点。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LandmarkLayout {
    pub left_eye: [usize; 6],
    pub right_eye: [usize; 6],
    pub left_iris: usize,
    pub right_iris: usize,
    pub mouth_top: usize,
    pub mouth_bottom: usize,
    pub nose_tip: usize,
}

impl Default for LandmarkLayout {
    fn default() -> Self {
        Self {
            left_eye: LEFT_EYE,
            right_eye: RIGHT_EYE,
            left_iris: LEFT_IRIS,
            right_iris: RIGHT_IRIS,
            mouth_top: MOUTH_TOP,
            mouth_bottom: MOUTH_BOTTOM,
            nose_tip: NOSE_TIP,
        }
    }
}

impl LandmarkLayout {
    pub fn validate(&self) -> Result<(), String> {
        for (name, eye) in [("left_eye", &self.left_eye), ("right_eye", &self.right_eye)] {
            for (i, idx) in eye.iter().enumerate() {
                if eye[i + 1..].contains(idx) {
                    return Err(format!("{name} repeats landmark index {idx}"));
                }
            }
        }
        if self.left_iris == self.right_iris {
            return Err("left_iris and right_iris must differ".to_string());
        }
        if self.mouth_top == self.mouth_bottom {
            return Err("mouth_top and mouth_bottom must differ".to_string());
        }
        Ok(())
    }
}

/// 校验两份配置，供引擎构造时快速失败
pub fn validate_all(thresholds: &ThresholdConfig, layout: &LandmarkLayout) -> Result<(), EngineError> {
    thresholds.validate().map_err(EngineError::InvalidConfig)?;
    layout.validate().map_err(EngineError::InvalidLayout)?;
    Ok(())
}
