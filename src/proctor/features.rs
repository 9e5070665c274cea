//! 逐帧特征提取
//!
//! 从一张人脸的关键点中计算：
//! - 双眼 EAR (Eye Aspect Ratio) 均值
//! - 虹膜中心均值作为视线点
//! - 上下唇距离作为嘴部开合值
//! - 鼻尖相对画面中线的水平偏移，作为头部偏航的近似
//!
//! 缺失的关键点只会让对应特征为 `None`，不会影响其它特征。

use std::collections::VecDeque;

use crate::constants::FRAME_CENTER;
use crate::proctor::config::{LandmarkLayout, ThresholdConfig};
use crate::proctor::geometry;
use crate::proctor::types::{FaceLandmarks, GazeDirection, Point};

/// 标准6点 EAR
///
/// 点顺序: p0 外眼角, p1/p2 上眼睑, p3 内眼角, p4/p5 下眼睑
///
/// 公式: EAR = (|p1-p5| + |p2-p4|) / (2 * |p0-p3|)
///
/// 水平距离为 0 时返回 0（视为完全闭眼）。
pub fn eye_aspect_ratio(eye: &[Point; 6]) -> f64 {
    let horizontal = eye[0].distance(&eye[3]);
    if horizontal == 0.0 {
        return 0.0;
    }
    let vertical1 = eye[1].distance(&eye[5]);
    let vertical2 = eye[2].distance(&eye[4]);
    (vertical1 + vertical2) / (2.0 * horizontal)
}

/// 一帧的特征
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameFeatures {
    /// 左右眼 EAR 的平均值
    pub ear: Option<f64>,
    pub gaze: Option<Point>,
    pub mouth_opening: Option<f64>,
    /// |nose.x - 0.5|
    pub head_yaw: Option<f64>,
}

pub fn extract(face: &FaceLandmarks, layout: &LandmarkLayout) -> FrameFeatures {
    let ear = match (eye_points(face, &layout.left_eye), eye_points(face, &layout.right_eye)) {
        (Some(left), Some(right)) => {
            Some((eye_aspect_ratio(&left) + eye_aspect_ratio(&right)) / 2.0)
        }
        _ => None,
    };

    let gaze = match (face.get(layout.left_iris), face.get(layout.right_iris)) {
        (Some(left), Some(right)) => Some(left.midpoint(&right)),
        _ => None,
    };

    let mouth_opening = match (face.get(layout.mouth_top), face.get(layout.mouth_bottom)) {
        (Some(top), Some(bottom)) => Some(top.distance(&bottom)),
        _ => None,
    };

    let head_yaw = face
        .get(layout.nose_tip)
        .map(|nose| (nose.x - FRAME_CENTER).abs());

    FrameFeatures {
        ear,
        gaze,
        mouth_opening,
        head_yaw,
    }
}

fn eye_points(face: &FaceLandmarks, indices: &[usize; 6]) -> Option<[Point; 6]> {
    let mut out = [Point::default(); 6];
    for (slot, &idx) in out.iter_mut().zip(indices.iter()) {
        *slot = face.get(idx)?;
    }
    Some(out)
}

/// 视线方向分类
///
/// 偏移在容差内为 CENTER；否则水平偏移占优时按 dx 符号取 LEFT/RIGHT，
/// 其余情况按 dy 符号取 UP/DOWN（图像坐标 y 向下）。
pub fn classify_gaze(gaze: Point, baseline: Point, thresholds: &ThresholdConfig) -> GazeDirection {
    let dx = gaze.x - baseline.x;
    let dy = gaze.y - baseline.y;

    if dx.abs() <= thresholds.gaze_x_delta && dy.abs() <= thresholds.gaze_y_delta {
        GazeDirection::Center
    } else if dx.abs() > dy.abs() {
        if dx < 0.0 {
            GazeDirection::Left
        } else {
            GazeDirection::Right
        }
    } else if dy < 0.0 {
        GazeDirection::Up
    } else {
        GazeDirection::Down
    }
}

/// 嘴部开合值的滚动窗口
#[derive(Debug, Clone, PartialEq)]
pub struct MouthWindow {
    samples: VecDeque<f64>,
    capacity: usize,
    min_samples: usize,
}

impl MouthWindow {
    pub fn new(capacity: usize, min_samples: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            min_samples,
        }
    }

    pub fn push(&mut self, opening: f64) {
        self.samples.push_back(opening);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// 样本不足 `min_samples` 时返回 `None`
    pub fn variance(&self) -> Option<f64> {
        if self.samples.len() < self.min_samples {
            return None;
        }
        Some(geometry::variance(&self.samples))
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
