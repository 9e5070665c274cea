use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// 归一化二维关键点，坐标相对画面宽高，取值 [0, 1]
///
/// 提供方输出的 z 分量在反序列化时被忽略。
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        crate::proctor::geometry::distance(self, other)
    }

    pub fn midpoint(&self, other: &Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// 单张人脸的关键点序列，索引语义由 `LandmarkLayout` 决定
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaceLandmarks {
    pub points: Vec<Point>,
}

impl FaceLandmarks {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn get(&self, index: usize) -> Option<Point> {
        self.points.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// 一帧的检测结果：0..N 张人脸，可附带同一时刻的麦克风 RMS
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LandmarkFrame {
    #[serde(default)]
    pub faces: Vec<FaceLandmarks>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_rms: Option<f64>,
}

impl LandmarkFrame {
    pub fn new(faces: Vec<FaceLandmarks>) -> Self {
        Self {
            faces,
            audio_rms: None,
        }
    }

    pub fn with_audio(mut self, rms: f64) -> Self {
        self.audio_rms = Some(rms);
        self
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn primary_face(&self) -> Option<&FaceLandmarks> {
        self.faces.first()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// 累加到会话风险分的权重
    pub fn risk_weight(self) -> u32 {
        match self {
            Self::High => 10,
            Self::Medium => 5,
            Self::Low => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GazeDirection {
    #[default]
    Center,
    Left,
    Right,
    Up,
    Down,
    NoFace,
}

impl GazeDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Center => "CENTER",
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
            Self::Up => "UP",
            Self::Down => "DOWN",
            Self::NoFace => "NO_FACE",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "CENTER" => Some(Self::Center),
            "LEFT" => Some(Self::Left),
            "RIGHT" => Some(Self::Right),
            "UP" => Some(Self::Up),
            "DOWN" => Some(Self::Down),
            "NO_FACE" => Some(Self::NoFace),
            _ => None,
        }
    }
}

impl fmt::Display for GazeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 违规类型
///
/// 序列化为固定的类型字符串（如 `GAZE AWAY - LOOKING LEFT`），
/// 与已存储报告中的 `type` 字段保持一致。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViolationKind {
    LeftFrame,
    MultipleFaces,
    EyesClosed,
    ExcessiveBlinking,
    /// 方向在计时器启动时捕获
    GazeAway(GazeDirection),
    Talking,
    HeadTurned,
    /// 环境音量持续高于标定基线
    LoudNoise,
}

const GAZE_AWAY_PREFIX: &str = "GAZE AWAY - LOOKING ";

impl ViolationKind {
    pub fn severity(self) -> Severity {
        match self {
            Self::LeftFrame | Self::MultipleFaces | Self::Talking => Severity::High,
            Self::EyesClosed
            | Self::ExcessiveBlinking
            | Self::GazeAway(_)
            | Self::HeadTurned => Severity::Medium,
            Self::LoudNoise => Severity::Low,
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LeftFrame => f.write_str("CANDIDATE LEFT FRAME"),
            Self::MultipleFaces => f.write_str("MULTIPLE FACES DETECTED"),
            Self::EyesClosed => f.write_str("EYES CLOSED FOR EXTENDED TIME"),
            Self::ExcessiveBlinking => f.write_str("EXCESSIVE BLINKING"),
            Self::GazeAway(direction) => write!(f, "{GAZE_AWAY_PREFIX}{direction}"),
            Self::Talking => f.write_str("TALKING DETECTED"),
            Self::HeadTurned => f.write_str("HEAD TURNED AWAY"),
            Self::LoudNoise => f.write_str("LOUD NOISE DETECTED"),
        }
    }
}

impl FromStr for ViolationKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "CANDIDATE LEFT FRAME" => Ok(Self::LeftFrame),
            "MULTIPLE FACES DETECTED" => Ok(Self::MultipleFaces),
            "EYES CLOSED FOR EXTENDED TIME" => Ok(Self::EyesClosed),
            "EXCESSIVE BLINKING" => Ok(Self::ExcessiveBlinking),
            "TALKING DETECTED" => Ok(Self::Talking),
            "HEAD TURNED AWAY" => Ok(Self::HeadTurned),
            "LOUD NOISE DETECTED" => Ok(Self::LoudNoise),
            other => other
                .strip_prefix(GAZE_AWAY_PREFIX)
                .and_then(GazeDirection::parse)
                .filter(|d| !matches!(d, GazeDirection::Center | GazeDirection::NoFace))
                .map(Self::GazeAway)
                .ok_or_else(|| format!("unknown violation type: {other}")),
        }
    }
}

impl Serialize for ViolationKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ViolationKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// 毫秒精度的 ISO-8601 时间戳（`2024-01-01T00:00:00.000Z`）
pub mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// 一条已接受的违规事件，创建后不可变
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationEvent {
    #[serde(with = "iso_millis")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: ViolationKind,
    pub severity: Severity,
}

impl ViolationEvent {
    pub fn new(kind: ViolationKind, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            kind,
            severity: kind.severity(),
        }
    }
}

/// 会话统计，仅在监控开始时归零，仅由引擎修改
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub total_blinks: u32,
    pub violations: Vec<ViolationEvent>,
    pub risk_score: u32,
    pub gaze_direction: GazeDirection,
    pub faces_detected: usize,
}
