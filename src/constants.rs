/// 平均 EAR 低于此值视为闭眼
pub const DEFAULT_EAR_BLINK: f64 = 0.21;

/// 连续闭眼帧数达到此值后睁眼才算一次眨眼
pub const DEFAULT_BLINK_FRAMES: u32 = 2;

/// 两次有效眨眼之间的最小间隔（毫秒）
pub const DEFAULT_BLINK_MIN_SEP_MS: i64 = 350;

/// 持续闭眼触发违规的时长（毫秒）
pub const DEFAULT_EYES_CLOSED_MS: i64 = 4000;

/// 持续视线偏离触发违规的时长（毫秒）
pub const DEFAULT_GAZE_AWAY_MS: i64 = 4000;

/// 持续无人脸触发违规的时长（毫秒）
pub const DEFAULT_NO_FACE_MS: i64 = 6000;

/// 持续说话触发违规的时长（毫秒）
pub const DEFAULT_TALKING_MS: i64 = 2500;

/// 同类违规的节流窗口（毫秒）
pub const DEFAULT_THROTTLE_MS: i64 = 5000;

/// 视线水平偏移容差（归一化坐标）
pub const DEFAULT_GAZE_X_DELTA: f64 = 0.07;

/// 视线垂直偏移容差（归一化坐标）
pub const DEFAULT_GAZE_Y_DELTA: f64 = 0.06;

/// 嘴部开合方差阈值
pub const DEFAULT_MOUTH_MOVEMENT: f64 = 0.5;

/// 嘴部开合滚动窗口容量
pub const DEFAULT_MOUTH_WINDOW: usize = 30;

/// 计算方差所需的最少样本数
pub const DEFAULT_MOUTH_MIN_SAMPLES: usize = 20;

/// 所有时长类阈值的上限（毫秒），一天
pub const MAX_DURATION_MS: i64 = 86_400_000;

/// 眨眼频率统计窗口（毫秒）
pub const DEFAULT_BLINK_WINDOW_MS: i64 = 60_000;

/// 统计窗口内眨眼次数超过此值视为过度眨眼
pub const DEFAULT_EXCESSIVE_BLINKS: usize = 40;

/// 鼻尖偏离水平中线的阈值（归一化坐标）
pub const DEFAULT_HEAD_TURN_THRESHOLD: f64 = 0.22;

/// 音量超过 基线 × 此倍数 视为噪声
pub const DEFAULT_NOISE_SENSITIVITY: f64 = 3.5;

/// 连续噪声帧数超过此值触发一次噪声违规
pub const DEFAULT_NOISE_FRAMES: u32 = 30;

/// 标定得到的平均 RMS 乘以此系数作为音量基线
pub const AUDIO_BASELINE_MARGIN: f64 = 1.5;

/// 音量基线下限，避免静音标定得到 0
pub const MIN_AUDIO_BASELINE: f64 = 1e-6;

/// 默认标定时长（毫秒），由调用方驱动
pub const DEFAULT_CALIBRATION_MS: i64 = 3000;

/// 驱动器推进计时器的默认间隔（毫秒）
pub const DEFAULT_DRIVER_TICK_MS: u64 = 50;

/// 标定失败时使用的画面中心
pub const FRAME_CENTER: f64 = 0.5;

/// 未提供标识时报告文件名中使用的占位
pub const DEFAULT_SUBJECT_LABEL: &str = "unknown";

// MediaPipe FaceMesh（refine_landmarks）关键点索引
pub const LEFT_EYE: [usize; 6] = [33, 160, 158, 133, 153, 144];
pub const RIGHT_EYE: [usize; 6] = [362, 385, 387, 263, 373, 380];
pub const LEFT_IRIS: usize = 468;
pub const RIGHT_IRIS: usize = 473;
pub const MOUTH_TOP: usize = 13;
pub const MOUTH_BOTTOM: usize = 14;
pub const NOSE_TIP: usize = 1;
