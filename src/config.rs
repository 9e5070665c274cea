use std::env;
use std::str::FromStr;

use crate::constants::{DEFAULT_CALIBRATION_MS, DEFAULT_DRIVER_TICK_MS, DEFAULT_SUBJECT_LABEL};
use crate::logging::LogConfig;
use crate::proctor::config::ThresholdConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
    pub replay: ReplayConfig,
    pub thresholds: ThresholdConfig,
}

#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// 录制文件路径，`-` 或缺省表示标准输入
    pub input: Option<String>,
    /// 按录制间隔实时回放，否则使用虚拟时钟一次跑完
    pub realtime: bool,
    pub subject_label: String,
    pub calibration_ms: i64,
    pub driver_tick_ms: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            log_level: env_or("RUST_LOG", "info"),
            enable_file_logs: env_or_bool("ENABLE_FILE_LOGS", false),
            log_dir: env_or("LOG_DIR", "./logs"),
            replay: ReplayConfig {
                input: env::var("REPLAY_INPUT").ok().filter(|v| !v.trim().is_empty()),
                realtime: env_or_bool("REPLAY_REALTIME", false),
                subject_label: env_or("SUBJECT_LABEL", DEFAULT_SUBJECT_LABEL),
                calibration_ms: env_or_parse("CALIBRATION_MS", DEFAULT_CALIBRATION_MS),
                driver_tick_ms: env_or_parse("DRIVER_TICK_MS", DEFAULT_DRIVER_TICK_MS),
            },
            thresholds: ThresholdConfig::from_env(),
        }
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            log_level: self.log_level.clone(),
            enable_file_logs: self.enable_file_logs,
            log_dir: self.log_dir.clone(),
        }
    }
}

pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn env_or_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(
                    key,
                    value = %raw,
                    "Failed to parse env var, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

pub fn env_or_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}
