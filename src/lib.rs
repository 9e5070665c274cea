//! 监考行为异常检测引擎
//!
//! 逐帧消费归一化的面部关键点，输出经过标定、去抖与节流的违规事件，
//! 并维护会话风险分与最终报告。
//!
//! ## 模块
//! - `proctor`: 检测引擎核心（特征提取、标定、状态机、风险聚合、报告）
//! - `runtime`: 宿主侧驱动（单消费者帧循环、录制回放）
//! - `config` / `logging`: 进程级配置与日志

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod proctor;
pub mod runtime;

pub use error::EngineError;
pub use proctor::engine::ProctorEngine;
