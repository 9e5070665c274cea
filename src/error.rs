use thiserror::Error;

use crate::proctor::engine::EnginePhase;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("invalid threshold config: {0}")]
    InvalidConfig(String),
    #[error("invalid landmark layout: {0}")]
    InvalidLayout(String),
    #[error("operation requires phase {expected}, engine is {actual}")]
    InvalidPhase {
        expected: &'static str,
        actual: EnginePhase,
    },
    #[error("no monitoring session is running")]
    NotMonitoring,
    #[error("frame driver has shut down")]
    DriverClosed,
}
