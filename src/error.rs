use crate::unit::UnitTag;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MicroError {
    #[error("unit {0} is not visible or no longer exists")]
    InvalidUnit(UnitTag),

    #[error("target {0} is not visible or no longer exists")]
    InvalidTarget(UnitTag),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid scenario: {0}")]
    Scenario(String),

    #[error("failed to parse document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
}

pub type MicroResult<T> = Result<T, MicroError>;
