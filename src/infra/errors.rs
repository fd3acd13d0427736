// src/infra/errors.rs - Error types for cadence

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CadenceError {
    // Caller errors (not a data condition)
    #[error("Unknown task '{task_id}'")]
    UnknownTask { task_id: String },

    // Infra
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CadenceError {
    pub fn unknown_task(task_id: impl Into<String>) -> Self {
        CadenceError::UnknownTask {
            task_id: task_id.into(),
        }
    }

    /// Whether the error points at a bug in the caller rather than at storage.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, CadenceError::UnknownTask { .. })
    }
}

pub type Result<T, E = CadenceError> = std::result::Result<T, E>;
