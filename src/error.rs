//! Error kinds shared by every layer.
//!
//! Validation errors are raised before any engine process is spawned.
//! Execution errors are raised only after the engine has exited or failed to start.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DggridError>;

#[derive(Debug, Error)]
pub enum DggridError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Unrecognized grid type: {0} (expected ISEA or FULLER prefix)")]
    UnrecognizedGridType(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("DGGRID engine failed ({}): {log}", exit_code_label(.exit_code))]
    EngineExecutionFailed { exit_code: Option<i32>, log: String },

    #[error("DGGRID engine not runnable: {0}")]
    EngineNotRunnable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DggridError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    pub(crate) fn not_implemented(what: impl Into<String>) -> Self {
        Self::NotImplemented(what.into())
    }
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {}", c),
        None => "no exit code".to_string(),
    }
}
