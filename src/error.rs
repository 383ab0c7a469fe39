//! Error types for Procflow.
//!
//! All errors in Procflow are represented by the `ProcflowError` enum,
//! which provides specific variants for different error categories.

use std::io::ErrorKind;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for all Procflow operations.
///
/// Each variant represents a specific category of error that can occur
/// while configuring a service, logging process executions or running jobs.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq)]
pub enum ProcflowError {
    /// Service-level errors (startup, shutdown, missing collaborators).
    #[error("{0}")]
    Service(String),

    /// Configuration parsing or validation errors.
    #[error("{0}")]
    Config(String),

    /// Process log misuse: table not set, unknown register.
    #[error("{0}")]
    Log(String),

    /// Storage operation errors, carrying the backend message.
    #[error("{0}")]
    Store(String),

    /// Data conversion errors (JSON, timestamps, status codes).
    #[error("{0}")]
    Convert(String),

    /// Process definition errors.
    #[error("{0}")]
    Process(String),

    /// Failures reported by a job body.
    #[error("{0}")]
    Job(String),

    /// I/O operation errors.
    #[error("{0}")]
    IoError(String),

    /// Message queue errors.
    #[error("{0}")]
    Queue(String),
}

impl From<ProcflowError> for String {
    fn from(val: ProcflowError) -> Self {
        val.to_string()
    }
}

impl From<std::io::Error> for ProcflowError {
    fn from(error: std::io::Error) -> Self {
        ProcflowError::IoError(error.to_string())
    }
}

impl From<ProcflowError> for std::io::Error {
    fn from(val: ProcflowError) -> Self {
        #[allow(clippy::io_other_error)]
        std::io::Error::new(ErrorKind::Other, val.to_string())
    }
}

impl From<serde_json::Error> for ProcflowError {
    fn from(error: serde_json::Error) -> Self {
        ProcflowError::Convert(error.to_string())
    }
}

impl From<toml::de::Error> for ProcflowError {
    fn from(error: toml::de::Error) -> Self {
        ProcflowError::Config(error.to_string())
    }
}
