//! Error types for tape-state

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in the tape persistence layer
#[derive(Error, Debug)]
pub enum StoreError {
    /// The underlying medium could not be read or written
    #[error("tape store unavailable: {0}")]
    Unavailable(#[from] std::io::Error),

    /// Another process holds the tape's advisory lock
    #[error("tape is locked by another process: {path}")]
    Locked { path: PathBuf },

    /// Entry could not be encoded as a tape line
    #[error("entry serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The in-process writer lock was poisoned by a panicking writer
    #[error("tape writer lock poisoned")]
    Poisoned,

    /// A blocking storage task was cancelled or panicked
    #[error("storage task failed: {0}")]
    Task(String),
}
