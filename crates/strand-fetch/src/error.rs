//! Error types for strand-fetch.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("a transfer for '{id}' is already in progress")]
    AlreadyInProgress { id: String },

    #[error("not enough free space: {required} bytes required, {available} available")]
    OutOfStorage { required: u64, available: u64 },

    #[error("chunk {index} of '{id}' failed after {attempts} attempts: {reason}")]
    NetworkOrDecryptFailure {
        id: String,
        index: u64,
        attempts: u32,
        reason: String,
    },

    #[error("filesystem failure: {0}")]
    FilesystemFailure(#[from] strand_fs::Error),

    /// User-initiated stop. A terminal state, not a failure.
    #[error("transfer stopped")]
    Stopped,

    #[error("device is offline")]
    DeviceOffline,

    #[error("transfers are restricted to Wi-Fi")]
    WifiRequired,

    #[error("invalid descriptor for '{id}': {reason}")]
    InvalidDescriptor { id: String, reason: String },

    #[error("chunk {index} submitted out of order, next expected is {expected}")]
    ChunkOutOfOrder { index: u64, expected: u64 },

    #[error("write sink for '{path}' is unusable after an earlier write failure")]
    SinkPoisoned { path: PathBuf },

    #[error("placement failed: {reason}")]
    Placement { reason: String },

    #[error("engine is shutting down")]
    Shutdown,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("transfer task failed: {0}")]
    Task(String),
}

impl Error {
    pub fn is_stopped(&self) -> bool {
        matches!(self, Error::Stopped)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
