pub mod downloader;
pub mod updater;

#[cfg(test)]
pub mod scripted;

use crate::modules::storage::StorageError;
use stackrating_libs::stackexchange::ApiError;
use thiserror::Error;

pub use updater::{ContentUpdater, UpdaterConfig};

pub type Result<T> = std::result::Result<T, UpdateError>;

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("storage operation failed")]
    StorageError(#[from] StorageError),
    #[error("content source request failed")]
    SourceError(#[from] ApiError),
}

/// How a synchronization pass ended. None of these is a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed,
    /// The remaining request quota dropped below the safety floor.
    QuotaExhausted,
    Interrupted,
}
