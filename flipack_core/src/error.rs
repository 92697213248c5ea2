//! The single error type shared by every stage of the flipack pipeline.
//!
//! The search treats the variants differently: `InvalidParameter` at sampling
//! time only triggers a resample, `CorruptMetadata` / `CompressionBackend` /
//! `CorruptionDetected` during verification only reject the candidate at hand,
//! and `SearchFailed` is what the caller sees when nothing survived.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("corrupt metadata: {0}")]
    CorruptMetadata(String),

    #[error("compression backend '{backend}' failed: {message}")]
    CompressionBackend {
        backend: &'static str,
        message: String,
    },

    #[error("round-trip mismatch: {0}")]
    CorruptionDetected(String),

    #[error("search failed after {iterations} trials: {reason}")]
    SearchFailed { iterations: u64, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand used by codec implementations to tag backend failures.
    pub fn backend(backend: &'static str, err: impl std::fmt::Display) -> Self {
        Error::CompressionBackend {
            backend,
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
