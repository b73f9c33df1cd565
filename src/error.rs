//! Crate-wide error type.
//!
//! Only `ResourceExhausted` is handled structurally (the scheduler's
//! recovery path). Everything else is either a startup failure reported by
//! the binary or an asset failure the compositor logs and skips.

use std::collections::TryReserveError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Dynamic memory for display elements ran out.
    #[error("resource exhausted: requested {requested} elements, {available} available")]
    ResourceExhausted { requested: usize, available: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("font {path}: {message}")]
    Font { path: PathBuf, message: String },

    #[error("invalid config: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("NTP sync failed: {0}")]
    Ntp(String),
}

impl Error {
    pub fn is_resource_exhausted(&self) -> bool {
        matches!(self, Error::ResourceExhausted { .. })
    }
}

/// A failed `try_reserve` is the allocator telling us the heap is gone.
impl From<TryReserveError> for Error {
    fn from(_: TryReserveError) -> Self {
        Error::ResourceExhausted {
            requested: 1,
            available: 0,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
