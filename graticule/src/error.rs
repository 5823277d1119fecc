//! Error types used by the crate.

use graticule_mvt::error::MvtError;
use thiserror::Error;

/// Graticule error type.
#[derive(Debug, Error)]
pub enum GraticuleError {
    /// I/O error (network or file).
    #[error("failed to load data")]
    Io,
    /// Error decoding data.
    #[error("failed to decode data")]
    Decoding(#[from] MvtError),
    /// Item not found.
    #[error("item not found")]
    NotFound,
    /// Generic error - details are inside.
    #[error("{0}")]
    Generic(String),
    /// Error reading/writing data to the FS.
    #[error("failed to read file")]
    FsIo(#[from] std::io::Error),
}

impl From<reqwest::Error> for GraticuleError {
    fn from(_value: reqwest::Error) -> Self {
        Self::Io
    }
}

impl From<strfmt::FmtError> for GraticuleError {
    fn from(value: strfmt::FmtError) -> Self {
        Self::Generic(value.to_string())
    }
}
