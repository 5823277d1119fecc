//! Error type of the crate.

use prost::DecodeError;
use thiserror::Error;

/// Error that can occur when decoding a vector tile.
#[derive(Debug, Clone, Error)]
pub enum MvtError {
    /// The payload is not a valid protobuf message.
    #[error("proto error: {0}")]
    Proto(String),

    /// The payload violates the MVT format requirements.
    #[error("{0}")]
    Format(String),
}

impl From<DecodeError> for MvtError {
    fn from(value: DecodeError) -> Self {
        Self::Proto(value.to_string())
    }
}
