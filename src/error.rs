use crate::wire::WireError;
use thiserror::Error;

/// Errors surfaced by the adapter's public API.
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed message: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("tracker error {code}: {message}")]
    Tracker { code: i64, message: String },
    #[error("handshake failed: {0}")]
    Handshake(String),
    #[error("a {0} call is already awaiting its result")]
    CallInFlight(&'static str),
    #[error("invalid profile: {0}")]
    Config(&'static str),
    #[error("adapter is not connected")]
    NotConnected,
}

impl From<WireError> for AdapterError {
    fn from(err: WireError) -> Self {
        AdapterError::Tracker {
            code: err.code,
            message: err.message,
        }
    }
}

pub type Result<T> = std::result::Result<T, AdapterError>;
