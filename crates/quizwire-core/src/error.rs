//! Error types for QuizWire

use thiserror::Error;

/// Result type alias for QuizWire core operations
pub type Result<T> = std::result::Result<T, Error>;

/// QuizWire core error types
#[derive(Error, Debug)]
pub enum Error {
    /// JSON encoding error
    #[error("encode error: {0}")]
    EncodeError(String),

    /// JSON decoding error
    #[error("decode error: {0}")]
    DecodeError(String),

    /// Inbound frame was a JSON array with no envelope in it
    #[error("empty envelope list")]
    EmptyEnvelope,
}

impl Error {
    pub(crate) fn encode(e: serde_json::Error) -> Self {
        Error::EncodeError(e.to_string())
    }

    pub(crate) fn decode(e: serde_json::Error) -> Self {
        Error::DecodeError(e.to_string())
    }
}
