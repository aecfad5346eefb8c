//! Client error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("a session id is required to join")]
    MissingSession,

    #[error("a display name is required to join")]
    MissingName,

    #[error("token resolution failed: {0}")]
    TokenResolution(String),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("not connected")]
    NotConnected,

    #[error("handshake not complete")]
    NotReady,

    #[error("an answer is already awaiting confirmation")]
    AnswerPending,

    #[error("server rejected join: {0}")]
    JoinFailed(serde_json::Value),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("timeout")]
    Timeout,

    #[error("protocol error: {0}")]
    Protocol(#[from] quizwire_core::Error),

    #[error("transport error: {0}")]
    Transport(#[from] quizwire_transport::TransportError),
}
