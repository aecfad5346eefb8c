//! QuizWire Transport Layer
//!
//! Socket abstractions used by the protocol engine, plus the WebSocket
//! implementation that carries the JSON envelope frames.

pub mod error;
pub mod traits;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use error::{Result, TransportError};
pub use traits::{Transport, TransportEvent, TransportReceiver, TransportSender, TransportServer};

#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConfig, WebSocketReceiver, WebSocketSender, WebSocketServer, WebSocketTransport};
