//! QuizWire Client Library
//!
//! Async client for the Bayeux-style quiz transport: a protocol engine that
//! performs the handshake, subscribe and connect sequence and demultiplexes
//! quiz events, plus a session layer on top of it.
//!
//! # Example
//!
//! ```ignore
//! use quizwire_client::{Session, SessionEvent};
//!
//! #[tokio::main]
//! async fn main() -> quizwire_client::Result<()> {
//!     let session = Session::builder("123456", "alice")
//!         .token("resolved-join-token")
//!         .join()
//!         .await?;
//!
//!     while let Some(event) = session.next_event().await {
//!         if let SessionEvent::QuestionStart(_) = event {
//!             session.answer(0).await?;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod connection;
pub mod engine;
pub mod error;
pub mod quiz;
pub mod session;
pub mod token;

pub use builder::{ClientConfig, SessionBuilder};
pub use connection::{Connection, EngineEvents, EngineHandle};
pub use engine::{Action, ConnectionParams, Engine, EngineConfig, EngineEvent, EngineState};
pub use error::{ClientError, Result};
pub use session::{Session, SessionEvent};
pub use token::{StaticToken, TokenResolver};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::builder::SessionBuilder;
    pub use crate::error::{ClientError, Result};
    pub use crate::quiz::{AnswerConfirmation, Question, QuestionResult, Quiz, QuizResult};
    pub use crate::session::{Session, SessionEvent};
}
