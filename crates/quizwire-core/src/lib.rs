//! QuizWire Core
//!
//! Wire types and protocol primitives for the Bayeux-style quiz transport.
//!
//! This crate provides:
//! - Envelope types ([`Envelope`], [`Payload`], [`Ext`], [`TimeSync`])
//! - JSON envelope encoding/decoding ([`codec`])
//! - Clock synchronization ([`ClockSync`])
//! - Content kinds and their typed records ([`ContentKind`])

pub mod codec;
pub mod content;
pub mod envelope;
pub mod error;
pub mod time;

pub use codec::{decode, encode};
pub use content::ContentKind;
pub use envelope::{Advice, Envelope, Ext, Payload, TimeSync};
pub use error::{Error, Result};
pub use time::ClockSync;

/// Bayeux handshake meta channel
pub const HANDSHAKE_CHANNEL: &str = "/meta/handshake";

/// Bayeux subscribe meta channel
pub const SUBSCRIBE_CHANNEL: &str = "/meta/subscribe";

/// Bayeux connect meta channel
pub const CONNECT_CHANNEL: &str = "/meta/connect";

/// Application channel for login and answer submission
pub const CONTROLLER_CHANNEL: &str = "/service/controller";

/// Application channel for player broadcasts
pub const PLAYER_CHANNEL: &str = "/service/player";

/// Application channel for session status
pub const STATUS_CHANNEL: &str = "/service/status";

/// Bayeux protocol version
pub const BAYEUX_VERSION: &str = "1.0";

/// Connection types offered during handshake
pub const SUPPORTED_CONNECTION_TYPES: [&str; 2] = ["websocket", "long-polling"];

/// Connection type announced on the connect channel
pub const CONNECTION_TYPE: &str = "websocket";

/// Default socket endpoint; the session and token are appended as path segments
pub const DEFAULT_WS_ENDPOINT: &str = "wss://kahoot.it/cometd";

/// Default host reported in login and submission payloads
pub const DEFAULT_HOST: &str = "kahoot.it";

/// Origin header sent on the socket upgrade
pub const DEFAULT_ORIGIN: &str = "https://kahoot.it/";

/// Payload type marking a successful login
pub const LOGIN_RESPONSE: &str = "loginResponse";

/// Payload type of a login request
pub const LOGIN_TYPE: &str = "login";

/// Payload type of an answer submission
pub const MESSAGE_TYPE: &str = "message";

/// Payload id used for answer submissions
pub const SUBMIT_PAYLOAD_ID: u32 = 6;
