//! Client configuration and builder

use std::sync::Arc;
use std::time::Duration;

use quizwire_core::content::Screen;
use quizwire_core::{DEFAULT_ORIGIN, DEFAULT_WS_ENDPOINT};

use crate::engine::EngineConfig;
use crate::error::{ClientError, Result};
use crate::session::Session;
use crate::token::{StaticToken, TokenResolver};

/// Connection settings shared by every session
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Socket endpoint; session and token are appended as path segments
    pub endpoint: String,
    /// Origin header for the socket upgrade
    pub origin: String,
    /// Values reported in login and submission payloads
    pub engine: EngineConfig,
    /// Maximum inbound frame size
    pub max_message_size: usize,
    /// Upper bound on handshake plus login; `None` waits indefinitely
    pub join_timeout: Option<Duration>,
    /// Queue [`SessionEvent`](crate::SessionEvent)s for `next_event`. The
    /// queue is unbounded, so turn this off when only snapshots and
    /// `answer` are used.
    pub queue_events: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_WS_ENDPOINT.to_string(),
            origin: DEFAULT_ORIGIN.to_string(),
            engine: EngineConfig::default(),
            max_message_size: 1024 * 1024,
            join_timeout: Some(Duration::from_secs(30)),
            queue_events: true,
        }
    }
}

/// Builder for joining a quiz session
pub struct SessionBuilder {
    session: String,
    name: String,
    config: ClientConfig,
    resolver: Option<Arc<dyn TokenResolver>>,
}

impl SessionBuilder {
    /// Create a new builder
    pub fn new(session: &str, name: &str) -> Self {
        Self {
            session: session.to_string(),
            name: name.to_string(),
            config: ClientConfig::default(),
            resolver: None,
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the socket endpoint
    pub fn endpoint(mut self, endpoint: &str) -> Self {
        self.config.endpoint = endpoint.to_string();
        self
    }

    /// Set the origin header
    pub fn origin(mut self, origin: &str) -> Self {
        self.config.origin = origin.to_string();
        self
    }

    /// Set the host reported in payloads
    pub fn host(mut self, host: &str) -> Self {
        self.config.engine.host = host.to_string();
        self
    }

    /// Set the lag reported with answers
    pub fn lag(mut self, lag: u32) -> Self {
        self.config.engine.lag = lag;
        self
    }

    /// Set the user agent reported with answers
    pub fn user_agent(mut self, user_agent: &str) -> Self {
        self.config.engine.device.user_agent = user_agent.to_string();
        self
    }

    /// Set the screen size reported with answers
    pub fn screen(mut self, width: u32, height: u32) -> Self {
        self.config.engine.device.screen = Screen { width, height };
        self
    }

    /// Set or clear the join timeout
    pub fn join_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.join_timeout = timeout;
        self
    }

    /// Enable or disable the session event queue
    pub fn queue_events(mut self, enabled: bool) -> Self {
        self.config.queue_events = enabled;
        self
    }

    /// Use an already resolved join token
    pub fn token(mut self, token: &str) -> Self {
        self.resolver = Some(Arc::new(StaticToken::new(token)));
        self
    }

    /// Resolve the join token through `resolver`
    pub fn token_resolver(mut self, resolver: impl TokenResolver + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Resolve the token, connect and log in
    pub async fn join(self) -> Result<Session> {
        if self.session.trim().is_empty() {
            return Err(ClientError::MissingSession);
        }
        if self.name.trim().is_empty() {
            return Err(ClientError::MissingName);
        }
        url::Url::parse(&self.config.endpoint)
            .map_err(|e| ClientError::InvalidEndpoint(e.to_string()))?;

        let resolver = self
            .resolver
            .ok_or_else(|| ClientError::TokenResolution("no token or resolver configured".to_string()))?;
        let token = resolver.resolve(&self.session).await?;

        Session::connect(self.config, &self.session, &token, &self.name).await
    }
}
