//! Join token resolution
//!
//! A join token must be resolved for a session before the socket can be
//! opened. How that happens is up to the caller.

use async_trait::async_trait;

use crate::error::Result;

/// Resolves the join token for a session id
#[async_trait]
pub trait TokenResolver: Send + Sync {
    async fn resolve(&self, session: &str) -> Result<String>;
}

/// A token that is already known
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenResolver for StaticToken {
    async fn resolve(&self, _session: &str) -> Result<String> {
        Ok(self.0.clone())
    }
}
