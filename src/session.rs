use crate::locator::Locator;
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("timed out after {waited_ms}ms waiting for {locator}")]
    Timeout { locator: String, waited_ms: u64 },
    #[error("no element matches {0}")]
    NotFound(String),
    #[error("browser rejected the action: {0}")]
    Browser(String),
    #[error("browser session is no longer usable: {0}")]
    Disconnected(String),
}

impl SessionError {
    /// Only a dead session stops the current applicant outright; everything
    /// else is a step failure the caller can recover from.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::Disconnected(_))
    }
}

/// DOM primitives of the live portal session. Implementations act on the
/// first element a locator matches and never wait on their own; bounded
/// waiting is done by the caller through `pause`.
#[async_trait]
pub trait PortalSession: Send + Sync {
    async fn count(&self, locator: &Locator) -> Result<usize, SessionError>;

    async fn is_visible(&self, locator: &Locator) -> Result<bool, SessionError>;

    async fn click(&self, locator: &Locator) -> Result<(), SessionError>;

    /// Replace the element's value with `value`, as typed input.
    async fn fill(&self, locator: &Locator, value: &str) -> Result<(), SessionError>;

    async fn press_enter(&self, locator: &Locator) -> Result<(), SessionError>;

    async fn text(&self, locator: &Locator) -> Result<Option<String>, SessionError>;

    async fn attribute(&self, locator: &Locator, name: &str)
        -> Result<Option<String>, SessionError>;

    async fn current_url(&self) -> Option<String>;

    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
