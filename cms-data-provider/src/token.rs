//! Bearer token capabilities.
//!
//! The provider never stores a token of its own: it asks its [`TokenProvider`] every time
//! it builds a transport, so a token refreshed or cleared by the host is picked up by the
//! next call.

use std::sync::Arc;

use parking_lot::RwLock;

/// Supplies the current bearer token, if any.
pub trait TokenProvider: Send + Sync {
    fn token(&self) -> Option<String>;
}

impl<F> TokenProvider for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn token(&self) -> Option<String> {
        self()
    }
}

/// A token fixed at construction.
#[derive(Clone, Debug, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    /// No token at all, requests are sent unauthenticated.
    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl TokenProvider for StaticToken {
    fn token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// A token the host updates on login and clears on logout.
///
/// Clones share the same token.
#[derive(Clone, Debug, Default)]
pub struct SharedToken {
    inner: Arc<RwLock<Option<String>>>,
}

impl SharedToken {
    pub fn new(token: Option<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(token)),
        }
    }

    pub fn set(&self, token: impl Into<String>) {
        *self.inner.write() = Some(token.into());
    }

    pub fn clear(&self) {
        self.inner.write().take();
    }
}

impl TokenProvider for SharedToken {
    fn token(&self) -> Option<String> {
        self.inner.read().clone()
    }
}

/// Invoked when a failure looks like an expired or rejected session.
pub type OnSessionExpired = Arc<dyn Fn() + Send + Sync>;
