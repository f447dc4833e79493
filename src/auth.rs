//! Credential plumbing for the gateway connection.
//!
//! The gateway authenticates a connection with an access token carried as a
//! query parameter on the WebSocket URL, tied to an identified principal
//! (the user id). Credentials are resolved *per connection attempt*, so a
//! token refreshed mid-session is picked up by the next reconnect instead
//! of a stale cached copy.
//!
//! ## Dynamic credential provider
//!
//! Implement [`CredentialProvider`] to supply credentials lazily — it is
//! called on every connect and reconnect. This is the right choice for
//! token stores with refresh rotation:
//!
//! ```rust,no_run
//! use amora_link::{CredentialProvider, Credentials};
//! use std::sync::Arc;
//!
//! struct TokenStore { /* ... */ }
//!
//! #[async_trait::async_trait]
//! impl CredentialProvider for TokenStore {
//!     async fn get_credentials(&self) -> amora_link::Result<Option<Credentials>> {
//!         // fetch / refresh the token here
//!         Ok(Some(Credentials::new("user_17", "fresh-token")))
//!     }
//! }
//! ```

use crate::error::Result;
use std::sync::Arc;

/// A principal plus the access token that authenticates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Identifier of the authenticated user.
    pub user_id: String,
    /// Bearer token attached to the gateway URL on connect.
    pub access_token: String,
}

impl Credentials {
    /// Create credentials for a user.
    pub fn new(user_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            access_token: access_token.into(),
        }
    }

    /// `true` when both the principal and the token are present.
    pub fn is_complete(&self) -> bool {
        !self.user_id.is_empty() && !self.access_token.is_empty()
    }
}

/// Async credential source called on every connect or reconnect attempt.
///
/// Return `Ok(None)` when no user is signed in; `connect()` then fails fast
/// with an authentication error and no reconnect is scheduled.
#[async_trait::async_trait]
pub trait CredentialProvider: Send + Sync + 'static {
    /// Return the current (or freshly refreshed) credentials.
    async fn get_credentials(&self) -> Result<Option<Credentials>>;
}

/// A boxed, reference-counted [`CredentialProvider`].
pub type ArcCredentialProvider = Arc<dyn CredentialProvider>;

/// Resolves the effective credentials for a connection attempt.
///
/// Holds either a static credential set or a dynamic provider. Call
/// [`resolve`](ResolvedAuth::resolve) before each attempt so the freshest
/// token is used.
#[derive(Clone)]
pub enum ResolvedAuth {
    /// Fixed credentials set at construction time (or none at all).
    Static(Option<Credentials>),
    /// Provider called on every attempt.
    Dynamic(ArcCredentialProvider),
}

impl ResolvedAuth {
    /// Obtain effective credentials, calling the dynamic provider if present.
    pub async fn resolve(&self) -> Result<Option<Credentials>> {
        match self {
            Self::Static(creds) => Ok(creds.clone()),
            Self::Dynamic(provider) => provider.get_credentials().await,
        }
    }
}

impl Default for ResolvedAuth {
    fn default() -> Self {
        Self::Static(None)
    }
}

impl std::fmt::Debug for ResolvedAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(Some(c)) => write!(f, "ResolvedAuth::Static(user={})", c.user_id),
            Self::Static(None) => write!(f, "ResolvedAuth::Static(none)"),
            Self::Dynamic(_) => write!(f, "ResolvedAuth::Dynamic(<provider>)"),
        }
    }
}

impl From<Credentials> for ResolvedAuth {
    fn from(c: Credentials) -> Self {
        Self::Static(Some(c))
    }
}

impl From<ArcCredentialProvider> for ResolvedAuth {
    fn from(p: ArcCredentialProvider) -> Self {
        Self::Dynamic(p)
    }
}
