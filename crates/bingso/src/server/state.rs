//! Shared state for the HTTP server.

use std::fmt;
use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use tracing::warn;
use uuid::Uuid;

use crate::board::BoardHub;
use crate::config::Config;
use crate::storage::SharedStorage;

/// Length of the derived cookie signing key.
const KEY_LEN: usize = 64;

/// State handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Record storage.
    pub storage: SharedStorage,
    /// Loaded configuration.
    pub config: Arc<Config>,
    /// Status boards kept current by the poller.
    pub board: BoardHub,
    key: Key,
}

impl AppState {
    /// Build the state, deriving the cookie signing key from
    /// `auth.session_secret`.
    ///
    /// Without a configured secret a random one is used, so sessions do not
    /// survive a restart.
    #[must_use]
    pub fn new(storage: SharedStorage, config: Config, board: BoardHub) -> Self {
        let secret = config.auth.session_secret.clone().unwrap_or_else(|| {
            warn!("auth.session_secret is not set; sessions end when the server restarts");
            format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
        });
        Self {
            storage,
            config: Arc::new(config),
            board,
            key: signing_key(&secret),
        }
    }
}

/// Stretch a secret into a cookie signing key.
fn signing_key(secret: &str) -> Key {
    let mut bytes = [0u8; KEY_LEN];
    blake3::Hasher::new()
        .update(secret.as_bytes())
        .finalize_xof()
        .fill(&mut bytes);
    Key::from(&bytes)
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.key.clone()
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("storage", &self.storage)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signing_key_is_stable() {
        let a = signing_key("a-long-enough-session-secret-value-123");
        let b = signing_key("a-long-enough-session-secret-value-123");
        let c = signing_key("another-session-secret-value-456789012");
        assert_eq!(a.master(), b.master());
        assert_ne!(a.master(), c.master());
    }
}
