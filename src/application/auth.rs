//! Observable authentication state.
//!
//! The bearer token lives in a `watch` channel. The HTTP store reads it per
//! request, bindings check [`AuthState::is_authenticated`] before building
//! user-set fetches, and [`spawn_auth_watcher`] purges user-owned cache
//! entries whenever the signed-in identity goes away or changes.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use super::cache::QueryCache;
use super::keys::{QueryData, QueryKey};

/// Process-wide sign-in state.
#[derive(Clone)]
pub struct AuthState {
    tx: Arc<watch::Sender<Option<String>>>,
}

impl AuthState {
    #[must_use]
    pub fn new(token: Option<String>) -> Self {
        let (tx, _) = watch::channel(token.filter(|t| !t.trim().is_empty()));
        Self { tx: Arc::new(tx) }
    }

    #[must_use]
    pub fn signed_out() -> Self {
        Self::new(None)
    }

    /// Store a bearer token. Blank tokens sign out.
    pub fn sign_in(&self, token: impl Into<String>) {
        let token = token.into();
        if token.trim().is_empty() {
            self.sign_out();
            return;
        }
        self.tx.send_replace(Some(token));
    }

    pub fn sign_out(&self) {
        self.tx.send_replace(None);
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Receiver observing token changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.tx.subscribe()
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::signed_out()
    }
}

/// Remove user-owned entries when the token is cleared or replaced.
pub fn spawn_auth_watcher(
    auth: &AuthState,
    cache: QueryCache<QueryKey, QueryData>,
) -> JoinHandle<()> {
    let mut rx = auth.subscribe();
    let mut current = rx.borrow_and_update().clone();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let next = rx.borrow_and_update().clone();
            if current.is_some() && current != next {
                let removed = cache.remove_where(QueryKey::is_user_owned);
                info!(
                    removed,
                    signed_in = next.is_some(),
                    "Auth changed, cleared user comparison data"
                );
            }
            current = next;
        }
    })
}
