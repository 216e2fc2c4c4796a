//! Composition root: builds the store, the shared cache and the services
//! that read and mutate through it.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::adapter::outbound::http::HttpComparisonStore;
use crate::adapter::outbound::memory::InMemoryComparisonStore;
use crate::application::cache::{QueryCache, RetryPolicy};
use crate::application::{
    spawn_auth_watcher, AuthState, ComparisonQueries, MutationCoordinator, QueryData, QueryKey,
};
use crate::error::Result;
use crate::infrastructure::config::settings::Config;
use crate::port::ComparisonStore;

/// Token used for the in-memory backend, which accepts any caller.
const MOCK_TOKEN: &str = "mock";

/// Wired services sharing one cache. Background tasks stop on drop.
pub struct Services {
    pub auth: AuthState,
    pub cache: QueryCache<QueryKey, QueryData>,
    pub queries: ComparisonQueries,
    pub mutations: Arc<MutationCoordinator>,
    store: Arc<dyn ComparisonStore>,
    tasks: Vec<JoinHandle<()>>,
}

impl Services {
    /// Wire services around `store`. Must run inside a Tokio runtime.
    #[must_use]
    pub fn build(config: &Config, store: Arc<dyn ComparisonStore>, auth: AuthState) -> Self {
        let cache = QueryCache::new(
            config.cache.clone(),
            RetryPolicy::from_config(&config.retry),
        );
        let tasks = vec![
            cache.spawn_gc(config.cache.gc_interval()),
            spawn_auth_watcher(&auth, cache.clone()),
        ];

        let queries = ComparisonQueries::new(Arc::clone(&store), cache.clone(), auth.clone());
        let mutations = Arc::new(MutationCoordinator::new(
            Arc::clone(&store),
            cache.clone(),
            config.comparison.policy(),
        ));

        info!(
            backend = store.backend_name(),
            authenticated = auth.is_authenticated(),
            "Services ready"
        );
        Self {
            auth,
            cache,
            queries,
            mutations,
            store,
            tasks,
        }
    }

    /// Connect to the configured backend, or the in-memory one when `mock`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built from `[api]`.
    pub fn connect(config: &Config, mock: bool) -> Result<Self> {
        if mock {
            let store: Arc<dyn ComparisonStore> = Arc::new(InMemoryComparisonStore::demo());
            return Ok(Self::build(config, store, AuthState::new(Some(MOCK_TOKEN.into()))));
        }

        let auth = AuthState::new(config.api.token_from_env());
        if !auth.is_authenticated() {
            warn!(
                env = %config.api.token_env,
                "No API token set, user comparison sets are unavailable"
            );
        }
        let store = HttpComparisonStore::from_config(&config.api, auth.subscribe())?;
        Ok(Self::build(config, Arc::new(store), auth))
    }

    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }
}

impl Drop for Services {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SetId;

    #[tokio::test]
    async fn mock_services_are_signed_in() {
        let services = Services::connect(&Config::default(), true).unwrap();
        assert_eq!(services.backend_name(), "memory");
        assert!(services.auth.is_authenticated());

        let id = SetId::try_new("1").unwrap();
        let detail = services.queries.set_detail(Some(&id)).await;
        assert!(detail.is_success());
        assert!(services.cache.contains_key(&QueryKey::set_detail(&id)));
    }

    #[tokio::test]
    async fn sign_out_clears_user_entries() {
        let services = Services::connect(&Config::default(), true).unwrap();
        assert!(services.queries.sets().await.is_success());

        let mut events = services.cache.subscribe();
        services.auth.sign_out();
        tokio::time::timeout(std::time::Duration::from_secs(2), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(!services.cache.contains_key(&QueryKey::SetList));
        assert!(services.queries.sets().await.is_idle());
    }
}
