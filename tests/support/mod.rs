//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use comparesync::application::cache::QueryCache;
use comparesync::application::{
    AuthState, ComparisonQueries, MutationCoordinator, QueryData, QueryKey,
};
use comparesync::domain::{MembershipPolicy, SetId, StockCode};
use comparesync::infrastructure::config::cache::CacheConfig;
use comparesync::testkit::config;
use comparesync::testkit::store::RecordingStore;

pub const SEMIS: &str = "1";
pub const SAMSUNG: &str = "005930";
pub const HYNIX: &str = "000660";
pub const NAVER: &str = "035420";
pub const KAKAO: &str = "035720";
pub const LG_CHEM: &str = "051910";
pub const HYUNDAI: &str = "005380";

/// Store, cache and services wired the way the application wires them.
pub struct Harness {
    pub store: Arc<RecordingStore>,
    pub cache: QueryCache<QueryKey, QueryData>,
    pub auth: AuthState,
    pub queries: ComparisonQueries,
    pub mutations: Arc<MutationCoordinator>,
}

impl Harness {
    /// Signed in, long cache windows, zero-delay retries.
    pub fn new() -> Self {
        Self::with_cache(config::cache(60_000, 600_000))
    }

    pub fn with_cache(cache_config: CacheConfig) -> Self {
        let store = Arc::new(RecordingStore::demo());
        let cache = QueryCache::new(cache_config, config::retry_policy());
        let auth = AuthState::new(Some("test-token".into()));
        let queries = ComparisonQueries::new(store.clone(), cache.clone(), auth.clone());
        let mutations = Arc::new(MutationCoordinator::new(
            store.clone(),
            cache.clone(),
            MembershipPolicy::default(),
        ));
        Self {
            store,
            cache,
            auth,
            queries,
            mutations,
        }
    }
}

pub fn set_id(id: &str) -> SetId {
    SetId::try_new(id).expect("valid set id")
}

pub fn code(code: &str) -> StockCode {
    StockCode::try_new(code).expect("valid stock code")
}
