//! Read bindings for views over comparison sets and price history.
//!
//! Each binding derives a canonical [`QueryKey`] from its inputs and reads
//! through the shared [`QueryCache`]. Absent inputs, or user data requested
//! while signed out, produce an idle result without any fetch.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::{join_all, try_join_all};

use super::auth::AuthState;
use super::cache::{EntrySnapshot, QueryCache, ReadMode};
use super::keys::{QueryData, QueryKey};
use super::mutation::MutationCoordinator;
use crate::domain::{
    ComparisonSet, ComparisonSetSummary, PriceBar, SetId, StockCode, TimeRange,
};
use crate::error::{Error, Result};
use crate::port::ComparisonStore;

/// Lifecycle of a bound query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// Inputs missing or not signed in; nothing fetched.
    Idle,
    /// First fetch outstanding, no data yet.
    Loading,
    Success,
    Error,
    /// Data present while a background refetch runs.
    Refetching,
}

/// State handed to a view.
#[derive(Debug, Clone)]
pub struct QueryResult<T> {
    pub status: QueryStatus,
    /// Latest value; kept on error when a previous fetch succeeded.
    pub data: Option<T>,
    pub is_loading: bool,
    pub is_fetching: bool,
    pub error: Option<Arc<Error>>,
}

impl<T> QueryResult<T> {
    #[must_use]
    pub fn idle() -> Self {
        Self {
            status: QueryStatus::Idle,
            data: None,
            is_loading: false,
            is_fetching: false,
            error: None,
        }
    }

    fn success(data: T, is_fetching: bool) -> Self {
        Self {
            status: if is_fetching {
                QueryStatus::Refetching
            } else {
                QueryStatus::Success
            },
            data: Some(data),
            is_loading: false,
            is_fetching,
            error: None,
        }
    }

    fn failure(error: Arc<Error>, data: Option<T>) -> Self {
        Self {
            status: QueryStatus::Error,
            data,
            is_loading: false,
            is_fetching: false,
            error: Some(error),
        }
    }

    /// Invalidated values are hidden: they predate a mutation.
    fn from_snapshot(snapshot: EntrySnapshot<T>) -> Self {
        let value = snapshot.value.filter(|_| !snapshot.is_invalidated);
        match (value, snapshot.error) {
            (None, _) if snapshot.is_fetching => Self {
                status: QueryStatus::Loading,
                data: None,
                is_loading: true,
                is_fetching: true,
                error: None,
            },
            (Some(value), _) if snapshot.is_fetching => Self::success(value, true),
            (data, Some(error)) => Self::failure(error, data),
            (Some(value), None) => Self::success(value, false),
            (None, None) => Self::idle(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.status, QueryStatus::Success | QueryStatus::Refetching)
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.status == QueryStatus::Idle
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    /// Transform the data, keeping status and error.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> QueryResult<U> {
        QueryResult {
            status: self.status,
            data: self.data.map(f),
            is_loading: self.is_loading,
            is_fetching: self.is_fetching,
            error: self.error,
        }
    }

    /// Same status and error with no data.
    fn without_data<U>(self) -> QueryResult<U> {
        QueryResult {
            status: self.status,
            data: None,
            is_loading: self.is_loading,
            is_fetching: self.is_fetching,
            error: self.error,
        }
    }

    /// Convert into a plain result, for callers that only want the value.
    ///
    /// # Errors
    ///
    /// The recorded error, or [`Error::InvalidPayload`] when nothing was
    /// loaded.
    pub fn into_result(self) -> Result<T> {
        match (self.data, self.error) {
            (_, Some(error)) => Err(Error::from_shared(error)),
            (Some(data), None) => Ok(data),
            (None, None) => Err(Error::InvalidPayload(format!(
                "query is {:?}",
                self.status
            ))),
        }
    }
}

/// Per-member price history, each loaded and failing independently.
pub type MemberHistories = Vec<(StockCode, QueryResult<Vec<PriceBar>>)>;

/// Cache-backed reads for comparison views.
#[derive(Clone)]
pub struct ComparisonQueries {
    store: Arc<dyn ComparisonStore>,
    cache: QueryCache<QueryKey, QueryData>,
    auth: AuthState,
    mode: ReadMode,
}

impl ComparisonQueries {
    #[must_use]
    pub fn new(
        store: Arc<dyn ComparisonStore>,
        cache: QueryCache<QueryKey, QueryData>,
        auth: AuthState,
    ) -> Self {
        Self {
            store,
            cache,
            auth,
            mode: ReadMode::default(),
        }
    }

    #[must_use]
    pub fn with_read_mode(mut self, mode: ReadMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn cache(&self) -> &QueryCache<QueryKey, QueryData> {
        &self.cache
    }

    /// All sets of the signed-in user.
    pub async fn sets(&self) -> QueryResult<Vec<ComparisonSetSummary>> {
        if !self.auth.is_authenticated() {
            return QueryResult::idle();
        }
        let store = Arc::clone(&self.store);
        self.read(QueryKey::SetList, QueryData::into_set_list, move || {
            let store = Arc::clone(&store);
            async move { store.list_sets().await.map(QueryData::SetList) }
        })
        .await
    }

    /// One set with its members. Idle when no set is selected.
    pub async fn set_detail(&self, id: Option<&SetId>) -> QueryResult<ComparisonSet> {
        let Some(id) = id else {
            return QueryResult::idle();
        };
        if !self.auth.is_authenticated() {
            return QueryResult::idle();
        }
        let store = Arc::clone(&self.store);
        let set_id = id.clone();
        self.read(QueryKey::set_detail(id), QueryData::into_set_detail, move || {
            let store = Arc::clone(&store);
            let set_id = set_id.clone();
            async move { store.get_set(&set_id).await.map(QueryData::SetDetail) }
        })
        .await
    }

    /// Bars for one company at the interval `range` maps to.
    pub async fn price_history(
        &self,
        stock_code: Option<&StockCode>,
        range: TimeRange,
    ) -> QueryResult<Vec<PriceBar>> {
        let Some(stock_code) = stock_code else {
            return QueryResult::idle();
        };
        let interval = range.interval();
        let store = Arc::clone(&self.store);
        let code = stock_code.clone();
        self.read(
            QueryKey::price_history(stock_code, interval),
            QueryData::into_price_history,
            move || {
                let store = Arc::clone(&store);
                let code = code.clone();
                async move {
                    store
                        .get_price_history(&code, interval)
                        .await
                        .map(QueryData::PriceHistory)
                }
            },
        )
        .await
    }

    /// Bars for every member of a set as one value.
    ///
    /// Keyed by the sorted member list, so any set holding the same
    /// companies shares the entry. Fails as a whole if any member fails.
    pub async fn set_prices(
        &self,
        id: Option<&SetId>,
        range: TimeRange,
    ) -> QueryResult<Vec<(StockCode, Vec<PriceBar>)>> {
        let detail = self.set_detail(id).await;
        let Some(set) = detail.data.clone().filter(|_| detail.is_success()) else {
            return detail.without_data();
        };
        let codes = set.sorted_codes();
        if codes.is_empty() {
            return QueryResult::success(Vec::new(), false);
        }

        let interval = range.interval();
        let store = Arc::clone(&self.store);
        let key = QueryKey::set_prices(codes.clone(), interval);
        self.read(key, QueryData::into_set_prices, move || {
            let store = Arc::clone(&store);
            let codes = codes.clone();
            async move {
                let series = try_join_all(codes.into_iter().map(|code| {
                    let store = Arc::clone(&store);
                    async move {
                        let bars = store.get_price_history(&code, interval).await?;
                        Ok::<_, Error>((code, bars))
                    }
                }))
                .await?;
                Ok(QueryData::SetPrices(series))
            }
        })
        .await
    }

    /// Per-member price history; one member failing leaves the others
    /// loaded.
    pub async fn member_price_histories(
        &self,
        id: Option<&SetId>,
        range: TimeRange,
    ) -> QueryResult<MemberHistories> {
        let detail = self.set_detail(id).await;
        let Some(set) = detail.data.clone().filter(|_| detail.is_success()) else {
            return detail.without_data();
        };
        let codes = set.sorted_codes();
        let results = join_all(
            codes
                .iter()
                .map(|code| self.price_history(Some(code), range)),
        )
        .await;
        QueryResult::success(codes.into_iter().zip(results).collect(), false)
    }

    /// Current state of `key` without fetching.
    #[must_use]
    pub fn peek(&self, key: &QueryKey) -> QueryResult<QueryData> {
        self.cache
            .snapshot(key)
            .map_or_else(QueryResult::idle, QueryResult::from_snapshot)
    }

    async fn read<T, F, Fut>(
        &self,
        key: QueryKey,
        extract: fn(QueryData) -> Option<T>,
        fetcher: F,
    ) -> QueryResult<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<QueryData>> + Send + 'static,
    {
        let outcome = self.cache.fetch(key.clone(), self.mode, fetcher).await;
        let snapshot = self.cache.snapshot(&key);
        match outcome.map(extract) {
            Ok(Some(data)) => {
                let is_fetching = snapshot.is_some_and(|s| s.is_fetching);
                QueryResult::success(data, is_fetching)
            }
            Ok(None) => QueryResult::failure(
                Arc::new(Error::InvalidPayload(format!("unexpected payload for {key}"))),
                None,
            ),
            Err(err) => {
                let previous = snapshot
                    .filter(|s| !s.is_invalidated)
                    .and_then(|s| s.value)
                    .and_then(extract);
                QueryResult::failure(Arc::new(err), previous)
            }
        }
    }
}

/// Optimistic rename: the draft shows at once and reverts on failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameEdit {
    set_id: SetId,
    committed: String,
    displayed: String,
}

impl NameEdit {
    #[must_use]
    pub fn new(set: &ComparisonSet) -> Self {
        Self {
            set_id: set.id.clone(),
            committed: set.name.clone(),
            displayed: set.name.clone(),
        }
    }

    /// Name to render right now.
    #[must_use]
    pub fn displayed(&self) -> &str {
        &self.displayed
    }

    /// Last name confirmed by the backend.
    #[must_use]
    pub fn committed(&self) -> &str {
        &self.committed
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.displayed != self.committed
    }

    pub fn set_draft(&mut self, name: impl Into<String>) {
        self.displayed = name.into();
    }

    /// Send the draft. On any failure, including local validation, the
    /// displayed name reverts to the committed one.
    ///
    /// # Errors
    ///
    /// The rename error.
    pub async fn commit(&mut self, mutations: &MutationCoordinator) -> Result<()> {
        match mutations.rename_set(&self.set_id, &self.displayed).await {
            Ok(name) => {
                self.committed.clone_from(&name);
                self.displayed = name;
                Ok(())
            }
            Err(err) => {
                self.displayed.clone_from(&self.committed);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::cache::RetryPolicy;
    use crate::domain::MembershipPolicy;
    use crate::infrastructure::config::cache::CacheConfig;
    use crate::testkit::store::RecordingStore;

    fn queries(auth: AuthState) -> (Arc<RecordingStore>, ComparisonQueries) {
        let store = Arc::new(RecordingStore::demo());
        let cache = QueryCache::new(CacheConfig::default(), RetryPolicy::none());
        (store.clone(), ComparisonQueries::new(store, cache, auth))
    }

    #[tokio::test]
    async fn missing_selection_is_idle_without_fetch() {
        let (store, queries) = queries(AuthState::new(Some("t".into())));
        let result = queries.set_detail(None).await;
        assert_eq!(result.status, QueryStatus::Idle);
        assert!(result.data.is_none());
        assert_eq!(store.total_calls(), 0);
    }

    #[tokio::test]
    async fn signed_out_user_queries_are_idle() {
        let (store, queries) = queries(AuthState::signed_out());
        assert!(queries.sets().await.is_idle());
        assert_eq!(store.total_calls(), 0);
    }

    #[tokio::test]
    async fn peek_hides_invalidated_value() {
        let (_, queries) = queries(AuthState::new(Some("t".into())));
        queries.sets().await;
        queries.cache().invalidate(&QueryKey::SetList);

        let peeked = queries.peek(&QueryKey::SetList);
        assert_ne!(peeked.status, QueryStatus::Success);
        assert!(peeked.data.is_none());
    }

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let (store, queries) = queries(AuthState::new(Some("t".into())));
        let first = queries.sets().await;
        let second = queries.sets().await;
        assert_eq!(first.status, QueryStatus::Success);
        assert_eq!(first.data, second.data);
        assert_eq!(store.calls("list_sets"), 1);
    }

    #[tokio::test]
    async fn peek_reports_idle_for_unknown_key() {
        let (_, queries) = queries(AuthState::signed_out());
        assert!(queries.peek(&QueryKey::SetList).is_idle());
    }

    #[tokio::test]
    async fn failed_rename_reverts_displayed_name() {
        let store = Arc::new(RecordingStore::demo());
        let cache = QueryCache::new(CacheConfig::default(), RetryPolicy::none());
        let mutations = MutationCoordinator::new(store.clone(), cache, MembershipPolicy::default());
        let set = ComparisonSet::new(SetId::try_new("1").unwrap(), "Semiconductors");

        let mut edit = NameEdit::new(&set);
        edit.set_draft("Chips");
        assert_eq!(edit.displayed(), "Chips");

        store.fail_next("rename_set", vec![Error::Rejected { status: 400, message: "no".into() }]);
        assert!(edit.commit(&mutations).await.is_err());
        assert_eq!(edit.displayed(), "Semiconductors");

        edit.set_draft("  Chips ");
        edit.commit(&mutations).await.unwrap();
        assert_eq!(edit.committed(), "Chips");
        assert!(!edit.is_dirty());
    }
}
