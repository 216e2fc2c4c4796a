//! Comparison-set mutations and the cache invalidation they imply.
//!
//! Each mutation is one remote call. Local rules are checked first and a
//! violation never reaches the store. On success the coordinator
//! invalidates exactly the keys whose value depends on the mutated set; on
//! failure nothing is invalidated and the error goes back to the caller.
//! The coordinator never writes fetched values into the cache.
//!
//! Membership mutations on one set are serialized: the member list a check
//! runs against cannot change until that mutation has settled and
//! invalidated its keys.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use super::cache::{QueryCache, ReadMode};
use super::keys::{MemberCodes, QueryData, QueryKey};
use crate::domain::{validate_set_name, ComparisonSet, MembershipPolicy, SetId, StockCode};
use crate::error::{Error, Result};
use crate::port::ComparisonStore;

/// Kind of an in-flight mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    Create,
    Rename,
    AddMember(StockCode),
    RemoveMember(StockCode),
    Delete,
}

/// A mutation whose remote call has not settled yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMutation {
    pub id: u64,
    /// `None` for creation, where the id is not known yet.
    pub set_id: Option<SetId>,
    pub kind: MutationKind,
}

/// Removes its mutation from the pending table when dropped.
struct PendingGuard<'a> {
    pending: &'a Mutex<HashMap<u64, PendingMutation>>,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.id);
    }
}

/// Applies comparison-set mutations and invalidates dependent cache keys.
pub struct MutationCoordinator {
    store: Arc<dyn ComparisonStore>,
    cache: QueryCache<QueryKey, QueryData>,
    policy: MembershipPolicy,
    pending: Mutex<HashMap<u64, PendingMutation>>,
    next_id: AtomicU64,
    set_locks: Mutex<HashMap<SetId, Arc<AsyncMutex<()>>>>,
}

impl MutationCoordinator {
    #[must_use]
    pub fn new(
        store: Arc<dyn ComparisonStore>,
        cache: QueryCache<QueryKey, QueryData>,
        policy: MembershipPolicy,
    ) -> Self {
        Self {
            store,
            cache,
            policy,
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            set_locks: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn policy(&self) -> MembershipPolicy {
        self.policy
    }

    /// Mutations whose remote call is outstanding.
    #[must_use]
    pub fn pending(&self) -> Vec<PendingMutation> {
        let mut pending: Vec<PendingMutation> = self.pending.lock().values().cloned().collect();
        pending.sort_by_key(|p| p.id);
        pending
    }

    fn begin(&self, set_id: Option<&SetId>, kind: MutationKind) -> PendingGuard<'_> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.pending.lock().insert(
            id,
            PendingMutation {
                id,
                set_id: set_id.cloned(),
                kind,
            },
        );
        PendingGuard {
            pending: &self.pending,
            id,
        }
    }

    /// Wait for other membership mutations on `id` to settle.
    async fn lock_set(&self, id: &SetId) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(self.set_locks.lock().entry(id.clone()).or_default());
        if let Ok(guard) = Arc::clone(&lock).try_lock_owned() {
            return guard;
        }
        debug!(set_id = %id, "Waiting for in-flight mutation on set");
        lock.lock_owned().await
    }

    /// Create an empty set.
    ///
    /// # Errors
    ///
    /// [`ValidationError::EmptyName`](crate::domain::ValidationError::EmptyName)
    /// for blank names, or the store's error.
    pub async fn create_set(&self, name: &str) -> Result<SetId> {
        let name = validate_set_name(name)?;
        let _pending = self.begin(None, MutationKind::Create);

        let id = self
            .store
            .create_set(&name)
            .await
            .inspect_err(|err| warn!(error = %err, "Create comparison set failed"))?;

        self.cache.invalidate(&QueryKey::SetList);
        info!(set_id = %id, name = %name, "Comparison set created");
        Ok(id)
    }

    /// Rename a set. Returns the stored (trimmed) name.
    ///
    /// # Errors
    ///
    /// Blank names are rejected locally without a remote call.
    pub async fn rename_set(&self, id: &SetId, name: &str) -> Result<String> {
        let name = validate_set_name(name)?;
        let _pending = self.begin(Some(id), MutationKind::Rename);

        self.store
            .rename_set(id, &name)
            .await
            .inspect_err(|err| warn!(set_id = %id, error = %err, "Rename failed"))?;

        self.cache.invalidate(&QueryKey::set_detail(id));
        self.cache.invalidate(&QueryKey::SetList);
        info!(set_id = %id, name = %name, "Comparison set renamed");
        Ok(name)
    }

    /// Add a company to a set.
    ///
    /// The current member list is read through the cache; a full set or a
    /// duplicate member is rejected before the remote call.
    ///
    /// # Errors
    ///
    /// Validation errors, a failed detail read, or the store's error.
    pub async fn add_member(&self, id: &SetId, stock_code: &StockCode) -> Result<()> {
        let _serial = self.lock_set(id).await;
        let set = self.current_set(id).await?;
        self.policy.check_add(&set, stock_code)?;
        let previous = MemberCodes::new(set.sorted_codes());

        let _pending = self.begin(Some(id), MutationKind::AddMember(stock_code.clone()));
        self.store
            .add_member(id, stock_code)
            .await
            .inspect_err(|err| warn!(set_id = %id, stock_code = %stock_code, error = %err, "Add member failed"))?;

        self.invalidate_membership(id, Some(&previous));
        info!(set_id = %id, stock_code = %stock_code, "Company added to comparison set");
        Ok(())
    }

    /// Remove a company from a set. Removing the last member keeps the set.
    ///
    /// A fresh cached detail that lacks the company rejects the removal
    /// locally; otherwise the backend decides.
    ///
    /// # Errors
    ///
    /// [`ValidationError::NotAMember`](crate::domain::ValidationError::NotAMember),
    /// or the store's error, e.g. not-found when the set or member is gone.
    pub async fn remove_member(&self, id: &SetId, stock_code: &StockCode) -> Result<()> {
        let _serial = self.lock_set(id).await;
        if let Some(set) = self.fresh_cached_set(id) {
            self.policy.check_remove(&set, stock_code)?;
        }
        let previous = self.cached_members(id);

        let _pending = self.begin(Some(id), MutationKind::RemoveMember(stock_code.clone()));
        self.store
            .remove_member(id, stock_code)
            .await
            .inspect_err(|err| warn!(set_id = %id, stock_code = %stock_code, error = %err, "Remove member failed"))?;

        self.invalidate_membership(id, previous.as_ref());
        info!(set_id = %id, stock_code = %stock_code, "Company removed from comparison set");
        Ok(())
    }

    /// Delete a set and drop its cached detail.
    ///
    /// # Errors
    ///
    /// The store's error.
    pub async fn delete_set(&self, id: &SetId) -> Result<()> {
        let _serial = self.lock_set(id).await;
        let previous = self.cached_members(id);

        let _pending = self.begin(Some(id), MutationKind::Delete);
        self.store
            .delete_set(id)
            .await
            .inspect_err(|err| warn!(set_id = %id, error = %err, "Delete failed"))?;

        self.cache.remove(&QueryKey::set_detail(id));
        if let Some(previous) = previous {
            self.cache.remove_where(|key| is_prices_for(key, &previous));
        }
        self.cache.invalidate(&QueryKey::SetList);
        self.set_locks.lock().remove(id);
        info!(set_id = %id, "Comparison set deleted");
        Ok(())
    }

    async fn current_set(&self, id: &SetId) -> Result<ComparisonSet> {
        let store = Arc::clone(&self.store);
        let set_id = id.clone();
        let data = self
            .cache
            .fetch(QueryKey::set_detail(id), ReadMode::default(), move || {
                let store = Arc::clone(&store);
                let set_id = set_id.clone();
                async move { store.get_set(&set_id).await.map(QueryData::SetDetail) }
            })
            .await?;
        data.into_set_detail()
            .ok_or_else(|| Error::InvalidPayload(format!("unexpected payload for set {id}")))
    }

    fn fresh_cached_set(&self, id: &SetId) -> Option<ComparisonSet> {
        self.cache
            .snapshot(&QueryKey::set_detail(id))
            .filter(|snapshot| !snapshot.is_stale)
            .and_then(|snapshot| snapshot.value)
            .and_then(QueryData::into_set_detail)
    }

    fn cached_members(&self, id: &SetId) -> Option<MemberCodes> {
        self.cache
            .peek_value(&QueryKey::set_detail(id))
            .and_then(QueryData::into_set_detail)
            .map(|set| MemberCodes::new(set.sorted_codes()))
    }

    fn invalidate_membership(&self, id: &SetId, previous: Option<&MemberCodes>) {
        self.cache.invalidate(&QueryKey::set_detail(id));
        self.cache.invalidate(&QueryKey::SetList);
        if let Some(previous) = previous {
            self.cache
                .invalidate_where(|key| is_prices_for(key, previous));
        }
    }
}

fn is_prices_for(key: &QueryKey, members: &MemberCodes) -> bool {
    matches!(key, QueryKey::SetPrices { members: m, .. } if m == members)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::cache::RetryPolicy;
    use crate::domain::ValidationError;
    use crate::infrastructure::config::cache::CacheConfig;
    use crate::testkit::store::RecordingStore;

    fn setup() -> (Arc<RecordingStore>, QueryCache<QueryKey, QueryData>, MutationCoordinator) {
        let store = Arc::new(RecordingStore::demo());
        let cache = QueryCache::new(CacheConfig::default(), RetryPolicy::none());
        let coordinator =
            MutationCoordinator::new(store.clone(), cache.clone(), MembershipPolicy::new(3));
        (store, cache, coordinator)
    }

    fn code(s: &str) -> StockCode {
        StockCode::try_new(s).unwrap()
    }

    #[tokio::test]
    async fn blank_create_never_reaches_store() {
        let (store, _, coordinator) = setup();
        let err = coordinator.create_set(" ").await.unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::EmptyName)));
        assert_eq!(store.calls("create_set"), 0);
    }

    #[tokio::test]
    async fn add_beyond_cap_is_rejected_locally() {
        let (store, _, coordinator) = setup();
        let id = SetId::try_new("1").unwrap();
        coordinator.add_member(&id, &code("035420")).await.unwrap();

        let err = coordinator.add_member(&id, &code("035720")).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::MemberLimit { current: 3, max: 3 })
        ));
        assert_eq!(store.calls("add_member"), 1);
    }

    #[tokio::test]
    async fn failed_mutation_invalidates_nothing() {
        let (store, cache, coordinator) = setup();
        let id = SetId::try_new("1").unwrap();
        coordinator.current_set(&id).await.unwrap();

        store.fail_next("rename_set", vec![Error::Transport("reset".into())]);
        assert!(coordinator.rename_set(&id, "Memory").await.is_err());

        let snapshot = cache.snapshot(&QueryKey::set_detail(&id)).unwrap();
        assert!(!snapshot.is_invalidated);
        assert_eq!(store.calls("rename_set"), 1);
    }

    #[tokio::test]
    async fn removing_unknown_member_of_fresh_set_is_local() {
        let (store, _, coordinator) = setup();
        let id = SetId::try_new("1").unwrap();
        coordinator.current_set(&id).await.unwrap();

        let err = coordinator.remove_member(&id, &code("035720")).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::NotAMember { .. })
        ));
        assert_eq!(store.calls("remove_member"), 0);
    }

    #[tokio::test]
    async fn concurrent_adds_cannot_pass_the_cap_together() {
        let (store, _, coordinator) = setup();
        let id = SetId::try_new("1").unwrap();
        store.set_latency(std::time::Duration::from_millis(20));

        let (code_a, code_b) = (code("035420"), code("035720"));
        let (first, second) = tokio::join!(
            coordinator.add_member(&id, &code_a),
            coordinator.add_member(&id, &code_b),
        );

        assert!(first.is_ok() != second.is_ok());
        assert_eq!(store.calls("add_member"), 1);
        assert_eq!(coordinator.current_set(&id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn pending_table_is_empty_after_settlement() {
        let (_, _, coordinator) = setup();
        let id = coordinator.create_set("Autos").await.unwrap();
        coordinator.delete_set(&id).await.unwrap();
        assert!(coordinator.pending().is_empty());
    }
}
