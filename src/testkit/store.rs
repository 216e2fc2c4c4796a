//! Call-counting store for tests.
//!
//! Wraps an [`InMemoryComparisonStore`] and records every call by
//! operation name (`list_sets`, `get_set`, `create_set`, `rename_set`,
//! `add_member`, `remove_member`, `delete_set`, `get_price_history`).
//! Failures are scripted per operation, or per operation and argument as
//! `"get_price_history:005930"`, and consumed one per call.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::adapter::outbound::memory::InMemoryComparisonStore;
use crate::domain::{ComparisonSet, ComparisonSetSummary, Interval, PriceBar, SetId, StockCode};
use crate::error::{Error, Result};
use crate::port::ComparisonStore;

/// [`ComparisonStore`] that counts calls and replays scripted failures.
pub struct RecordingStore {
    inner: InMemoryComparisonStore,
    calls: Mutex<HashMap<&'static str, u32>>,
    failures: Mutex<HashMap<String, VecDeque<Error>>>,
    latency: Mutex<Duration>,
}

impl RecordingStore {
    pub fn new(inner: InMemoryComparisonStore) -> Self {
        Self {
            inner,
            calls: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            latency: Mutex::new(Duration::ZERO),
        }
    }

    /// Recording store over [`InMemoryComparisonStore::demo`].
    pub fn demo() -> Self {
        Self::new(InMemoryComparisonStore::demo())
    }

    /// Calls made to `op` so far.
    pub fn calls(&self, op: &str) -> u32 {
        self.calls.lock().get(op).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.calls.lock().values().sum()
    }

    /// Fail the next calls matching `target` with `errors`, in order.
    pub fn fail_next(&self, target: impl Into<String>, errors: Vec<Error>) {
        self.failures
            .lock()
            .entry(target.into())
            .or_default()
            .extend(errors);
    }

    /// Fail the next `times` calls matching `target` with a transient error.
    pub fn fail_transient(&self, target: impl Into<String>, times: usize) {
        let errors = (0..times)
            .map(|i| Error::Transport(format!("connection reset ({})", i + 1)))
            .collect();
        self.fail_next(target, errors);
    }

    /// Delay every call by `latency` before it resolves.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    async fn enter(&self, op: &'static str, arg: Option<&str>) -> Result<()> {
        *self.calls.lock().entry(op).or_insert(0) += 1;

        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        match self.take_failure(op, arg) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn take_failure(&self, op: &str, arg: Option<&str>) -> Option<Error> {
        let mut failures = self.failures.lock();
        if let Some(arg) = arg {
            let scoped = failures
                .get_mut(&format!("{op}:{arg}"))
                .and_then(VecDeque::pop_front);
            if scoped.is_some() {
                return scoped;
            }
        }
        failures.get_mut(op).and_then(VecDeque::pop_front)
    }
}

#[async_trait]
impl ComparisonStore for RecordingStore {
    async fn list_sets(&self) -> Result<Vec<ComparisonSetSummary>> {
        self.enter("list_sets", None).await?;
        self.inner.list_sets().await
    }

    async fn get_set(&self, id: &SetId) -> Result<ComparisonSet> {
        self.enter("get_set", Some(id.as_str())).await?;
        self.inner.get_set(id).await
    }

    async fn create_set(&self, name: &str) -> Result<SetId> {
        self.enter("create_set", None).await?;
        self.inner.create_set(name).await
    }

    async fn rename_set(&self, id: &SetId, name: &str) -> Result<()> {
        self.enter("rename_set", Some(id.as_str())).await?;
        self.inner.rename_set(id, name).await
    }

    async fn add_member(&self, id: &SetId, stock_code: &StockCode) -> Result<()> {
        self.enter("add_member", Some(stock_code.as_str())).await?;
        self.inner.add_member(id, stock_code).await
    }

    async fn remove_member(&self, id: &SetId, stock_code: &StockCode) -> Result<()> {
        self.enter("remove_member", Some(stock_code.as_str())).await?;
        self.inner.remove_member(id, stock_code).await
    }

    async fn delete_set(&self, id: &SetId) -> Result<()> {
        self.enter("delete_set", Some(id.as_str())).await?;
        self.inner.delete_set(id).await
    }

    async fn get_price_history(
        &self,
        stock_code: &StockCode,
        interval: Interval,
    ) -> Result<Vec<PriceBar>> {
        self.enter("get_price_history", Some(stock_code.as_str()))
            .await?;
        self.inner.get_price_history(stock_code, interval).await
    }

    fn backend_name(&self) -> &'static str {
        "recording"
    }
}
