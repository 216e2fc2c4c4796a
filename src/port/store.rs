//! Remote comparison store port.

use async_trait::async_trait;

use crate::domain::{ComparisonSet, ComparisonSetSummary, Interval, PriceBar, SetId, StockCode};
use crate::error::Result;

/// Backend owning comparison sets and serving price history.
///
/// Every call is one atomic request/response: it either fully applies
/// remotely or fails. Implementations do not retry; the query cache owns
/// retry policy for reads, and mutations are never retried.
#[async_trait]
pub trait ComparisonStore: Send + Sync {
    /// List the caller's comparison sets.
    async fn list_sets(&self) -> Result<Vec<ComparisonSetSummary>>;

    /// Fetch one set with its member companies.
    ///
    /// Returns [`Error::NotFound`](crate::error::Error::NotFound) when the
    /// set does not exist (e.g. deleted elsewhere).
    async fn get_set(&self, id: &SetId) -> Result<ComparisonSet>;

    /// Create an empty set and return its identifier.
    async fn create_set(&self, name: &str) -> Result<SetId>;

    async fn rename_set(&self, id: &SetId, name: &str) -> Result<()>;

    async fn add_member(&self, id: &SetId, stock_code: &StockCode) -> Result<()>;

    async fn remove_member(&self, id: &SetId, stock_code: &StockCode) -> Result<()>;

    async fn delete_set(&self, id: &SetId) -> Result<()>;

    /// Fetch OHLCV bars for one company at the given interval.
    async fn get_price_history(&self, stock_code: &StockCode, interval: Interval)
        -> Result<Vec<PriceBar>>;

    /// Backend name for logging/debugging.
    fn backend_name(&self) -> &'static str;
}
