//! Generic in-memory query cache.
//!
//! - [`query::QueryCache`]: Keyed cache with request coalescing,
//!   stale-while-revalidate, invalidation and GC
//! - [`retry::RetryPolicy`]: Capped exponential backoff for fetches
//! - [`event::CacheEvent`]: Broadcast notifications of entry changes

pub mod event;
pub mod query;
pub mod retry;

pub use event::{CacheEvent, CacheEventKind};
pub use query::{CacheKey, EntrySnapshot, QueryCache, ReadMode};
pub use retry::{FetchFailure, RetryPolicy};
