//! comparesync - client-side synchronization for stock comparison sets.
//!
//! Keeps a process-local view of a user's comparison sets and the price
//! history of their member companies consistent with a remote backend,
//! without redundant requests.
//!
//! # Architecture
//!
//! - **Cache** - [`application::cache::QueryCache`] coalesces concurrent
//!   reads of one key into a single fetch, serves time-stale values while
//!   revalidating, retries transient failures with capped backoff and evicts
//!   idle entries.
//! - **Mutations** - [`application::MutationCoordinator`] validates locally,
//!   performs one remote call and invalidates exactly the dependent keys.
//! - **Bindings** - [`application::ComparisonQueries`] derives canonical keys
//!   from view inputs and reports `Idle`/`Loading`/`Success`/`Error`/
//!   `Refetching` state.
//!
//! # Modules
//!
//! - [`domain`] - Sets, companies, identifiers, time ranges and price bars
//! - [`port`] - The [`ComparisonStore`](port::ComparisonStore) backend trait
//! - [`adapter`] - HTTP and in-memory stores, and the CLI
//! - [`application`] - Cache, mutation coordinator, bindings and auth state
//! - [`infrastructure`] - Configuration and service wiring
//! - [`error`] - Error types for the crate
//!
//! # Example
//!
//! ```no_run
//! use comparesync::domain::{SetId, TimeRange};
//! use comparesync::infrastructure::bootstrap::Services;
//! use comparesync::infrastructure::config::settings::Config;
//!
//! # async fn run() -> comparesync::error::Result<()> {
//! let services = Services::connect(&Config::default(), true)?;
//! let id = SetId::try_new("1")?;
//! let prices = services.queries.set_prices(Some(&id), TimeRange::OneYear).await;
//! println!("{:?}", prices.status);
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
