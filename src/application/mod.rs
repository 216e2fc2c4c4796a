//! Application services (use cases).
//!
//! These services sit between views and the [`ComparisonStore`](crate::port::ComparisonStore)
//! port and keep locally held data consistent with the backend.
//!
//! - [`cache`] - Coalescing query cache with stale-while-revalidate
//! - [`keys`] - Cache keys and payloads for comparison queries
//! - [`mutation`] - Set mutations with selective invalidation
//! - [`binding`] - Read bindings consumed by views
//! - [`auth`] - Observable sign-in state

pub mod auth;
pub mod binding;
pub mod cache;
pub mod keys;
pub mod mutation;

pub use auth::{spawn_auth_watcher, AuthState};
pub use binding::{ComparisonQueries, MemberHistories, NameEdit, QueryResult, QueryStatus};
pub use keys::{MemberCodes, QueryData, QueryKey};
pub use mutation::{MutationCoordinator, MutationKind, PendingMutation};
