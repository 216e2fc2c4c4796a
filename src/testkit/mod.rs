//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`store`] - [`RecordingStore`](store::RecordingStore), a call-counting
//!   in-memory store with scripted failures and latency.
//! - [`config`] - Canonical test configurations (fast retries, short
//!   cache windows).

pub mod config;
pub mod store;
