//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! Ports define the extension points in the hexagonal architecture.
//! They are traits that adapters implement to integrate with external
//! systems.
//!
//! # Architecture
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │      Application        │
//!                    │  cache · mutation ·     │
//!                    │  bindings               │
//!                    └────────────┬────────────┘
//!                                 │
//!                                 ▼
//!                      ┌─────────────────────┐
//!                      │   ComparisonStore   │
//!                      └──────────┬──────────┘
//!                   ┌─────────────┴─────────────┐
//!                   ▼                           ▼
//!            ┌─────────────┐             ┌─────────────┐
//!            │ HTTP Adapter│             │ In-memory   │
//!            └─────────────┘             └─────────────┘
//! ```
//!
//! # Available Ports
//!
//! - [`ComparisonStore`] - Remote comparison sets and price history

mod store;

pub use store::ComparisonStore;
