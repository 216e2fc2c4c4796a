//! REST adapter for the comparison backend.
//!
//! - [`client`] - [`HttpComparisonStore`], the reqwest-backed store
//! - [`dto`] - Response schemas and narrowing into domain types

pub mod client;
pub mod dto;

pub use client::HttpComparisonStore;
