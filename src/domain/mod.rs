//! Backend-agnostic domain types for comparison sets and price history.
//!
//! - [`id`] - Identifier newtypes (`SetId`, `StockCode`)
//! - [`comparison`] - Comparison sets, member companies and ratios
//! - [`price`] - Time ranges, bar intervals and OHLCV bars
//! - [`error`] - Local validation failures

pub mod comparison;
pub mod error;
pub mod id;
pub mod price;

pub use comparison::{
    validate_set_name, CompareCompany, ComparisonSet, ComparisonSetSummary, FinancialRatios,
    MembershipPolicy,
};
pub use error::ValidationError;
pub use id::{SetId, StockCode};
pub use price::{Interval, PriceBar, TimeRange};
