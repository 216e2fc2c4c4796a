//! Validation failures raised before any remote call is issued.
//!
//! These are surfaced immediately and never retried.
//!
//! ```
//! use comparesync::domain::{validate_set_name, ValidationError};
//!
//! assert!(matches!(validate_set_name("   "), Err(ValidationError::EmptyName)));
//! ```

use thiserror::Error;

use super::id::StockCode;

/// Local rule violations for comparison-set mutations and identifiers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Set names must contain at least one non-whitespace character.
    #[error("comparison set name cannot be empty")]
    EmptyName,

    /// The set already holds the maximum number of companies.
    #[error("comparison set is full: {current} of {max} companies")]
    MemberLimit {
        /// Members currently in the set.
        current: usize,
        /// Configured cap.
        max: usize,
    },

    /// The company is already a member of the set.
    #[error("{stock_code} is already in the comparison set")]
    DuplicateMember {
        /// The rejected stock code.
        stock_code: StockCode,
    },

    /// The company is not a member of the set.
    #[error("{stock_code} is not in the comparison set")]
    NotAMember {
        /// The rejected stock code.
        stock_code: StockCode,
    },

    /// Stock codes are non-empty ASCII alphanumerics.
    #[error("invalid stock code '{value}'")]
    InvalidStockCode {
        /// The rejected input.
        value: String,
    },

    /// Set identifiers cannot be blank.
    #[error("comparison set id cannot be empty")]
    EmptySetId,

    /// Unknown time range label.
    #[error("unknown time range '{value}' (expected 1M, 3M, 6M, 1Y, 3Y or 5Y)")]
    InvalidTimeRange {
        /// The rejected input.
        value: String,
    },
}
