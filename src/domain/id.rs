//! Domain identifier types with proper encapsulation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::ValidationError;

/// Comparison set identifier assigned by the backend.
///
/// The inner String is private to ensure all construction goes through
/// the validating constructor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SetId(String);

impl SetId {
    /// Create a `SetId`, rejecting blank input.
    pub fn try_new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptySetId);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Get the set ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for SetId {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::try_new(s)
    }
}

impl From<SetId> for String {
    fn from(id: SetId) -> Self {
        id.0
    }
}

impl FromStr for SetId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_new(s)
    }
}

/// Exchange ticker for a listed company (e.g. `005930`).
///
/// Ordered so that member lists can be canonicalized by sorting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StockCode(String);

impl StockCode {
    /// Create a `StockCode`, accepting only non-empty ASCII alphanumerics.
    pub fn try_new(code: impl Into<String>) -> Result<Self, ValidationError> {
        let code = code.into();
        let trimmed = code.trim();
        if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ValidationError::InvalidStockCode { value: code });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Get the stock code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StockCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for StockCode {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::try_new(s)
    }
}

impl From<StockCode> for String {
    fn from(code: StockCode) -> Self {
        code.0
    }
}

impl FromStr for StockCode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_code_trims_and_validates() {
        let code = StockCode::try_new(" 005930 ").unwrap();
        assert_eq!(code.as_str(), "005930");

        assert!(StockCode::try_new("").is_err());
        assert!(StockCode::try_new("005-930").is_err());
    }

    #[test]
    fn set_id_rejects_blank() {
        assert_eq!(SetId::try_new("  "), Err(ValidationError::EmptySetId));
        assert_eq!(SetId::try_new("42").unwrap().as_str(), "42");
    }

    #[test]
    fn stock_code_deserializes_with_validation() {
        let code: StockCode = serde_json::from_str("\"000660\"").unwrap();
        assert_eq!(code.as_str(), "000660");
        assert!(serde_json::from_str::<StockCode>("\"\"").is_err());
    }

    #[test]
    fn stock_codes_sort_lexicographically() {
        let mut codes = vec![
            StockCode::try_new("035420").unwrap(),
            StockCode::try_new("000660").unwrap(),
            StockCode::try_new("005930").unwrap(),
        ];
        codes.sort();
        let sorted: Vec<&str> = codes.iter().map(StockCode::as_str).collect();
        assert_eq!(sorted, ["000660", "005930", "035420"]);
    }
}
