//! Comparison sets and the companies they hold.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::ValidationError;
use super::id::{SetId, StockCode};

/// Default maximum number of companies in one comparison set.
pub const DEFAULT_MAX_MEMBERS: usize = 5;

/// Fixed set of financial ratios shown for each compared company.
///
/// Every field is optional because the backend omits ratios it cannot
/// compute (e.g. PER for loss-making companies).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialRatios {
    /// Price to earnings.
    pub per: Option<Decimal>,
    /// Price to book value.
    pub pbr: Option<Decimal>,
    /// Return on equity (%).
    pub roe: Option<Decimal>,
    /// Operating margin (%).
    pub operating_margin: Option<Decimal>,
    /// Debt to equity (%).
    pub debt_ratio: Option<Decimal>,
    /// Dividend yield (%).
    pub dividend_yield: Option<Decimal>,
    /// Market capitalization in the listing currency.
    pub market_cap: Option<Decimal>,
}

/// Read-only projection of a company as a comparison-set member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareCompany {
    pub stock_code: StockCode,
    pub name: String,
    pub ratios: FinancialRatios,
}

impl CompareCompany {
    #[must_use]
    pub fn new(stock_code: StockCode, name: impl Into<String>) -> Self {
        Self {
            stock_code,
            name: name.into(),
            ratios: FinancialRatios::default(),
        }
    }

    #[must_use]
    pub fn with_ratios(mut self, ratios: FinancialRatios) -> Self {
        self.ratios = ratios;
        self
    }
}

/// A user-defined named collection of companies being compared.
///
/// Members form an unordered set: no stock code appears twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonSet {
    pub id: SetId,
    pub name: String,
    pub members: Vec<CompareCompany>,
}

impl ComparisonSet {
    #[must_use]
    pub fn new(id: SetId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            members: Vec::new(),
        }
    }

    /// Number of companies in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    #[must_use]
    pub fn contains(&self, stock_code: &StockCode) -> bool {
        self.members.iter().any(|m| &m.stock_code == stock_code)
    }

    /// Member stock codes sorted ascending, duplicates removed.
    #[must_use]
    pub fn sorted_codes(&self) -> Vec<StockCode> {
        let mut codes: Vec<StockCode> = self.members.iter().map(|m| m.stock_code.clone()).collect();
        codes.sort();
        codes.dedup();
        codes
    }

    #[must_use]
    pub fn summary(&self) -> ComparisonSetSummary {
        ComparisonSetSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            member_count: self.members.len(),
        }
    }
}

/// List-view row for a comparison set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonSetSummary {
    pub id: SetId,
    pub name: String,
    pub member_count: usize,
}

/// Membership rules enforced locally before any remote mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MembershipPolicy {
    pub max_members: usize,
}

impl MembershipPolicy {
    #[must_use]
    pub const fn new(max_members: usize) -> Self {
        Self { max_members }
    }

    /// Check that `stock_code` may be added to `set`.
    pub fn check_add(&self, set: &ComparisonSet, stock_code: &StockCode) -> Result<(), ValidationError> {
        if set.contains(stock_code) {
            return Err(ValidationError::DuplicateMember {
                stock_code: stock_code.clone(),
            });
        }
        if set.len() >= self.max_members {
            return Err(ValidationError::MemberLimit {
                current: set.len(),
                max: self.max_members,
            });
        }
        Ok(())
    }

    /// Check that `stock_code` may be removed from `set`.
    ///
    /// Removing the last member is allowed; the set itself stays.
    pub fn check_remove(
        &self,
        set: &ComparisonSet,
        stock_code: &StockCode,
    ) -> Result<(), ValidationError> {
        if !set.contains(stock_code) {
            return Err(ValidationError::NotAMember {
                stock_code: stock_code.clone(),
            });
        }
        Ok(())
    }
}

impl Default for MembershipPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MEMBERS)
    }
}

/// Trim a proposed set name, rejecting empty or whitespace-only input.
pub fn validate_set_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> StockCode {
        StockCode::try_new(s).unwrap()
    }

    fn set_with(codes: &[&str]) -> ComparisonSet {
        let mut set = ComparisonSet::new(SetId::try_new("1").unwrap(), "Semis");
        set.members = codes
            .iter()
            .map(|c| CompareCompany::new(code(c), format!("Company {c}")))
            .collect();
        set
    }

    #[test]
    fn rejects_blank_names() {
        assert_eq!(validate_set_name(""), Err(ValidationError::EmptyName));
        assert_eq!(validate_set_name(" \t\n"), Err(ValidationError::EmptyName));
        assert_eq!(validate_set_name("  Memory  ").unwrap(), "Memory");
    }

    #[test]
    fn add_respects_cap() {
        let policy = MembershipPolicy::new(5);
        let full = set_with(&["000001", "000002", "000003", "000004", "000005"]);

        let result = policy.check_add(&full, &code("000006"));
        assert_eq!(
            result,
            Err(ValidationError::MemberLimit { current: 5, max: 5 })
        );

        let partial = set_with(&["000001"]);
        assert!(policy.check_add(&partial, &code("000006")).is_ok());
    }

    #[test]
    fn add_rejects_duplicates() {
        let policy = MembershipPolicy::default();
        let set = set_with(&["005930"]);
        assert!(matches!(
            policy.check_add(&set, &code("005930")),
            Err(ValidationError::DuplicateMember { .. })
        ));
    }

    #[test]
    fn removing_last_member_is_allowed() {
        let policy = MembershipPolicy::default();
        let set = set_with(&["005930"]);
        assert!(policy.check_remove(&set, &code("005930")).is_ok());
        assert!(policy.check_remove(&set, &code("000660")).is_err());
    }

    #[test]
    fn sorted_codes_are_canonical() {
        let a = set_with(&["035420", "000660", "005930"]);
        let b = set_with(&["005930", "035420", "000660"]);
        assert_eq!(a.sorted_codes(), b.sorted_codes());
    }
}
