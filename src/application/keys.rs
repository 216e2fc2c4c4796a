//! Cache keys and payloads for comparison-set queries.

use std::fmt;

use crate::domain::{ComparisonSet, ComparisonSetSummary, Interval, PriceBar, SetId, StockCode};

use super::cache::CacheKey;

/// Stock codes in canonical order: sorted ascending, duplicates removed.
///
/// Two member lists holding the same companies in any order produce equal
/// values, so they address the same cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberCodes(Vec<StockCode>);

impl MemberCodes {
    pub fn new(codes: impl IntoIterator<Item = StockCode>) -> Self {
        let mut codes: Vec<StockCode> = codes.into_iter().collect();
        codes.sort();
        codes.dedup();
        Self(codes)
    }
}

impl fmt::Display for MemberCodes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, code) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{code}")?;
        }
        Ok(())
    }
}

/// Identity of a fetchable resource plus its query parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    /// All comparison sets of the signed-in user.
    SetList,
    /// One set with its members.
    SetDetail(SetId),
    /// Bars for one company.
    PriceHistory {
        stock_code: StockCode,
        interval: Interval,
    },
    /// Bars for every member of a set, keyed by the canonical member list.
    SetPrices {
        members: MemberCodes,
        interval: Interval,
    },
}

impl QueryKey {
    #[must_use]
    pub fn set_detail(id: &SetId) -> Self {
        Self::SetDetail(id.clone())
    }

    #[must_use]
    pub fn price_history(stock_code: &StockCode, interval: Interval) -> Self {
        Self::PriceHistory {
            stock_code: stock_code.clone(),
            interval,
        }
    }

    /// Canonicalizing constructor: member order does not affect the key.
    pub fn set_prices(codes: impl IntoIterator<Item = StockCode>, interval: Interval) -> Self {
        Self::SetPrices {
            members: MemberCodes::new(codes),
            interval,
        }
    }

    /// Whether the key holds data owned by the signed-in user.
    #[must_use]
    pub fn is_user_owned(&self) -> bool {
        !matches!(self, Self::PriceHistory { .. })
    }
}

impl CacheKey for QueryKey {
    fn resource(&self) -> &'static str {
        match self {
            Self::SetList => "set_list",
            Self::SetDetail(_) => "set_detail",
            Self::PriceHistory { .. } => "price_history",
            Self::SetPrices { .. } => "set_prices",
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetList => f.write_str("set_list"),
            Self::SetDetail(id) => write!(f, "set_detail:{id}"),
            Self::PriceHistory {
                stock_code,
                interval,
            } => write!(f, "price_history:{stock_code}:{interval}"),
            Self::SetPrices { members, interval } => {
                write!(f, "set_prices:[{members}]:{interval}")
            }
        }
    }
}

/// Payload stored under a [`QueryKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryData {
    SetList(Vec<ComparisonSetSummary>),
    SetDetail(ComparisonSet),
    PriceHistory(Vec<PriceBar>),
    SetPrices(Vec<(StockCode, Vec<PriceBar>)>),
}

impl QueryData {
    #[must_use]
    pub fn into_set_list(self) -> Option<Vec<ComparisonSetSummary>> {
        match self {
            Self::SetList(sets) => Some(sets),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_set_detail(self) -> Option<ComparisonSet> {
        match self {
            Self::SetDetail(set) => Some(set),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_price_history(self) -> Option<Vec<PriceBar>> {
        match self {
            Self::PriceHistory(bars) => Some(bars),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_set_prices(self) -> Option<Vec<(StockCode, Vec<PriceBar>)>> {
        match self {
            Self::SetPrices(series) => Some(series),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(list: &[&str]) -> Vec<StockCode> {
        list.iter().map(|c| StockCode::try_new(*c).unwrap()).collect()
    }

    #[test]
    fn permuted_members_produce_identical_keys() {
        let a = QueryKey::set_prices(codes(&["005930", "000660", "035420"]), Interval::Day);
        let b = QueryKey::set_prices(codes(&["035420", "005930", "000660"]), Interval::Day);
        let c = QueryKey::set_prices(codes(&["000660", "035420", "005930", "000660"]), Interval::Day);
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a.to_string(), "set_prices:[000660,005930,035420]:1d");
    }

    #[test]
    fn interval_distinguishes_keys() {
        let code = StockCode::try_new("005930").unwrap();
        assert_ne!(
            QueryKey::price_history(&code, Interval::Day),
            QueryKey::price_history(&code, Interval::Week)
        );
    }

    #[test]
    fn resources_match_config_names() {
        let id = SetId::try_new("1").unwrap();
        assert_eq!(QueryKey::SetList.resource(), "set_list");
        assert_eq!(QueryKey::set_detail(&id).resource(), "set_detail");
        assert!(!QueryKey::price_history(&codes(&["005930"])[0], Interval::Day).is_user_owned());
        assert!(QueryKey::set_detail(&id).is_user_owned());
    }
}
