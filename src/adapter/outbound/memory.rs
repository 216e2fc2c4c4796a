//! Process-local comparison store.
//!
//! Stands in for the backend in `--mock` mode and in tests. Behaves like
//! the REST service: unknown sets and companies are not found, duplicate
//! members and members past the limit are rejected, and price history is
//! synthesized deterministically per stock code and interval.

use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use crate::domain::comparison::DEFAULT_MAX_MEMBERS;
use crate::domain::{
    CompareCompany, ComparisonSet, ComparisonSetSummary, FinancialRatios, Interval, PriceBar,
    SetId, StockCode,
};
use crate::error::{Error, Result};
use crate::port::ComparisonStore;

#[derive(Default)]
struct State {
    sets: BTreeMap<SetId, ComparisonSet>,
    catalog: HashMap<StockCode, CompareCompany>,
    next_id: u64,
}

/// In-memory [`ComparisonStore`].
#[derive(Default)]
pub struct InMemoryComparisonStore {
    state: Mutex<State>,
    anchor: Option<DateTime<Utc>>,
    member_limit: Option<usize>,
}

impl InMemoryComparisonStore {
    /// Create an empty store with no known companies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with a small KOSPI catalog and one semiconductor set.
    #[must_use]
    pub fn demo() -> Self {
        let store = Self::new().with_member_limit(DEFAULT_MAX_MEMBERS);
        for (code, name, per, pbr, roe) in [
            ("005930", "Samsung Electronics", dec!(13.2), dec!(1.1), dec!(8.6)),
            ("000660", "SK hynix", dec!(9.8), dec!(1.9), dec!(21.4)),
            ("035420", "NAVER", dec!(21.5), dec!(1.2), dec!(6.1)),
            ("035720", "Kakao", dec!(48.3), dec!(1.6), dec!(2.3)),
            ("051910", "LG Chem", dec!(35.7), dec!(0.9), dec!(2.8)),
            ("005380", "Hyundai Motor", dec!(4.9), dec!(0.6), dec!(13.5)),
            ("068270", "Celltrion", dec!(62.1), dec!(3.2), dec!(5.2)),
        ] {
            store.insert_company(CompareCompany::new(stock(code), name).with_ratios(
                FinancialRatios {
                    per: Some(per),
                    pbr: Some(pbr),
                    roe: Some(roe),
                    ..FinancialRatios::default()
                },
            ));
        }

        let mut state = store.state.lock();
        let id = next_set_id(&mut state);
        let mut set = ComparisonSet::new(id.clone(), "Semiconductors");
        for code in ["005930", "000660"] {
            if let Some(company) = state.catalog.get(&stock(code)).cloned() {
                set.members.push(company);
            }
        }
        state.sets.insert(id, set);
        drop(state);
        store
    }

    /// Pin the timestamp of the most recent synthesized bar.
    #[must_use]
    pub fn with_anchor(mut self, anchor: DateTime<Utc>) -> Self {
        self.anchor = Some(anchor);
        self
    }

    /// Reject additions that would grow a set past `limit` members.
    #[must_use]
    pub fn with_member_limit(mut self, limit: usize) -> Self {
        self.member_limit = Some(limit);
        self
    }

    /// Register a company that sets may reference.
    pub fn insert_company(&self, company: CompareCompany) {
        self.state
            .lock()
            .catalog
            .insert(company.stock_code.clone(), company);
    }

    /// Number of sets currently stored.
    #[must_use]
    pub fn set_count(&self) -> usize {
        self.state.lock().sets.len()
    }

    fn synthesize_bars(&self, stock_code: &StockCode, interval: Interval) -> Vec<PriceBar> {
        let (count, step) = match interval {
            Interval::Day => (126, Duration::days(1)),
            Interval::Week => (156, Duration::weeks(1)),
            Interval::Month => (60, Duration::days(30)),
        };
        let anchor = self.anchor.unwrap_or_else(|| {
            Utc.timestamp_opt(Utc::now().timestamp() / 86_400 * 86_400, 0)
                .single()
                .unwrap_or_else(Utc::now)
        });

        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        stock_code.hash(&mut hasher);
        interval.hash(&mut hasher);
        let mut rng = StdRng::seed_from_u64(hasher.finish());

        let mut close = Decimal::from(rng.gen_range(20_000u32..200_000));
        let mut bars = Vec::with_capacity(count);
        for i in 0..count {
            let open = close;
            let drift = Decimal::from(rng.gen_range(-300i32..=300)) / dec!(10000);
            close = (open * (Decimal::ONE + drift)).round_dp(0);
            let wick = Decimal::from(rng.gen_range(0u32..=150)) / dec!(10000);
            let high = (open.max(close) * (Decimal::ONE + wick)).round_dp(0);
            let low = (open.min(close) * (Decimal::ONE - wick)).round_dp(0);
            let offset = i32::try_from(count - 1 - i).unwrap_or(i32::MAX);
            bars.push(PriceBar {
                timestamp: anchor - step * offset,
                open,
                high,
                low,
                close,
                volume: rng.gen_range(100_000..5_000_000),
            });
        }
        bars
    }
}

fn stock(code: &str) -> StockCode {
    StockCode::try_new(code).unwrap_or_else(|_| unreachable!("seed codes are alphanumeric"))
}

fn next_set_id(state: &mut State) -> SetId {
    state.next_id += 1;
    SetId::try_new(state.next_id.to_string())
        .unwrap_or_else(|_| unreachable!("numeric ids are never blank"))
}

fn set_not_found(id: &SetId) -> Error {
    Error::not_found(format!("comparison set {id}"))
}

#[async_trait]
impl ComparisonStore for InMemoryComparisonStore {
    async fn list_sets(&self) -> Result<Vec<ComparisonSetSummary>> {
        Ok(self.state.lock().sets.values().map(ComparisonSet::summary).collect())
    }

    async fn get_set(&self, id: &SetId) -> Result<ComparisonSet> {
        self.state
            .lock()
            .sets
            .get(id)
            .cloned()
            .ok_or_else(|| set_not_found(id))
    }

    async fn create_set(&self, name: &str) -> Result<SetId> {
        let mut state = self.state.lock();
        let id = next_set_id(&mut state);
        state
            .sets
            .insert(id.clone(), ComparisonSet::new(id.clone(), name));
        debug!(set_id = %id, name, "Created comparison set");
        Ok(id)
    }

    async fn rename_set(&self, id: &SetId, name: &str) -> Result<()> {
        let mut state = self.state.lock();
        let set = state.sets.get_mut(id).ok_or_else(|| set_not_found(id))?;
        set.name = name.to_string();
        Ok(())
    }

    async fn add_member(&self, id: &SetId, stock_code: &StockCode) -> Result<()> {
        let mut state = self.state.lock();
        let company = state
            .catalog
            .get(stock_code)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("company {stock_code}")))?;
        let set = state.sets.get_mut(id).ok_or_else(|| set_not_found(id))?;
        if set.contains(stock_code) {
            return Err(Error::Rejected {
                status: 409,
                message: format!("{stock_code} is already in the comparison set"),
            });
        }
        if self.member_limit.is_some_and(|limit| set.len() >= limit) {
            return Err(Error::Rejected {
                status: 422,
                message: format!("comparison set {id} is full"),
            });
        }
        set.members.push(company);
        Ok(())
    }

    async fn remove_member(&self, id: &SetId, stock_code: &StockCode) -> Result<()> {
        let mut state = self.state.lock();
        let set = state.sets.get_mut(id).ok_or_else(|| set_not_found(id))?;
        let before = set.members.len();
        set.members.retain(|m| &m.stock_code != stock_code);
        if set.members.len() == before {
            return Err(Error::not_found(format!("{stock_code} in comparison set {id}")));
        }
        Ok(())
    }

    async fn delete_set(&self, id: &SetId) -> Result<()> {
        self.state
            .lock()
            .sets
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| set_not_found(id))
    }

    async fn get_price_history(
        &self,
        stock_code: &StockCode,
        interval: Interval,
    ) -> Result<Vec<PriceBar>> {
        if !self.state.lock().catalog.contains_key(stock_code) {
            return Err(Error::not_found(format!("company {stock_code}")));
        }
        Ok(self.synthesize_bars(stock_code, interval))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
