//! Price history primitives.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::ValidationError;

/// Bar width requested from the price-history endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1d")]
    Day,
    #[serde(rename = "1wk")]
    Week,
    #[serde(rename = "1mo")]
    Month,
}

impl Interval {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Day => "1d",
            Self::Week => "1wk",
            Self::Month => "1mo",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chart time range selected in a view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "1M")]
    OneMonth,
    #[serde(rename = "3M")]
    ThreeMonths,
    #[default]
    #[serde(rename = "6M")]
    SixMonths,
    #[serde(rename = "1Y")]
    OneYear,
    #[serde(rename = "3Y")]
    ThreeYears,
    #[serde(rename = "5Y")]
    FiveYears,
}

impl TimeRange {
    pub const ALL: [Self; 6] = [
        Self::OneMonth,
        Self::ThreeMonths,
        Self::SixMonths,
        Self::OneYear,
        Self::ThreeYears,
        Self::FiveYears,
    ];

    /// Bar interval used to chart this range.
    #[must_use]
    pub const fn interval(self) -> Interval {
        match self {
            Self::OneMonth | Self::ThreeMonths | Self::SixMonths => Interval::Day,
            Self::OneYear | Self::ThreeYears => Interval::Week,
            Self::FiveYears => Interval::Month,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::OneMonth => "1M",
            Self::ThreeMonths => "3M",
            Self::SixMonths => "6M",
            Self::OneYear => "1Y",
            Self::ThreeYears => "3Y",
            Self::FiveYears => "5Y",
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TimeRange {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|r| r.label() == upper)
            .ok_or_else(|| ValidationError::InvalidTimeRange {
                value: s.to_string(),
            })
    }
}

/// One OHLCV bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
}

impl PriceBar {
    /// Whether open and close lie within `[low, high]`.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.low <= self.high
            && (self.low..=self.high).contains(&self.open)
            && (self.low..=self.high).contains(&self.close)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn six_months_uses_daily_bars() {
        assert_eq!(TimeRange::SixMonths.interval(), Interval::Day);
        assert_eq!(TimeRange::OneYear.interval(), Interval::Week);
        assert_eq!(TimeRange::FiveYears.interval(), Interval::Month);
    }

    #[test]
    fn parses_range_labels() {
        assert_eq!("6m".parse::<TimeRange>().unwrap(), TimeRange::SixMonths);
        assert_eq!("1Y".parse::<TimeRange>().unwrap(), TimeRange::OneYear);
        assert!("2W".parse::<TimeRange>().is_err());
    }

    #[test]
    fn bar_consistency() {
        let bar = PriceBar {
            timestamp: Utc::now(),
            open: dec!(100),
            high: dec!(110),
            low: dec!(95),
            close: dec!(105),
            volume: 1_000,
        };
        assert!(bar.is_consistent());

        let inverted = PriceBar {
            high: dec!(90),
            ..bar
        };
        assert!(!inverted.is_consistent());
    }
}
