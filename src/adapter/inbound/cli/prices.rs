//! Handlers for `prices` and `compare`.

use chrono::Duration;
use rust_decimal::Decimal;
use serde_json::json;
use tabled::{Table, Tabled};

use super::command::{CompareArgs, PricesArgs};
use super::output;
use crate::domain::{PriceBar, StockCode, TimeRange};
use crate::error::Result;
use crate::infrastructure::bootstrap::Services;

/// Bars shown by `prices` in table mode.
const RECENT_BARS: usize = 10;

#[derive(Tabled)]
struct BarRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Open")]
    open: Decimal,
    #[tabled(rename = "High")]
    high: Decimal,
    #[tabled(rename = "Low")]
    low: Decimal,
    #[tabled(rename = "Close")]
    close: Decimal,
    #[tabled(rename = "Volume")]
    volume: u64,
}

#[derive(Tabled)]
struct PerformanceRow {
    #[tabled(rename = "Code")]
    code: String,
    #[tabled(rename = "First")]
    first: String,
    #[tabled(rename = "Last")]
    last: String,
    #[tabled(rename = "Change")]
    change: String,
    #[tabled(rename = "Bars")]
    bars: usize,
}

/// Performance of one series over the selected window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Performance {
    pub first_close: Decimal,
    pub last_close: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    /// Percent change from first to last close, two decimals.
    pub change_pct: Decimal,
    pub bars: usize,
}

fn window(range: TimeRange) -> Duration {
    let days = match range {
        TimeRange::OneMonth => 30,
        TimeRange::ThreeMonths => 91,
        TimeRange::SixMonths => 182,
        TimeRange::OneYear => 365,
        TimeRange::ThreeYears => 3 * 365,
        TimeRange::FiveYears => 5 * 365,
    };
    Duration::days(days)
}

/// Bars within `range` of the most recent bar.
#[must_use]
pub fn in_range(bars: &[PriceBar], range: TimeRange) -> &[PriceBar] {
    let Some(last) = bars.last() else {
        return bars;
    };
    let cutoff = last.timestamp - window(range);
    let start = bars.partition_point(|bar| bar.timestamp < cutoff);
    &bars[start..]
}

/// Summarize a chronologically ordered series. `None` when empty.
#[must_use]
pub fn performance(bars: &[PriceBar]) -> Option<Performance> {
    let first = bars.first()?;
    let last = bars.last()?;
    let high = bars.iter().map(|b| b.high).max()?;
    let low = bars.iter().map(|b| b.low).min()?;
    let change_pct = if first.close.is_zero() {
        Decimal::ZERO
    } else {
        ((last.close - first.close) / first.close * Decimal::ONE_HUNDRED).round_dp(2)
    };
    Some(Performance {
        first_close: first.close,
        last_close: last.close,
        high,
        low,
        change_pct,
        bars: bars.len(),
    })
}

fn change_cell(change: Decimal) -> String {
    output::signed(format!("{change:+}%"), change.is_sign_negative())
}

/// Execute `prices`.
pub async fn execute_prices(args: PricesArgs, services: &Services) -> Result<()> {
    let bars = services
        .queries
        .price_history(Some(&args.stock_code), args.range)
        .await
        .into_result()?;
    let bars = in_range(&bars, args.range);
    let summary = performance(bars);

    if output::is_json() {
        output::json_record(
            "prices",
            json!({
                "stock_code": args.stock_code,
                "range": args.range,
                "interval": args.range.interval().as_str(),
                "change_pct": summary.as_ref().map(|s| s.change_pct),
                "bars": bars,
            }),
        );
        return Ok(());
    }

    output::section(&format!("{} · {}", args.stock_code, args.range.label()));
    output::field("Interval", args.range.interval().as_str());
    let Some(summary) = summary else {
        output::note("(no price data)");
        return Ok(());
    };
    output::field("Bars", summary.bars);
    output::field("Close", format!("{} → {}", summary.first_close, summary.last_close));
    output::field("Range", format!("{} – {}", summary.low, summary.high));
    output::field("Change", change_cell(summary.change_pct));

    let rows: Vec<BarRow> = bars
        .iter()
        .rev()
        .take(RECENT_BARS)
        .map(|bar| BarRow {
            date: bar.timestamp.format("%Y-%m-%d").to_string(),
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
        })
        .collect();
    output::lines(&Table::new(rows).to_string());
    Ok(())
}

/// Execute `compare`.
///
/// Reads the whole set as one value; when that fails, falls back to
/// per-member reads so the members that load are still shown.
pub async fn execute_compare(args: CompareArgs, services: &Services) -> Result<()> {
    let combined = services
        .queries
        .set_prices(Some(&args.id), args.range)
        .await;

    let series: Vec<(StockCode, Result<Vec<PriceBar>>)> = match combined.into_result() {
        Ok(series) => series.into_iter().map(|(code, bars)| (code, Ok(bars))).collect(),
        Err(err) if err.is_not_found() => return Err(err),
        Err(err) => {
            output::warning(&format!("Combined price fetch failed: {err}"));
            services
                .queries
                .member_price_histories(Some(&args.id), args.range)
                .await
                .into_result()?
                .into_iter()
                .map(|(code, result)| (code, result.into_result()))
                .collect()
        }
    };

    let summaries: Vec<(StockCode, Result<Option<Performance>>)> = series
        .into_iter()
        .map(|(code, bars)| {
            let summary = bars.map(|bars| performance(in_range(&bars, args.range)));
            (code, summary)
        })
        .collect();

    if output::is_json() {
        let members: Vec<_> = summaries
            .iter()
            .map(|(code, summary)| match summary {
                Ok(Some(s)) => json!({
                    "stock_code": code,
                    "first_close": s.first_close,
                    "last_close": s.last_close,
                    "change_pct": s.change_pct,
                    "bars": s.bars,
                }),
                Ok(None) => json!({ "stock_code": code, "bars": 0 }),
                Err(err) => json!({ "stock_code": code, "error": err.to_string() }),
            })
            .collect();
        output::json_record(
            "compare",
            json!({ "set_id": args.id, "range": args.range, "members": members }),
        );
        return Ok(());
    }

    output::section(&format!("Set {} · {}", args.id, args.range.label()));
    if summaries.is_empty() {
        output::note("(no companies in this set)");
        return Ok(());
    }

    let mut rows = Vec::with_capacity(summaries.len());
    for (code, summary) in summaries {
        match summary {
            Ok(Some(s)) => rows.push(PerformanceRow {
                code: code.to_string(),
                first: s.first_close.to_string(),
                last: s.last_close.to_string(),
                change: change_cell(s.change_pct),
                bars: s.bars,
            }),
            Ok(None) => rows.push(PerformanceRow {
                code: code.to_string(),
                first: "-".into(),
                last: "-".into(),
                change: output::muted("n/a"),
                bars: 0,
            }),
            Err(err) => output::warning(&format!("{code}: {err}")),
        }
    }
    output::lines(&Table::new(rows).to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn bar(day: u32, close: Decimal) -> PriceBar {
        PriceBar {
            timestamp: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            open: close,
            high: close + dec!(1),
            low: close - dec!(1),
            close,
            volume: 1_000,
        }
    }

    #[test]
    fn performance_uses_first_and_last_close() {
        let bars = [bar(1, dec!(100)), bar(2, dec!(90)), bar(3, dec!(110))];
        let summary = performance(&bars).unwrap();
        assert_eq!(summary.change_pct, dec!(10.00));
        assert_eq!(summary.high, dec!(111));
        assert_eq!(summary.low, dec!(89));
        assert_eq!(summary.bars, 3);
    }

    #[test]
    fn empty_series_has_no_performance() {
        assert!(performance(&[]).is_none());
    }

    #[test]
    fn range_trims_older_bars() {
        let mut bars: Vec<PriceBar> = (1..=31).map(|d| bar(d, dec!(10))).collect();
        bars.insert(
            0,
            PriceBar {
                timestamp: Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap(),
                ..bar(1, dec!(10))
            },
        );
        assert_eq!(in_range(&bars, TimeRange::OneMonth).len(), 31);
        assert_eq!(in_range(&bars, TimeRange::OneYear).len(), 32);
    }
}
