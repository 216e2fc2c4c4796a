//! Response schemas for the comparison REST API.
//!
//! Payloads are deserialized into these DTOs and narrowed into domain types
//! before they reach the query cache. Anything that fails narrowing becomes
//! [`Error::InvalidPayload`] instead of a partially filled value.
//!
//! Example detail payload:
//! ```json
//! {"data":{"id":7,"name":"Semis","companies":[{"stockCode":"005930","companyName":"Samsung Electronics","per":13.2}]}}
//! ```

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{
    CompareCompany, ComparisonSet, ComparisonSetSummary, FinancialRatios, PriceBar, SetId,
    StockCode,
};
use crate::error::{Error, Result};

/// Response body as sent by the backend.
///
/// Variant order matters: a wrapped payload is tried first, then an error
/// body, then the bare payload.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Envelope<T> {
    /// `{"data": ...}`
    Wrapped { data: T },

    /// An error body and nothing else.
    Failure(ErrorBody),

    /// Payload without an envelope.
    Bare(T),
}

/// `{"error": "..."}` or `{"message": "..."}`, optionally with a code.
///
/// Any other field means the object is a payload that happens to carry a
/// message, not a failure.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ErrorBody {
    #[serde(alias = "message")]
    pub error: String,
    pub code: Option<serde_json::Value>,
    pub status: Option<serde_json::Value>,
}

impl<T> Envelope<T> {
    pub fn into_result(self) -> Result<T> {
        match self {
            Self::Wrapped { data } | Self::Bare(data) => Ok(data),
            Self::Failure(body) => Err(Error::Rejected {
                status: 200,
                message: body.error,
            }),
        }
    }
}

/// Identifier sent either as a JSON number or a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Number(u64),
    Text(String),
}

impl RawId {
    fn into_set_id(self) -> Result<SetId> {
        let raw = match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s,
        };
        SetId::try_new(raw).map_err(|e| Error::InvalidPayload(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetSummaryDto {
    pub id: RawId,
    pub name: String,
    #[serde(default, alias = "companyCount")]
    pub member_count: Option<usize>,
    #[serde(default, alias = "companies")]
    pub members: Option<Vec<serde_json::Value>>,
}

impl TryFrom<SetSummaryDto> for ComparisonSetSummary {
    type Error = Error;

    fn try_from(dto: SetSummaryDto) -> Result<Self> {
        let member_count = dto
            .member_count
            .or_else(|| dto.members.as_ref().map(Vec::len))
            .unwrap_or(0);
        Ok(Self {
            id: dto.id.into_set_id()?,
            name: dto.name,
            member_count,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyDto {
    pub stock_code: String,
    #[serde(alias = "companyName", alias = "displayName")]
    pub name: String,
    #[serde(default)]
    pub per: Option<Decimal>,
    #[serde(default)]
    pub pbr: Option<Decimal>,
    #[serde(default)]
    pub roe: Option<Decimal>,
    #[serde(default)]
    pub operating_margin: Option<Decimal>,
    #[serde(default)]
    pub debt_ratio: Option<Decimal>,
    #[serde(default)]
    pub dividend_yield: Option<Decimal>,
    #[serde(default)]
    pub market_cap: Option<Decimal>,
}

impl TryFrom<CompanyDto> for CompareCompany {
    type Error = Error;

    fn try_from(dto: CompanyDto) -> Result<Self> {
        let stock_code =
            StockCode::try_new(dto.stock_code).map_err(|e| Error::InvalidPayload(e.to_string()))?;
        Ok(CompareCompany::new(stock_code, dto.name).with_ratios(FinancialRatios {
            per: dto.per,
            pbr: dto.pbr,
            roe: dto.roe,
            operating_margin: dto.operating_margin,
            debt_ratio: dto.debt_ratio,
            dividend_yield: dto.dividend_yield,
            market_cap: dto.market_cap,
        }))
    }
}

#[derive(Debug, Deserialize)]
pub struct SetDetailDto {
    pub id: RawId,
    pub name: String,
    #[serde(default, alias = "companies")]
    pub members: Vec<CompanyDto>,
}

impl TryFrom<SetDetailDto> for ComparisonSet {
    type Error = Error;

    fn try_from(dto: SetDetailDto) -> Result<Self> {
        let mut set = ComparisonSet::new(dto.id.into_set_id()?, dto.name);
        for member in dto.members {
            let company = CompareCompany::try_from(member)?;
            if !set.contains(&company.stock_code) {
                set.members.push(company);
            }
        }
        Ok(set)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatedDto {
    pub id: RawId,
}

impl CreatedDto {
    pub fn into_set_id(self) -> Result<SetId> {
        self.id.into_set_id()
    }
}

/// Bar timestamp as epoch milliseconds or an RFC 3339 / `YYYY-MM-DD` string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Millis(i64),
    Text(String),
}

impl RawTimestamp {
    fn into_datetime(self) -> Result<DateTime<Utc>> {
        match self {
            Self::Millis(ms) => Utc
                .timestamp_millis_opt(ms)
                .single()
                .ok_or_else(|| Error::InvalidPayload(format!("timestamp out of range: {ms}"))),
            Self::Text(text) => {
                if let Ok(dt) = DateTime::parse_from_rfc3339(&text) {
                    return Ok(dt.with_timezone(&Utc));
                }
                chrono::NaiveDate::parse_from_str(&text, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .map(|dt| Utc.from_utc_datetime(&dt))
                    .ok_or_else(|| Error::InvalidPayload(format!("unparseable timestamp '{text}'")))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PriceBarDto {
    #[serde(alias = "date", alias = "time")]
    pub timestamp: RawTimestamp,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    #[serde(default)]
    pub volume: Decimal,
}

impl TryFrom<PriceBarDto> for PriceBar {
    type Error = Error;

    fn try_from(dto: PriceBarDto) -> Result<Self> {
        let bar = PriceBar {
            timestamp: dto.timestamp.into_datetime()?,
            open: dto.open,
            high: dto.high,
            low: dto.low,
            close: dto.close,
            volume: dto.volume.trunc().to_u64().ok_or_else(|| {
                Error::InvalidPayload(format!("invalid volume {}", dto.volume))
            })?,
        };
        if bar.low > bar.high {
            return Err(Error::InvalidPayload(format!(
                "bar at {} has low {} above high {}",
                bar.timestamp, bar.low, bar.high
            )));
        }
        Ok(bar)
    }
}

#[derive(Debug, Serialize)]
pub struct NameRequest<'a> {
    pub name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRequest<'a> {
    pub stock_code: &'a str,
}

/// Narrow every element, failing on the first invalid one.
pub fn narrow_all<D, T>(items: Vec<D>) -> Result<Vec<T>>
where
    T: TryFrom<D, Error = Error>,
{
    items.into_iter().map(T::try_from).collect()
}

/// Narrow price bars into ascending timestamp order, whatever order the
/// backend sent them in.
pub fn narrow_bars(items: Vec<PriceBarDto>) -> Result<Vec<PriceBar>> {
    let mut bars: Vec<PriceBar> = narrow_all(items)?;
    bars.sort_by_key(|bar| bar.timestamp);
    Ok(bars)
}
