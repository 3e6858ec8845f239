//! Data adapter: bar and trade models, interval parsing, resampling of
//! trade prints into fixed-interval bars, and local CSV sources.
//!
//! Everything here feeds the detectors a clean series: bars strictly ordered
//! by timestamp, deduplicated, with `low <= open,close <= high`.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{check_prices, PatternError, PriceField, PriceSeries, OHLCV};

mod local;
mod resample;

pub use local::CsvSource;
pub use resample::{resample, resample_in};

/// Exchange calendar used for bucketing and naive timestamps unless a
/// request names another zone
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::America::New_York;

/// 1970-01-05, the first Monday after the Unix epoch, in seconds
const FIRST_MONDAY: i64 = 4 * 86_400;

// ============================================================
// ERRORS
// ============================================================

#[derive(Debug, Error)]
pub enum DataError {
    #[error("Data source '{0}' is not currently supported")]
    UnsupportedSource(String),

    #[error("Invalid interval '{input}': {message}")]
    InvalidInterval { input: String, message: &'static str },

    #[error("Unparseable timestamp '{value}' at row {row}")]
    Timestamp { row: usize, value: String },

    #[error("Unparseable number '{value}' in column '{column}' at row {row}")]
    Number { row: usize, column: String, value: String },

    #[error("Unrecognised CSV layout, columns: {0}")]
    UnknownLayout(String),

    #[error("Request is missing {0}")]
    MissingArgument(&'static str),

    #[error("Trade prints need an interval to become bars")]
    IntervalRequired,

    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error("CSV error")]
    Csv(#[from] csv::Error),

    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

// ============================================================
// INTERVAL
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntervalUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
}

impl IntervalUnit {
    fn seconds(self) -> i64 {
        match self {
            IntervalUnit::Second => 1,
            IntervalUnit::Minute => 60,
            IntervalUnit::Hour => 3_600,
            IntervalUnit::Day => 86_400,
            IntervalUnit::Week => 604_800,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            IntervalUnit::Second => "s",
            IntervalUnit::Minute => "min",
            IntervalUnit::Hour => "h",
            IntervalUnit::Day => "d",
            IntervalUnit::Week => "wk",
        }
    }
}

/// Fixed bar width such as `15min` or `1d`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub amount: u32,
    pub unit: IntervalUnit,
}

impl Interval {
    pub fn new(amount: u32, unit: IntervalUnit) -> Result<Self, DataError> {
        if amount == 0 {
            return Err(DataError::InvalidInterval {
                input: format!("0{}", unit.suffix()),
                message: "amount must be > 0",
            });
        }
        Ok(Self { amount, unit })
    }

    pub fn seconds(&self) -> i64 {
        i64::from(self.amount) * self.unit.seconds()
    }

    /// Start of the bucket containing `ts`, laid out on the wall clock of `tz`.
    ///
    /// Buckets are aligned to local midnight of 1970-01-01; weekly buckets
    /// start on a local Monday. A bucket start that falls in a DST gap moves
    /// forward by the gap.
    pub fn bucket_start(&self, ts: DateTime<Utc>, tz: Tz) -> Option<DateTime<Utc>> {
        let width = self.seconds();
        let anchor = match self.unit {
            IntervalUnit::Week => FIRST_MONDAY,
            _ => 0,
        };
        let local = ts.with_timezone(&tz).naive_local().and_utc().timestamp();
        let start = (local - anchor).div_euclid(width) * width + anchor;
        let naive = DateTime::from_timestamp(start, 0)?.naive_utc();

        let resolved = tz
            .from_local_datetime(&naive)
            .earliest()
            .or_else(|| tz.from_local_datetime(&(naive + TimeDelta::hours(1))).earliest())?;
        Some(resolved.with_timezone(&Utc))
    }
}

impl FromStr for Interval {
    type Err = DataError;

    /// Accepts `s`, `min`, `h`, `d` and `wk` suffixes. A bare `m` is rejected
    /// because it reads as either minutes or months.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |message| DataError::InvalidInterval { input: s.to_string(), message };
        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| invalid("missing unit"))?;
        let (digits, suffix) = trimmed.split_at(split);

        let amount = if digits.is_empty() {
            1
        } else {
            digits.parse::<u32>().map_err(|_| invalid("amount is not a number"))?
        };
        let unit = match suffix.to_ascii_lowercase().as_str() {
            "s" | "sec" => IntervalUnit::Second,
            "min" | "t" => IntervalUnit::Minute,
            "h" | "hr" => IntervalUnit::Hour,
            "d" => IntervalUnit::Day,
            "wk" | "w" => IntervalUnit::Week,
            "m" => return Err(invalid("ambiguous unit 'm', use 'min' for minutes")),
            _ => return Err(invalid("unknown unit")),
        };
        if amount == 0 {
            return Err(invalid("amount must be > 0"));
        }
        Ok(Self { amount, unit })
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.unit.suffix())
    }
}

// ============================================================
// BARS
// ============================================================

/// A single time-sliced OHLC(V) observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Present only for aggregated/resampled series
    pub volume: Option<f64>,
}

impl OHLCV for Bar {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> Option<f64> {
        self.volume
    }

    fn timestamp(&self) -> Option<i64> {
        Some(self.timestamp.timestamp_millis())
    }
}

/// Ordered bars for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarSeries {
    pub symbol: String,
    pub interval: Option<Interval>,
    bars: Vec<Bar>,
}

impl BarSeries {
    /// Validates strictly increasing timestamps and the OHLC invariant.
    pub fn new(
        symbol: impl Into<String>,
        interval: Option<Interval>,
        bars: Vec<Bar>,
    ) -> Result<Self, PatternError> {
        for (index, bar) in bars.iter().enumerate() {
            check_prices(Some(bar.open), Some(bar.high), Some(bar.low), Some(bar.close))
                .map_err(|reason| PatternError::InvalidOHLCV { index, reason })?;
            if index > 0 && bar.timestamp <= bars[index - 1].timestamp {
                return Err(PatternError::UnorderedTimestamps { index });
            }
        }
        Ok(Self { symbol: symbol.into(), interval, bars })
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn into_bars(self) -> Vec<Bar> {
        self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Bars with `start <= timestamp < end`
    pub fn between(&self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        let bars = self
            .bars
            .iter()
            .filter(|b| in_range(b.timestamp, start, end))
            .copied()
            .collect();
        Self { symbol: self.symbol.clone(), interval: self.interval, bars }
    }
}

impl PriceSeries for BarSeries {
    fn len(&self) -> usize {
        self.bars.len()
    }

    fn has_field(&self, field: PriceField) -> bool {
        PriceSeries::has_field(self.bars.as_slice(), field)
    }

    fn value(&self, field: PriceField, index: usize) -> Option<f64> {
        PriceSeries::value(self.bars.as_slice(), field, index)
    }

    fn timestamp(&self, index: usize) -> Option<i64> {
        PriceSeries::timestamp(self.bars.as_slice(), index)
    }
}

pub(crate) fn in_range(
    ts: DateTime<Utc>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> bool {
    start.map_or(true, |s| ts >= s) && end.map_or(true, |e| ts < e)
}

// ============================================================
// TRADES
// ============================================================

/// A single trade print
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub size: f64,
}

/// Raw trade prints, time-ordered. Timestamps may repeat.
///
/// Exposes only [`PriceField::Price`] and [`PriceField::Volume`]; running a
/// detector over it directly is a schema error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSeries {
    pub symbol: String,
    trades: Vec<Trade>,
}

impl TradeSeries {
    /// Stable-sorts by timestamp so prints sharing a timestamp keep arrival order
    pub fn new(symbol: impl Into<String>, mut trades: Vec<Trade>) -> Self {
        trades.sort_by_key(|t| t.timestamp);
        Self { symbol: symbol.into(), trades }
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }
}

impl PriceSeries for TradeSeries {
    fn len(&self) -> usize {
        self.trades.len()
    }

    fn has_field(&self, field: PriceField) -> bool {
        matches!(field, PriceField::Price | PriceField::Volume)
    }

    fn value(&self, field: PriceField, index: usize) -> Option<f64> {
        let trade = self.trades.get(index)?;
        match field {
            PriceField::Price => Some(trade.price),
            PriceField::Volume => Some(trade.size),
            _ => None,
        }
    }

    fn timestamp(&self, index: usize) -> Option<i64> {
        self.trades.get(index).map(|t| t.timestamp.timestamp_millis())
    }
}

// ============================================================
// SOURCES
// ============================================================

/// Parameters of a fetch
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub symbol: String,
    pub data_dir: Option<PathBuf>,
    pub data_file: Option<String>,
    /// Resampling width for trade files; ignored for bar files
    pub interval: Option<Interval>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    /// Only applies to resampled data
    pub with_volume: bool,
    /// Calendar for interval buckets and for timestamps without an offset
    pub timezone: Tz,
}

impl FetchRequest {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            data_dir: None,
            data_file: None,
            interval: None,
            start: None,
            end: None,
            with_volume: true,
            timezone: DEFAULT_TIMEZONE,
        }
    }

    pub fn file(mut self, data_dir: impl Into<PathBuf>, data_file: impl Into<String>) -> Self {
        self.data_dir = Some(data_dir.into());
        self.data_file = Some(data_file.into());
        self
    }

    pub fn interval(mut self, interval: Interval) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn range(mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn with_volume(mut self, enable: bool) -> Self {
        self.with_volume = enable;
        self
    }

    pub fn timezone(mut self, tz: Tz) -> Self {
        self.timezone = tz;
        self
    }

    pub(crate) fn path(&self) -> Result<PathBuf, DataError> {
        let file = self.data_file.as_ref().ok_or(DataError::MissingArgument("data_file"))?;
        Ok(match &self.data_dir {
            Some(dir) => dir.join(file),
            None => PathBuf::from(file),
        })
    }
}

/// Supplies a clean, time-ordered bar series
pub trait DataSource {
    fn fetch_series(&self, request: &FetchRequest) -> Result<BarSeries, DataError>;
}

/// Dispatch on a source name. Only local `csv` files are supported.
pub fn fetch_series(source: &str, request: &FetchRequest) -> Result<BarSeries, DataError> {
    match source {
        "csv" => CsvSource.fetch_series(request),
        other => Err(DataError::UnsupportedSource(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 12, 1, 14, min, 0).unwrap()
    }

    fn bar(min: u32, o: f64, h: f64, l: f64, c: f64) -> Bar {
        Bar { timestamp: at(min), open: o, high: h, low: l, close: c, volume: None }
    }

    #[test]
    fn test_interval_parse() {
        assert_eq!("15min".parse::<Interval>().unwrap(), Interval { amount: 15, unit: IntervalUnit::Minute });
        assert_eq!("1h".parse::<Interval>().unwrap().seconds(), 3_600);
        assert_eq!("1d".parse::<Interval>().unwrap().unit, IntervalUnit::Day);
        assert_eq!("1wk".parse::<Interval>().unwrap().unit, IntervalUnit::Week);
        assert_eq!("min".parse::<Interval>().unwrap().amount, 1);
        assert_eq!("15min".parse::<Interval>().unwrap().to_string(), "15min");
    }

    #[test]
    fn test_interval_parse_rejects() {
        assert!(matches!("5m".parse::<Interval>(), Err(DataError::InvalidInterval { .. })));
        assert!("0min".parse::<Interval>().is_err());
        assert!("15".parse::<Interval>().is_err());
        assert!("15fortnights".parse::<Interval>().is_err());
        assert!(Interval::new(0, IntervalUnit::Hour).is_err());
    }

    #[test]
    fn test_bucket_start() {
        let interval: Interval = "15min".parse().unwrap();
        let ts = Utc.with_ymd_and_hms(2023, 12, 1, 14, 37, 12).unwrap();
        assert_eq!(interval.bucket_start(ts, Tz::UTC), Some(at(30)));
        assert_eq!(interval.bucket_start(ts, DEFAULT_TIMEZONE), Some(at(30)));
    }

    #[test]
    fn test_daily_bucket_follows_local_midnight() {
        let day: Interval = "1d".parse().unwrap();
        // 00:30Z on Dec 2 is still Dec 1 in New York
        let late = Utc.with_ymd_and_hms(2023, 12, 2, 0, 30, 0).unwrap();
        let nyc_midnight = Utc.with_ymd_and_hms(2023, 12, 1, 5, 0, 0).unwrap();
        assert_eq!(day.bucket_start(late, DEFAULT_TIMEZONE), Some(nyc_midnight));
        assert_eq!(day.bucket_start(late, Tz::UTC), Utc.with_ymd_and_hms(2023, 12, 2, 0, 0, 0).single());

        // summer offset is -4h
        let july = Utc.with_ymd_and_hms(2023, 7, 4, 12, 0, 0).unwrap();
        assert_eq!(day.bucket_start(july, DEFAULT_TIMEZONE), Utc.with_ymd_and_hms(2023, 7, 4, 4, 0, 0).single());
    }

    #[test]
    fn test_weekly_bucket_starts_monday() {
        let week: Interval = "1wk".parse().unwrap();
        let monday = Utc.with_ymd_and_hms(2023, 12, 4, 5, 0, 0).unwrap();
        for day in [4, 6, 8, 10] {
            let ts = Utc.with_ymd_and_hms(2023, 12, day, 15, 0, 0).unwrap();
            assert_eq!(week.bucket_start(ts, DEFAULT_TIMEZONE), Some(monday));
        }
        let next = Utc.with_ymd_and_hms(2023, 12, 11, 15, 0, 0).unwrap();
        assert_eq!(week.bucket_start(next, DEFAULT_TIMEZONE), Utc.with_ymd_and_hms(2023, 12, 11, 5, 0, 0).single());
        assert_eq!(week.bucket_start(next, Tz::UTC), Utc.with_ymd_and_hms(2023, 12, 11, 0, 0, 0).single());
    }

    #[test]
    fn test_bucket_start_in_dst_gap() {
        let two_hours: Interval = "2h".parse().unwrap();
        // 03:30 EDT falls in the 02:00 bucket, which does not exist on 2024-03-10
        let ts = Utc.with_ymd_and_hms(2024, 3, 10, 7, 30, 0).unwrap();
        let three_edt = Utc.with_ymd_and_hms(2024, 3, 10, 7, 0, 0).unwrap();
        assert_eq!(two_hours.bucket_start(ts, DEFAULT_TIMEZONE), Some(three_edt));
    }

    #[test]
    fn test_fetch_request_timezone() {
        assert_eq!(FetchRequest::new("NQZ3").timezone, DEFAULT_TIMEZONE);
        assert_eq!(FetchRequest::new("NQZ3").timezone(Tz::UTC).timezone, Tz::UTC);
    }

    #[test]
    fn test_bar_series_validates_order() {
        let bars = vec![bar(1, 10.0, 11.0, 9.0, 10.5), bar(1, 10.0, 11.0, 9.0, 10.5)];
        assert_eq!(
            BarSeries::new("NQZ3", None, bars).unwrap_err(),
            PatternError::UnorderedTimestamps { index: 1 }
        );
    }

    #[test]
    fn test_bar_series_validates_ohlc() {
        let bars = vec![bar(1, 10.0, 11.0, 9.0, 10.5), bar(2, 12.0, 11.0, 9.0, 10.5)];
        assert_eq!(
            BarSeries::new("NQZ3", None, bars).unwrap_err(),
            PatternError::InvalidOHLCV { index: 1, reason: "open/close outside high-low range" }
        );
    }

    #[test]
    fn test_bar_series_between() {
        let bars = vec![bar(1, 10.0, 11.0, 9.0, 10.5), bar(2, 10.0, 11.0, 9.0, 10.5), bar(3, 10.0, 11.0, 9.0, 10.5)];
        let series = BarSeries::new("NQZ3", None, bars).unwrap();
        assert_eq!(series.between(Some(at(2)), Some(at(3))).len(), 1);
        assert_eq!(series.between(None, None).len(), 3);
    }

    #[test]
    fn test_trade_series_schema() {
        let trades = TradeSeries::new(
            "NQZ3",
            vec![Trade { timestamp: at(2), price: 10.0, size: 1.0 }, Trade { timestamp: at(1), price: 11.0, size: 2.0 }],
        );
        assert_eq!(trades.trades()[0].price, 11.0);
        assert!(PriceSeries::has_field(&trades, PriceField::Price));
        assert!(!PriceSeries::has_field(&trades, PriceField::High));
        assert_eq!(PriceSeries::value(&trades, PriceField::Volume, 1), Some(1.0));
    }

    #[test]
    fn test_fetch_unsupported_source() {
        let err = fetch_series("yfinance", &FetchRequest::new("AAPL")).unwrap_err();
        assert!(matches!(err, DataError::UnsupportedSource(s) if s == "yfinance"));
    }

    #[test]
    fn test_fetch_requires_file() {
        let err = fetch_series("csv", &FetchRequest::new("NQZ3")).unwrap_err();
        assert!(matches!(err, DataError::MissingArgument("data_file")));
    }
}
