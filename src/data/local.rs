//! Local CSV files
//!
//! Two layouts are recognised from the header row, case-insensitively:
//!
//! - trade prints: `ts_recv, price, size` (DataBento trades export)
//! - bars: `Date, Open, High, Low, Close[, Volume]`
//!
//! Extra columns are ignored.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::{info, warn};

use super::{
  in_range, resample_in, Bar, BarSeries, DataError, DataSource, FetchRequest, Trade, TradeSeries,
};

/// Reads trade-print and bar files from disk
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
  Trades { ts: usize, price: usize, size: Option<usize> },
  Bars { date: usize, open: usize, high: usize, low: usize, close: usize, volume: Option<usize> },
}

fn detect_layout(headers: &csv::StringRecord) -> Result<Layout, DataError> {
  let find = |names: &[&str]| {
    headers
      .iter()
      .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
  };

  if let (Some(ts), Some(price)) = (find(&["ts_recv"]), find(&["price"])) {
    return Ok(Layout::Trades { ts, price, size: find(&["size"]) });
  }
  match (
    find(&["date", "datetime"]),
    find(&["open"]),
    find(&["high"]),
    find(&["low"]),
    find(&["close"]),
  ) {
    (Some(date), Some(open), Some(high), Some(low), Some(close)) => {
      Ok(Layout::Bars { date, open, high, low, close, volume: find(&["volume"]) })
    }
    _ => Err(DataError::UnknownLayout(headers.iter().collect::<Vec<_>>().join(", "))),
  }
}

/// Parse RFC 3339, `YYYY-MM-DD HH:MM:SS[.f][±HH:MM]`, or a bare date.
/// Values without an offset are wall-clock time in `tz`; a time skipped by a
/// DST change does not parse.
pub(crate) fn parse_timestamp(value: &str, tz: Tz) -> Option<DateTime<Utc>> {
  let value = value.trim();
  if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
    return Some(ts.with_timezone(&Utc));
  }
  if let Ok(ts) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%:z") {
    return Some(ts.with_timezone(&Utc));
  }
  let naive = match NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f") {
    Ok(ts) => ts,
    Err(_) => NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?.and_hms_opt(0, 0, 0)?,
  };
  tz.from_local_datetime(&naive).earliest().map(|ts| ts.with_timezone(&Utc))
}

struct Row<'r> {
  record: &'r csv::StringRecord,
  /// 1-based data row, header excluded
  number: usize,
  tz: Tz,
}

impl Row<'_> {
  fn timestamp(&self, column: usize) -> Result<DateTime<Utc>, DataError> {
    let value = self.record.get(column).unwrap_or_default();
    parse_timestamp(value, self.tz)
      .ok_or_else(|| DataError::Timestamp { row: self.number, value: value.to_string() })
  }

  fn float(&self, headers: &csv::StringRecord, column: usize) -> Result<f64, DataError> {
    let value = self.record.get(column).unwrap_or_default().trim();
    value.parse::<f64>().map_err(|_| DataError::Number {
      row: self.number,
      column: headers.get(column).unwrap_or_default().to_string(),
      value: value.to_string(),
    })
  }
}

fn open_reader(path: &Path) -> Result<(csv::Reader<BufReader<File>>, csv::StringRecord), DataError> {
  let file = File::open(path)?;
  let mut reader = csv::ReaderBuilder::new()
    .trim(csv::Trim::All)
    .from_reader(BufReader::new(file));
  let headers = reader.headers()?.clone();
  Ok((reader, headers))
}

impl CsvSource {
  /// Load raw trade prints with `start <= ts_recv < end`. Naive timestamps
  /// are read in `tz`.
  pub fn load_trades(
    &self,
    path: &Path,
    symbol: &str,
    tz: Tz,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
  ) -> Result<TradeSeries, DataError> {
    let (mut reader, headers) = open_reader(path)?;
    let Layout::Trades { ts, price, size } = detect_layout(&headers)? else {
      return Err(DataError::UnknownLayout(format!(
        "expected ts_recv, price, size in {}",
        path.display()
      )));
    };

    let mut trades = Vec::new();
    for (i, record) in reader.records().enumerate() {
      let record = record?;
      let row = Row { record: &record, number: i + 1, tz };
      let timestamp = row.timestamp(ts)?;
      if !in_range(timestamp, start, end) {
        continue;
      }
      let size = match size {
        Some(column) => row.float(&headers, column)?,
        None => 0.0,
      };
      trades.push(Trade { timestamp, price: row.float(&headers, price)?, size });
    }

    info!(symbol, path = %path.display(), trades = trades.len(), "loaded trade prints");
    Ok(TradeSeries::new(symbol, trades))
  }

  /// Load bars with `start <= Date < end`, reading naive dates in `tz`. Rows
  /// are sorted by timestamp and duplicate timestamps keep the first row seen.
  pub fn load_bars(
    &self,
    path: &Path,
    symbol: &str,
    tz: Tz,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
  ) -> Result<BarSeries, DataError> {
    let (mut reader, headers) = open_reader(path)?;
    let Layout::Bars { date, open, high, low, close, volume } = detect_layout(&headers)? else {
      return Err(DataError::UnknownLayout(format!(
        "expected Date, Open, High, Low, Close in {}",
        path.display()
      )));
    };

    let mut bars = Vec::new();
    for (i, record) in reader.records().enumerate() {
      let record = record?;
      let row = Row { record: &record, number: i + 1, tz };
      let timestamp = row.timestamp(date)?;
      if !in_range(timestamp, start, end) {
        continue;
      }
      bars.push(Bar {
        timestamp,
        open: row.float(&headers, open)?,
        high: row.float(&headers, high)?,
        low: row.float(&headers, low)?,
        close: row.float(&headers, close)?,
        volume: volume.map(|c| row.float(&headers, c)).transpose()?,
      });
    }

    let read = bars.len();
    bars.sort_by_key(|b| b.timestamp);
    bars.dedup_by_key(|b| b.timestamp);
    if bars.len() < read {
      warn!(symbol, dropped = read - bars.len(), "dropped bars with duplicate timestamps");
    }

    info!(symbol, path = %path.display(), bars = bars.len(), "loaded bars");
    Ok(BarSeries::new(symbol, None, bars)?)
  }

  fn load_any(&self, path: &Path, request: &FetchRequest) -> Result<BarSeries, DataError> {
    let layout = {
      let (_, headers) = open_reader(path)?;
      detect_layout(&headers)?
    };
    match layout {
      Layout::Trades { .. } => {
        let interval = request.interval.ok_or(DataError::IntervalRequired)?;
        let trades =
          self.load_trades(path, &request.symbol, request.timezone, request.start, request.end)?;
        resample_in(&trades, interval, request.with_volume, request.timezone)
      }
      Layout::Bars { .. } => {
        let mut series =
          self.load_bars(path, &request.symbol, request.timezone, request.start, request.end)?;
        series.interval = request.interval;
        Ok(series)
      }
    }
  }
}

impl DataSource for CsvSource {
  fn fetch_series(&self, request: &FetchRequest) -> Result<BarSeries, DataError> {
    let path = request.path()?;
    self.load_any(&path, request)
  }
}
