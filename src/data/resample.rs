//! Trade-print aggregation into fixed-interval bars

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{info, warn};

use super::{Bar, BarSeries, DataError, Interval, TradeSeries, DEFAULT_TIMEZONE};

/// Bar under construction for one bucket
struct BarBuilder {
  start: DateTime<Utc>,
  open: f64,
  high: f64,
  low: f64,
  close: f64,
  volume: f64,
}

impl BarBuilder {
  fn new(start: DateTime<Utc>, price: f64, size: f64) -> Self {
    Self { start, open: price, high: price, low: price, close: price, volume: size }
  }

  fn update(&mut self, price: f64, size: f64) {
    if price > self.high {
      self.high = price;
    }
    if price < self.low {
      self.low = price;
    }
    self.close = price;
    self.volume += size;
  }

  fn finish(self, with_volume: bool) -> Bar {
    Bar {
      timestamp: self.start,
      open: self.open,
      high: self.high,
      low: self.low,
      close: self.close,
      volume: with_volume.then_some(self.volume),
    }
  }
}

/// Aggregate trade prints into bars of width `interval` on the
/// [`DEFAULT_TIMEZONE`] calendar.
pub fn resample(
  trades: &TradeSeries,
  interval: Interval,
  with_volume: bool,
) -> Result<BarSeries, DataError> {
  resample_in(trades, interval, with_volume, DEFAULT_TIMEZONE)
}

/// Aggregate trade prints into bars of width `interval`, bucketed on the wall
/// clock of `tz` (see [`Interval::bucket_start`]).
///
/// Open is the first print of the bucket, close the last, high/low the
/// extremes; volume is the summed size when `with_volume` is set. Buckets
/// without prints produce no bar. Non-finite prices are skipped.
pub fn resample_in(
  trades: &TradeSeries,
  interval: Interval,
  with_volume: bool,
  tz: Tz,
) -> Result<BarSeries, DataError> {
  let mut bars = Vec::new();
  let mut current: Option<BarBuilder> = None;
  let mut skipped = 0usize;

  for trade in trades.trades() {
    if !trade.price.is_finite() {
      skipped += 1;
      continue;
    }
    let Some(bucket) = interval.bucket_start(trade.timestamp, tz) else {
      skipped += 1;
      continue;
    };

    match current.as_mut() {
      Some(builder) if builder.start == bucket => builder.update(trade.price, trade.size),
      _ => {
        if let Some(done) = current.take() {
          bars.push(done.finish(with_volume));
        }
        current = Some(BarBuilder::new(bucket, trade.price, trade.size));
      }
    }
  }
  if let Some(done) = current {
    bars.push(done.finish(with_volume));
  }

  if skipped > 0 {
    warn!(symbol = %trades.symbol, skipped, "dropped trade prints with unusable price or timestamp");
  }
  info!(
    symbol = %trades.symbol,
    %interval,
    %tz,
    trades = trades.len(),
    bars = bars.len(),
    "resampled trade prints"
  );
  Ok(BarSeries::new(trades.symbol.clone(), Some(interval), bars)?)
}
