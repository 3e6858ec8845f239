//! Latest-signal extraction
//!
//! Stateless reads over an [`Annotated`] series: find the most recent bar
//! carrying a flag (optionally within the last N bars) and report the price
//! at that bar. `None` means "no signal yet" and is not an error.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Annotated, Period, PriceField, PriceSeries};

/// Snapshot of the latest detected levels. Rebuilt in full on every pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
  pub last_swing_high: Option<f64>,
  pub last_swing_low: Option<f64>,
  pub last_bullish_fvg: Option<f64>,
  pub last_bearish_fvg: Option<f64>,
}

impl SignalRecord {
  /// Extract every level from one annotated series
  pub fn from_annotated<S: PriceSeries + ?Sized>(
    annotated: &Annotated<'_, S>,
    lookback: Option<Period>,
  ) -> Self {
    let (last_swing_high, last_swing_low) = get_last_swing_points(annotated, lookback);
    let (last_bullish_fvg, last_bearish_fvg) = get_last_fair_value_gaps_within(annotated, lookback);
    Self { last_swing_high, last_swing_low, last_bullish_fvg, last_bearish_fvg }
  }

  pub fn is_empty(&self) -> bool {
    *self == Self::default()
  }
}

impl fmt::Display for SignalRecord {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fn level(v: Option<f64>) -> String {
      v.map_or_else(|| "None".to_string(), |p| p.to_string())
    }
    writeln!(f, "Last swing high: {}", level(self.last_swing_high))?;
    writeln!(f, "Last swing low: {}", level(self.last_swing_low))?;
    writeln!(f, "Last bullish FVG: {}", level(self.last_bullish_fvg))?;
    write!(f, "Last bearish FVG: {}", level(self.last_bearish_fvg))
  }
}

/// First index inside the lookback window
#[inline]
fn tail_start(len: usize, lookback: Option<Period>) -> usize {
  lookback.map_or(0, |n| len.saturating_sub(n.get()))
}

/// Price of `field` at the most recent index in `start..len` where `flagged` holds
fn last_flagged<S, F>(
  annotated: &Annotated<'_, S>,
  start: usize,
  field: PriceField,
  flagged: F,
) -> Option<f64>
where
  S: PriceSeries + ?Sized,
  F: Fn(usize) -> bool,
{
  (start..annotated.len())
    .rev()
    .find(|&i| flagged(i))
    .and_then(|i| annotated.series().value(field, i))
}

/// Most recent swing high price (bar high) and swing low price (bar low).
pub fn get_last_swing_points<S: PriceSeries + ?Sized>(
  annotated: &Annotated<'_, S>,
  lookback: Option<Period>,
) -> (Option<f64>, Option<f64>) {
  let start = tail_start(annotated.len(), lookback);
  let swings = annotated.swings();
  let high = last_flagged(annotated, start, PriceField::High, |i| swings[i].is_swing_high);
  let low = last_flagged(annotated, start, PriceField::Low, |i| swings[i].is_swing_low);
  (high, low)
}

/// Most recent bullish and bearish gap over the whole series.
///
/// Both report the high of the flagged (third) bar.
pub fn get_last_fair_value_gaps<S: PriceSeries + ?Sized>(
  annotated: &Annotated<'_, S>,
) -> (Option<f64>, Option<f64>) {
  get_last_fair_value_gaps_within(annotated, None)
}

/// [`get_last_fair_value_gaps`] bounded to the most recent `lookback` bars
pub fn get_last_fair_value_gaps_within<S: PriceSeries + ?Sized>(
  annotated: &Annotated<'_, S>,
  lookback: Option<Period>,
) -> (Option<f64>, Option<f64>) {
  let start = tail_start(annotated.len(), lookback);
  let gaps = annotated.gaps();
  let bullish = last_flagged(annotated, start, PriceField::High, |i| gaps[i].bullish_fvg);
  let bearish = last_flagged(annotated, start, PriceField::High, |i| gaps[i].bearish_fvg);
  (bullish, bearish)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::OHLCV;

  #[derive(Debug, Clone, Copy)]
  struct HL(f64, f64);

  impl OHLCV for HL {
    fn open(&self) -> f64 {
      self.1
    }
    fn high(&self) -> f64 {
      self.0
    }
    fn low(&self) -> f64 {
      self.1
    }
    fn close(&self) -> f64 {
      self.0
    }
  }

  fn zigzag() -> Vec<HL> {
    // swing highs at 1, 3, 5; swing lows at 2, 4
    vec![HL(10.0, 5.0), HL(12.0, 6.0), HL(9.0, 3.0), HL(14.0, 7.0), HL(8.0, 2.0), HL(11.0, 4.0), HL(10.0, 5.0)]
  }

  #[test]
  fn test_last_swing_points_full_series() {
    let bars = zigzag();
    let annotated = Annotated::new(&bars).with_swing_points().unwrap();
    assert_eq!(get_last_swing_points(&annotated, None), (Some(11.0), Some(2.0)));
  }

  #[test]
  fn test_last_swing_points_lookback() {
    let bars = zigzag();
    let annotated = Annotated::new(&bars).with_swing_points().unwrap();

    // last two bars: index 5 (swing high), index 6
    assert_eq!(get_last_swing_points(&annotated, Some(Period::new_const(2))), (Some(11.0), None));
    // window covers whole series
    assert_eq!(get_last_swing_points(&annotated, Some(Period::new_const(100))), (Some(11.0), Some(2.0)));
  }

  #[test]
  fn test_no_signal_is_none() {
    let bars = vec![HL(1.0, 0.5), HL(2.0, 1.5), HL(3.0, 2.5)];
    let annotated = Annotated::new(&bars).with_swing_points().unwrap().with_fair_value_gaps().unwrap();
    assert_eq!(get_last_swing_points(&annotated, None), (None, None));
    // 1.0 < 2.5: bullish gap at 2
    assert_eq!(get_last_fair_value_gaps(&annotated), (Some(3.0), None));
  }

  #[test]
  fn test_bearish_fvg_reports_third_bar_high() {
    let bars = vec![HL(110.0, 100.0), HL(101.0, 94.0), HL(95.0, 90.0)];
    let annotated = Annotated::new(&bars).with_fair_value_gaps().unwrap();
    assert_eq!(get_last_fair_value_gaps(&annotated), (None, Some(95.0)));
  }

  #[test]
  fn test_extraction_is_idempotent() {
    let bars = zigzag();
    let annotated = Annotated::new(&bars).with_swing_points().unwrap().with_fair_value_gaps().unwrap();
    let first = SignalRecord::from_annotated(&annotated, None);
    let second = SignalRecord::from_annotated(&annotated, None);
    assert_eq!(first, second);
  }

  #[test]
  fn test_signal_record_display_and_serde() {
    let record = SignalRecord { last_swing_high: Some(13.0), ..SignalRecord::default() };
    let text = record.to_string();
    assert!(text.contains("Last swing high: 13"));
    assert!(text.contains("Last swing low: None"));

    let json = serde_json::to_string(&record).unwrap();
    let back: SignalRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(back, record);
    assert!(!record.is_empty());
    assert!(SignalRecord::default().is_empty());
  }
}
