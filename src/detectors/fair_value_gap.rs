//! Fair value gap detection
//!
//! Windows are three bars wide and advance one bar at a time. For the window
//! ending at bar `i`:
//!
//! - bearish gap: `low[i-2] > high[i]` (downward void)
//! - bullish gap: `high[i-2] < low[i]` (upward void)
//!
//! The flag lands on bar `i`, the third bar of the window, so it only ever
//! depends on bars `i-2..=i`. Both conditions are evaluated independently.

use tracing::debug;

use crate::{
  Annotated, DetectorId, GapFlags, PatternError, PriceSeries, Result, StructureDetector,
};

use super::{high_low, WINDOW_BARS};

/// Flags for the window ending at `index`. Indices below 2 are never flagged.
#[inline]
pub fn gap_at(high: &[f64], low: &[f64], index: usize) -> GapFlags {
  if index < 2 || index >= high.len() || index >= low.len() {
    return GapFlags::default();
  }
  let first = index - 2;
  GapFlags {
    bearish_fvg: low[first] > high[index],
    bullish_fvg: high[first] < low[index],
  }
}

/// Fair value gap detector
#[derive(Debug, Clone, Default)]
pub struct FairValueGapDetector {
  /// Fail with `InsufficientData` below 3 bars instead of leaving all flags false
  pub strict_min_bars: bool,
}

impl FairValueGapDetector {
  pub fn with_defaults() -> Self {
    Self::default()
  }

  pub fn detect_columns(&self, high: &[f64], low: &[f64]) -> Vec<GapFlags> {
    let len = high.len().min(low.len());
    (0..len).map(|i| gap_at(high, low, i)).collect()
  }
}

impl StructureDetector for FairValueGapDetector {
  fn id(&self) -> DetectorId {
    DetectorId("FAIR_VALUE_GAPS")
  }

  fn annotate<S: PriceSeries + ?Sized>(&self, annotated: &mut Annotated<'_, S>) -> Result<()> {
    let columns = high_low(annotated.series())?;
    let len = columns.high.len();

    if len < WINDOW_BARS {
      if self.strict_min_bars {
        return Err(PatternError::InsufficientData { need: WINDOW_BARS, got: len });
      }
      debug!(bars = len, "series shorter than gap window, left unannotated");
      return Ok(());
    }

    let gaps = self.detect_columns(&columns.high, &columns.low);
    let bullish = gaps.iter().filter(|g| g.bullish_fvg).count();
    let bearish = gaps.iter().filter(|g| g.bearish_fvg).count();
    annotated.gaps = gaps;

    debug!(bars = len, bullish, bearish, "fair value gap pass complete");
    Ok(())
  }
}

/// Detect fair value gaps with default settings.
///
/// Fails with [`PatternError::Schema`] when the series has no high or low.
pub fn detect_fair_value_gaps<S: PriceSeries + ?Sized>(series: &S) -> Result<Annotated<'_, S>> {
  let mut annotated = Annotated::new(series);
  FairValueGapDetector::default().annotate(&mut annotated)?;
  Ok(annotated)
}
