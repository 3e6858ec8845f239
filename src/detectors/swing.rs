//! Swing point detection
//!
//! A bar is a swing high when its high is strictly greater than both
//! neighbours' highs, and a swing low when its low is strictly less than both
//! neighbours' lows. Equal neighbours never qualify, so flat tops and bottoms
//! are not extrema. The first and last bar have no neighbour on one side and
//! can never be swing points.
//!
//! Marking is a pure per-window function and may run in parallel. Break and
//! invalidation tracking is a left-to-right state machine ([`SwingTracker`])
//! and always runs sequentially.

use rayon::prelude::*;
use tracing::{debug, trace};

use crate::{
  Annotated, DetectorId, PatternError, PriceSeries, Result, StructureDetector, SwingFlags,
  DEFAULT_PARALLEL_THRESHOLD,
};

use super::{high_low, WINDOW_BARS};

// ============================================================
// EXTREMUM MARKING
// ============================================================

/// Local-extremum result for a single bar
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Extremum {
  pub high: bool,
  pub low: bool,
}

/// Test bar `index` against its immediate neighbours.
#[inline]
pub fn extremum_at(high: &[f64], low: &[f64], index: usize) -> Extremum {
  if index == 0 || index + 1 >= high.len() || index + 1 >= low.len() {
    return Extremum::default();
  }
  let (prev, next) = (index - 1, index + 1);
  Extremum {
    high: high[index] > high[prev] && high[index] > high[next],
    low: low[index] < low[prev] && low[index] < low[next],
  }
}

/// Mark extrema for every bar; fans out across rayon above `parallel_threshold`
pub fn mark_extrema(high: &[f64], low: &[f64], parallel_threshold: usize) -> Vec<Extremum> {
  let len = high.len().min(low.len());
  if len >= parallel_threshold {
    (0..len).into_par_iter().map(|i| extremum_at(high, low, i)).collect()
  } else {
    (0..len).map(|i| extremum_at(high, low, i)).collect()
  }
}

// ============================================================
// BREAK / INVALIDATION STATE MACHINE
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq)]
struct ActiveSwing {
  index: usize,
  price: f64,
}

/// Counters for one detection pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwingSummary {
  pub swing_highs: usize,
  pub swing_lows: usize,
  pub invalidated: usize,
  pub broken: usize,
}

/// Carries the last unbroken swing of each type across bars.
///
/// Feed bars in index order through [`SwingTracker::step`]. A new swing of a
/// type invalidates the tracked unbroken one and replaces it. Otherwise the
/// bar's high (low) is compared strictly against the tracked swing high
/// (low); the first breach marks it broken and releases it. A swing that has
/// been broken or superseded is never touched again, so every flag is set at
/// most once. In particular a superseded swing stays unbroken even when later
/// price trades through it.
#[derive(Debug, Clone, Default)]
pub struct SwingTracker {
  active_high: Option<ActiveSwing>,
  active_low: Option<ActiveSwing>,
  summary: SwingSummary,
}

impl SwingTracker {
  pub fn new() -> Self {
    Self::default()
  }

  /// Index of the tracked unbroken swing high, if any
  pub fn active_high(&self) -> Option<usize> {
    self.active_high.map(|s| s.index)
  }

  /// Index of the tracked unbroken swing low, if any
  pub fn active_low(&self) -> Option<usize> {
    self.active_low.map(|s| s.index)
  }

  pub fn summary(&self) -> SwingSummary {
    self.summary
  }

  /// Advance over bar `index`. `flags` is indexed by bar and must cover
  /// every index seen so far.
  pub fn step(
    &mut self,
    index: usize,
    high: f64,
    low: f64,
    mark: Extremum,
    flags: &mut [SwingFlags],
  ) {
    if mark.high {
      flags[index].is_swing_high = true;
      self.summary.swing_highs += 1;
      if let Some(prev) = self.active_high.replace(ActiveSwing { index, price: high }) {
        flags[prev.index].swing_invalidated = true;
        self.summary.invalidated += 1;
        trace!(superseded = prev.index, by = index, "swing high invalidated");
      }
    } else if let Some(active) = self.active_high {
      if high > active.price {
        flags[active.index].swing_high_broken = true;
        self.active_high = None;
        self.summary.broken += 1;
        trace!(swing = active.index, at = index, "swing high broken");
      }
    }

    if mark.low {
      flags[index].is_swing_low = true;
      self.summary.swing_lows += 1;
      if let Some(prev) = self.active_low.replace(ActiveSwing { index, price: low }) {
        flags[prev.index].swing_invalidated = true;
        self.summary.invalidated += 1;
        trace!(superseded = prev.index, by = index, "swing low invalidated");
      }
    } else if let Some(active) = self.active_low {
      if low < active.price {
        flags[active.index].swing_low_broken = true;
        self.active_low = None;
        self.summary.broken += 1;
        trace!(swing = active.index, at = index, "swing low broken");
      }
    }
  }
}

// ============================================================
// DETECTOR
// ============================================================

/// Swing point detector
#[derive(Debug, Clone)]
pub struct SwingDetector {
  /// Fail with `InsufficientData` below 3 bars instead of leaving all flags false
  pub strict_min_bars: bool,
  pub parallel_threshold: usize,
}

impl Default for SwingDetector {
  fn default() -> Self {
    Self { strict_min_bars: false, parallel_threshold: DEFAULT_PARALLEL_THRESHOLD }
  }
}

impl SwingDetector {
  pub fn with_defaults() -> Self {
    Self::default()
  }

  /// Full marking plus tracking over raw columns
  pub fn detect_columns(&self, high: &[f64], low: &[f64]) -> (Vec<SwingFlags>, SwingSummary) {
    let len = high.len().min(low.len());
    let mut flags = vec![SwingFlags::default(); len];
    let marks = mark_extrema(high, low, self.parallel_threshold);

    let mut tracker = SwingTracker::new();
    for (index, mark) in marks.into_iter().enumerate() {
      tracker.step(index, high[index], low[index], mark, &mut flags);
    }
    (flags, tracker.summary())
  }
}

impl StructureDetector for SwingDetector {
  fn id(&self) -> DetectorId {
    DetectorId("SWING_POINTS")
  }

  fn annotate<S: PriceSeries + ?Sized>(&self, annotated: &mut Annotated<'_, S>) -> Result<()> {
    let columns = high_low(annotated.series())?;
    let len = columns.high.len();

    if len < WINDOW_BARS {
      if self.strict_min_bars {
        return Err(PatternError::InsufficientData { need: WINDOW_BARS, got: len });
      }
      debug!(bars = len, "series shorter than swing window, left unannotated");
      return Ok(());
    }

    let (flags, summary) = self.detect_columns(&columns.high, &columns.low);
    annotated.swings = flags;

    debug!(
      bars = len,
      swing_highs = summary.swing_highs,
      swing_lows = summary.swing_lows,
      invalidated = summary.invalidated,
      broken = summary.broken,
      "swing point pass complete"
    );
    Ok(())
  }
}

/// Detect swing points with default settings.
///
/// Series shorter than 3 bars come back with every flag false.
pub fn detect_swing_points<S: PriceSeries + ?Sized>(series: &S) -> Result<Annotated<'_, S>> {
  let mut annotated = Annotated::new(series);
  SwingDetector::default().annotate(&mut annotated)?;
  Ok(annotated)
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
  use super::*;
  use crate::PriceField;

  fn detect(high: &[f64], low: &[f64]) -> Vec<SwingFlags> {
    SwingDetector::default().detect_columns(high, low).0
  }

  fn highs_only(high: &[f64]) -> Vec<SwingFlags> {
    // lows far below and flat so only the high side matters
    let low = vec![0.0; high.len()];
    detect(high, &low)
  }

  #[test]
  fn test_plateau_is_not_swing() {
    let flags = highs_only(&[5.0, 5.0, 5.0]);
    assert!(flags.iter().all(|f| !f.is_swing_high));
  }

  #[test]
  fn test_equal_right_neighbour_is_not_swing() {
    let flags = highs_only(&[4.0, 6.0, 6.0, 3.0]);
    assert!(flags.iter().all(|f| !f.is_swing_high));
  }

  #[test]
  fn test_boundaries_never_marked() {
    // endpoints are the global extremes but lack a neighbour
    let high = [20.0, 10.0, 12.0, 10.0, 25.0];
    let low = [1.0, 5.0, 4.0, 5.0, 0.5];
    let flags = detect(&high, &low);
    assert!(!flags[0].is_swing_high && !flags[0].is_swing_low);
    assert!(!flags[4].is_swing_high && !flags[4].is_swing_low);
    assert!(flags[2].is_swing_high);
    assert!(flags[2].is_swing_low);
  }

  #[test]
  fn test_scenario_invalidation() {
    let high = [10.0, 12.0, 9.0, 13.0, 11.0];
    let low = [8.0, 9.0, 7.0, 6.0, 5.0];
    let flags = detect(&high, &low);

    assert!(flags[1].is_swing_high);
    assert!(flags[3].is_swing_high);
    assert!(!flags[2].is_swing_low);
    assert!(flags[1].swing_invalidated);
    assert!(!flags[1].swing_high_broken);
    assert!(!flags[3].swing_invalidated);
  }

  #[test]
  fn test_superseded_swing_is_never_broken() {
    // bar 3 supersedes bar 1; bar 5 trades above both but only breaks bar 3
    let flags = highs_only(&[10.0, 20.0, 12.0, 15.0, 11.0, 25.0]);

    assert!(flags[1].is_swing_high && flags[3].is_swing_high);
    assert!(flags[1].swing_invalidated);
    assert!(!flags[1].swing_high_broken);
    assert!(flags[3].swing_high_broken);
    assert!(!flags[3].swing_invalidated);
  }

  #[test]
  fn test_ascending_swing_highs_invalidate_predecessors() {
    let high = [1.0, 5.0, 2.0, 6.0, 3.0, 7.0, 4.0];
    let flags = highs_only(&high);

    assert!(flags[1].is_swing_high && flags[3].is_swing_high && flags[5].is_swing_high);
    assert!(flags[1].swing_invalidated);
    assert!(flags[3].swing_invalidated);
    assert!(!flags[5].swing_invalidated);
  }

  #[test]
  fn test_swing_high_broken_by_later_bar() {
    // swing at 1 (10), bar 3 exceeds it without being a swing itself
    let high = [5.0, 10.0, 6.0, 11.0, 12.0];
    let flags = highs_only(&high);

    assert!(flags[1].is_swing_high);
    assert!(flags[1].swing_high_broken);
    assert!(!flags[1].swing_invalidated);
  }

  #[test]
  fn test_break_uses_strict_comparison() {
    let high = [5.0, 10.0, 6.0, 10.0, 10.0];
    let flags = highs_only(&high);
    assert!(!flags[1].swing_high_broken);
  }

  #[test]
  fn test_broken_swing_is_not_invalidated_later() {
    // swing 1 broken at bar 3, then new swing at 5 finds nothing to supersede
    let high = [5.0, 10.0, 6.0, 11.0, 12.0, 14.0, 13.0];
    let flags = highs_only(&high);

    assert!(flags[1].swing_high_broken);
    assert!(flags[5].is_swing_high);
    assert!(!flags[1].swing_invalidated);
  }

  #[test]
  fn test_swing_low_broken_and_invalidated() {
    let low = [10.0, 5.0, 8.0, 4.0, 9.0, 6.0, 5.0, 3.0];
    let high = vec![100.0; low.len()];
    let flags = detect(&high, &low);

    // 1 superseded by 3; 3 breached at 7
    assert!(flags[1].is_swing_low && flags[1].swing_invalidated);
    assert!(flags[3].is_swing_low && !flags[3].swing_invalidated);
    assert!(flags[3].swing_low_broken);
    assert!(!flags[5].is_swing_low && !flags[6].is_swing_low);
  }

  #[test]
  fn test_tracker_releases_broken_swing() {
    let mut flags = vec![SwingFlags::default(); 3];
    let mut tracker = SwingTracker::new();
    tracker.step(0, 10.0, 1.0, Extremum { high: true, low: false }, &mut flags);
    assert_eq!(tracker.active_high(), Some(0));
    tracker.step(1, 11.0, 1.0, Extremum::default(), &mut flags);
    assert_eq!(tracker.active_high(), None);
    tracker.step(2, 12.0, 1.0, Extremum::default(), &mut flags);
    assert!(flags[0].swing_high_broken);
    assert_eq!(tracker.summary().broken, 1);
  }

  #[test]
  fn test_parallel_marking_matches_sequential() {
    let high: Vec<f64> = (0..500).map(|i| ((i * 37 % 101) as f64).sin() * 10.0 + 50.0).collect();
    let low: Vec<f64> = high.iter().map(|h| h - 2.0 - (h % 3.0)).collect();
    let sequential = mark_extrema(&high, &low, usize::MAX);
    let parallel = mark_extrema(&high, &low, 0);
    assert_eq!(sequential, parallel);
  }

  #[test]
  fn test_short_series_lenient() {
    struct Two;
    impl PriceSeries for Two {
      fn len(&self) -> usize {
        2
      }
      fn has_field(&self, field: PriceField) -> bool {
        matches!(field, PriceField::High | PriceField::Low)
      }
      fn value(&self, _field: PriceField, index: usize) -> Option<f64> {
        (index < 2).then_some(1.0 + index as f64)
      }
    }

    let two = Two;
    let annotated = detect_swing_points(&two).unwrap();
    assert_eq!(annotated.len(), 2);
    assert!(annotated.swings().iter().all(|f| *f == SwingFlags::default()));

    let mut strict = Annotated::new(&two);
    let err = SwingDetector { strict_min_bars: true, ..SwingDetector::default() }
      .annotate(&mut strict)
      .unwrap_err();
    assert_eq!(err, PatternError::InsufficientData { need: 3, got: 2 });
  }
}
