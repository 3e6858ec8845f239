//! Price structure detectors
//!
//! # Detectors
//!
//! - **Swing points**: strict 3-bar local extrema with break/invalidation tracking.
//! - **Fair value gaps**: 3-bar price voids, flagged on the third bar.

use crate::{require_fields, PatternError, PriceField, PriceSeries, Result};

/// Width of the comparison window shared by both detectors
pub const WINDOW_BARS: usize = 3;

pub mod fair_value_gap;
pub mod swing;

pub use fair_value_gap::*;
pub use swing::*;

/// High and low columns pulled from a series after a schema check
pub(crate) struct HighLow {
  pub high: Vec<f64>,
  pub low: Vec<f64>,
}

pub(crate) fn high_low<S: PriceSeries + ?Sized>(series: &S) -> Result<HighLow> {
  require_fields(series, &[PriceField::High, PriceField::Low])?;
  // a field can be declared yet have holes; report only the incomplete column(s)
  match (series.column(PriceField::High), series.column(PriceField::Low)) {
    (Some(high), Some(low)) => Ok(HighLow { high, low }),
    (high, low) => {
      let missing = [(PriceField::High, high.is_none()), (PriceField::Low, low.is_none())]
        .into_iter()
        .filter_map(|(field, absent)| absent.then_some(field))
        .collect();
      Err(PatternError::Schema { missing })
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  /// Declares high and low but leaves gaps in the listed columns
  struct Holes {
    high_hole: bool,
    low_hole: bool,
  }

  impl PriceSeries for Holes {
    fn len(&self) -> usize {
      3
    }

    fn has_field(&self, field: PriceField) -> bool {
      matches!(field, PriceField::High | PriceField::Low)
    }

    fn value(&self, field: PriceField, index: usize) -> Option<f64> {
      let hole = match field {
        PriceField::High => self.high_hole,
        PriceField::Low => self.low_hole,
        _ => return None,
      };
      (!(hole && index == 1)).then_some(10.0)
    }
  }

  #[test]
  fn test_high_low_complete() {
    let columns = high_low(&Holes { high_hole: false, low_hole: false }).unwrap();
    assert_eq!(columns.high, vec![10.0; 3]);
    assert_eq!(columns.low, vec![10.0; 3]);
  }

  #[test]
  fn test_high_low_reports_only_incomplete_field() {
    let err = high_low(&Holes { high_hole: false, low_hole: true }).err().unwrap();
    assert_eq!(err, PatternError::Schema { missing: vec![PriceField::Low] });

    let err = high_low(&Holes { high_hole: true, low_hole: false }).err().unwrap();
    assert_eq!(err, PatternError::Schema { missing: vec![PriceField::High] });

    let err = high_low(&Holes { high_hole: true, low_hole: true }).err().unwrap();
    assert_eq!(err, PatternError::Schema { missing: vec![PriceField::High, PriceField::Low] });
  }
}
