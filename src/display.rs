//! Console rendering of annotated series

use std::fmt;

use chrono::DateTime;

use crate::{Annotated, PriceField, PriceSeries};

const PRICE_COLUMNS: [PriceField; 6] = [
  PriceField::Open,
  PriceField::High,
  PriceField::Low,
  PriceField::Close,
  PriceField::Volume,
  PriceField::Price,
];

const FLAG_COLUMNS: [&str; 7] = [
  "swing_high",
  "swing_low",
  "swing_high_broken",
  "swing_low_broken",
  "swing_invalidated",
  "bullish_fvg",
  "bearish_fvg",
];

/// Table view of an annotated series.
///
/// Shows every row when the series has at most `min_rows` bars, otherwise
/// the first and last `min_rows / 2` rows around an ellipsis line followed by
/// a `[rows x columns]` footer.
pub struct SeriesTable<'t, 'a, S: PriceSeries + ?Sized> {
  annotated: &'t Annotated<'a, S>,
  min_rows: usize,
}

impl<'t, 'a, S: PriceSeries + ?Sized> SeriesTable<'t, 'a, S> {
  pub const DEFAULT_MIN_ROWS: usize = 10;

  pub fn new(annotated: &'t Annotated<'a, S>) -> Self {
    Self { annotated, min_rows: Self::DEFAULT_MIN_ROWS }
  }

  pub fn min_rows(mut self, rows: usize) -> Self {
    self.min_rows = rows;
    self
  }

  fn header(&self, fields: &[PriceField], timestamped: bool) -> Vec<String> {
    let mut header = vec![String::new()];
    if timestamped {
      header.push("timestamp".to_string());
    }
    header.extend(fields.iter().map(|f| f.as_str().to_string()));
    header.extend(FLAG_COLUMNS.iter().map(|c| c.to_string()));
    header
  }

  fn row(&self, index: usize, fields: &[PriceField], timestamped: bool) -> Vec<String> {
    let series = self.annotated.series();
    let swing = self.annotated.swing_at(index).unwrap_or_default();
    let gap = self.annotated.gap_at(index).unwrap_or_default();

    let mut row = vec![index.to_string()];
    if timestamped {
      row.push(
        series
          .timestamp(index)
          .and_then(DateTime::from_timestamp_millis)
          .map_or_else(|| "NaT".to_string(), |ts| ts.format("%Y-%m-%d %H:%M:%S").to_string()),
      );
    }
    row.extend(
      fields
        .iter()
        .map(|f| series.value(*f, index).map_or_else(|| "NaN".to_string(), |v| v.to_string())),
    );
    row.extend(
      [
        swing.is_swing_high,
        swing.is_swing_low,
        swing.swing_high_broken,
        swing.swing_low_broken,
        swing.swing_invalidated,
        gap.bullish_fvg,
        gap.bearish_fvg,
      ]
      .iter()
      .map(|b| b.to_string()),
    );
    row
  }
}

impl<S: PriceSeries + ?Sized> fmt::Display for SeriesTable<'_, '_, S> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let series = self.annotated.series();
    let len = self.annotated.len();
    let fields: Vec<PriceField> =
      PRICE_COLUMNS.iter().copied().filter(|p| series.has_field(*p)).collect();
    let timestamped = len > 0 && series.timestamp(0).is_some();

    let truncated = len > self.min_rows;
    let half = (self.min_rows / 2).max(1);
    let shown: Vec<usize> = if truncated {
      (0..half).chain(len - half..len).collect()
    } else {
      (0..len).collect()
    };

    let header = self.header(&fields, timestamped);
    let rows: Vec<Vec<String>> =
      shown.iter().map(|&i| self.row(i, &fields, timestamped)).collect();

    let mut widths: Vec<usize> = header.iter().map(String::len).collect();
    for row in &rows {
      for (w, cell) in widths.iter_mut().zip(row) {
        *w = (*w).max(cell.len());
      }
    }

    write_line(f, &header, &widths)?;
    for (n, row) in rows.iter().enumerate() {
      if truncated && n == half {
        let dots: Vec<String> = widths.iter().map(|_| "...".to_string()).collect();
        write_line(f, &dots, &widths)?;
      }
      write_line(f, row, &widths)?;
    }
    if truncated {
      write!(f, "\n[{} rows x {} columns]", len, header.len() - 1)?;
    }
    Ok(())
  }
}

/// Right-aligned cells, two spaces apart
fn write_line(f: &mut fmt::Formatter<'_>, cells: &[String], widths: &[usize]) -> fmt::Result {
  let line: Vec<String> =
    cells.iter().zip(widths).map(|(c, w)| format!("{c:>w$}", w = *w)).collect();
  writeln!(f, "{}", line.join("  ").trim_end())
}

/// Print an annotated series to stdout, head and tail only past `min_rows`
pub fn debug_series<S: PriceSeries + ?Sized>(annotated: &Annotated<'_, S>, min_rows: usize) {
  println!("{}", SeriesTable::new(annotated).min_rows(min_rows));
}
