//! # swingfvg - Swing point and fair value gap detection
//!
//! Structural price pattern detection over time-ordered OHLC series: local
//! extrema ("swing points") with break/invalidation tracking, and three-bar
//! price voids ("fair value gaps").
//!
//! ## Quick Start
//!
//! ```rust
//! use swingfvg::prelude::*;
//!
//! // Define your OHLC data
//! struct Candle { o: f64, h: f64, l: f64, c: f64 }
//!
//! impl OHLCV for Candle {
//!     fn open(&self) -> f64 { self.o }
//!     fn high(&self) -> f64 { self.h }
//!     fn low(&self) -> f64 { self.l }
//!     fn close(&self) -> f64 { self.c }
//! }
//!
//! let bars = vec![
//!     Candle { o: 9.0, h: 10.0, l: 8.0, c: 9.5 },
//!     Candle { o: 10.0, h: 12.0, l: 9.0, c: 11.0 },
//!     Candle { o: 8.0, h: 9.0, l: 7.0, c: 8.5 },
//!     Candle { o: 7.0, h: 13.0, l: 6.0, c: 12.0 },
//!     Candle { o: 10.0, h: 11.0, l: 5.0, c: 6.0 },
//! ];
//!
//! // Create engine with both detectors enabled
//! let engine = EngineBuilder::new()
//!     .with_all_defaults()
//!     .build()
//!     .unwrap();
//!
//! let annotated = engine.scan(&bars).unwrap();
//! let signals = engine.signals(&annotated);
//! assert_eq!(signals.last_swing_high, Some(13.0));
//! assert_eq!(signals.last_swing_low, None);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub mod data;
pub mod detectors;
pub mod display;
pub mod signals;
pub mod strategy;

pub mod prelude {
    pub use crate::{
        // Detectors
        detectors::*,
        // Presentation
        display::{debug_series, SeriesTable},
        // Signals
        signals::{
            get_last_fair_value_gaps, get_last_fair_value_gaps_within, get_last_swing_points,
            SignalRecord,
        },
        // Strategy
        strategy::{LiquidityReversalSniper, Strategy},
        // Parallel
        scan_parallel,
        // Annotations
        Annotated,
        AnnotatedRow,
        AnnotatedRows,
        // Engine
        BuiltinDetector,
        DetectorId,
        Direction,
        EngineBuilder,
        EngineConfig,
        FairValueGap,
        GapFlags,
        // Errors
        PatternError,
        Period,
        PriceField,
        PriceSeries,
        Result,
        ScanError,
        ScanResult,
        StructureDetector,
        StructureEngine,
        SwingFlags,
        SwingKind,
        SwingPoint,
        OHLCV,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, PatternError>;

/// Errors that can occur during structure detection
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PatternError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Required price fields are absent from the series. Integration fault,
    /// never a data-quality condition.
    #[error("Schema error: series is missing required field(s) {}", format_fields(.missing))]
    Schema { missing: Vec<PriceField> },

    #[error("Insufficient data: need {need} bars, got {got}")]
    InsufficientData { need: usize, got: usize },

    #[error("Invalid OHLCV at index {index}: {reason}")]
    InvalidOHLCV { index: usize, reason: &'static str },

    #[error("Timestamps not strictly increasing at index {index}")]
    UnorderedTimestamps { index: usize },
}

fn format_fields(fields: &[PriceField]) -> String {
    fields
        .iter()
        .map(|f| f.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Period (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(PatternError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// PRICE FIELDS & SERIES TRAITS
// ============================================================

/// Named price column of a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
    Volume,
    /// Raw trade print price (unaggregated data)
    Price,
}

impl PriceField {
    pub fn as_str(self) -> &'static str {
        match self {
            PriceField::Open => "open",
            PriceField::High => "high",
            PriceField::Low => "low",
            PriceField::Close => "close",
            PriceField::Volume => "volume",
            PriceField::Price => "price",
        }
    }
}

impl fmt::Display for PriceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core OHLCV row trait
pub trait OHLCV {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;

    /// Only aggregated/resampled bars carry volume
    fn volume(&self) -> Option<f64> {
        None
    }

    /// Epoch milliseconds
    fn timestamp(&self) -> Option<i64> {
        None
    }
}

/// Column-addressable, time-ordered price series consumed by the detectors.
///
/// Detectors look fields up by name so that a series lacking a required
/// column (e.g. raw trade prints with no high/low) surfaces as
/// [`PatternError::Schema`] instead of silently producing nothing.
pub trait PriceSeries {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn has_field(&self, field: PriceField) -> bool;

    fn value(&self, field: PriceField, index: usize) -> Option<f64>;

    /// Epoch milliseconds of the row, if the series is timestamped
    fn timestamp(&self, _index: usize) -> Option<i64> {
        None
    }

    /// Materialize a whole column. `None` if the field is absent.
    fn column(&self, field: PriceField) -> Option<Vec<f64>> {
        if !self.has_field(field) {
            return None;
        }
        (0..self.len()).map(|i| self.value(field, i)).collect()
    }
}

impl<T: OHLCV> PriceSeries for [T] {
    fn len(&self) -> usize {
        <[T]>::len(self)
    }

    fn has_field(&self, field: PriceField) -> bool {
        match field {
            PriceField::Open | PriceField::High | PriceField::Low | PriceField::Close => true,
            PriceField::Volume => !<[T]>::is_empty(self) && self.iter().all(|b| b.volume().is_some()),
            PriceField::Price => false,
        }
    }

    fn value(&self, field: PriceField, index: usize) -> Option<f64> {
        let bar = self.get(index)?;
        match field {
            PriceField::Open => Some(bar.open()),
            PriceField::High => Some(bar.high()),
            PriceField::Low => Some(bar.low()),
            PriceField::Close => Some(bar.close()),
            PriceField::Volume => bar.volume(),
            PriceField::Price => None,
        }
    }

    fn timestamp(&self, index: usize) -> Option<i64> {
        self.get(index)?.timestamp()
    }
}

impl<T: OHLCV> PriceSeries for Vec<T> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn has_field(&self, field: PriceField) -> bool {
        PriceSeries::has_field(self.as_slice(), field)
    }

    fn value(&self, field: PriceField, index: usize) -> Option<f64> {
        PriceSeries::value(self.as_slice(), field, index)
    }

    fn timestamp(&self, index: usize) -> Option<i64> {
        PriceSeries::timestamp(self.as_slice(), index)
    }
}

/// Fail with [`PatternError::Schema`] listing every absent field
pub fn require_fields<S: PriceSeries + ?Sized>(series: &S, fields: &[PriceField]) -> Result<()> {
    let missing: Vec<PriceField> = fields
        .iter()
        .copied()
        .filter(|f| !series.has_field(*f))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PatternError::Schema { missing })
    }
}

/// Check every row's OHLC consistency and strict timestamp ordering
pub fn validate_series<S: PriceSeries + ?Sized>(series: &S) -> Result<()> {
    let mut prev_ts: Option<i64> = None;
    for index in 0..series.len() {
        check_prices(
            series.value(PriceField::Open, index),
            series.value(PriceField::High, index),
            series.value(PriceField::Low, index),
            series.value(PriceField::Close, index),
        )
        .map_err(|reason| PatternError::InvalidOHLCV { index, reason })?;

        if let Some(ts) = series.timestamp(index) {
            if prev_ts.is_some_and(|prev| ts <= prev) {
                return Err(PatternError::UnorderedTimestamps { index });
            }
            prev_ts = Some(ts);
        }
    }
    Ok(())
}

pub(crate) fn check_prices(
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
) -> std::result::Result<(), &'static str> {
    let present = [open, high, low, close];
    if present.iter().flatten().any(|v| v.is_nan()) {
        return Err("NaN in OHLC");
    }
    if present.iter().flatten().any(|v| v.is_infinite()) {
        return Err("Infinite value in OHLC");
    }
    if let (Some(high), Some(low)) = (high, low) {
        if high < low {
            return Err("high < low");
        }
        if [open, close].into_iter().flatten().any(|v| v < low || v > high) {
            return Err("open/close outside high-low range");
        }
    }
    Ok(())
}

// ============================================================
// ANNOTATIONS
// ============================================================

/// Per-bar swing point state. Flags only ever move from `false` to `true`
/// within a detection pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwingFlags {
    pub is_swing_high: bool,
    pub is_swing_low: bool,
    pub swing_high_broken: bool,
    pub swing_low_broken: bool,
    /// Superseded by a newer same-type swing before being broken.
    /// Shared between the high and low side of the bar.
    pub swing_invalidated: bool,
}

/// Per-bar fair value gap flags, placed on the third bar of the window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapFlags {
    pub bullish_fvg: bool,
    pub bearish_fvg: bool,
}

/// Direction of a gap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwingKind {
    High,
    Low,
}

/// A detected swing point with its final state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwingPoint {
    pub index: usize,
    pub kind: SwingKind,
    pub price: f64,
    pub broken: bool,
    pub invalidated: bool,
}

/// A detected fair value gap with the bounds of the price void
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FairValueGap {
    /// Third bar of the window, where the flag is recorded
    pub index: usize,
    pub direction: Direction,
    pub top: f64,
    pub bottom: f64,
}

impl FairValueGap {
    #[inline]
    pub fn size(&self) -> f64 {
        self.top - self.bottom
    }
}

/// A price series together with detector output.
///
/// Borrows the input read-only; detectors write only to the owned flag
/// vectors, so the caller's series is never touched.
pub struct Annotated<'a, S: PriceSeries + ?Sized> {
    series: &'a S,
    pub(crate) swings: Vec<SwingFlags>,
    pub(crate) gaps: Vec<GapFlags>,
}

impl<'a, S: PriceSeries + ?Sized> Annotated<'a, S> {
    /// Unannotated view: every flag false
    pub fn new(series: &'a S) -> Self {
        let len = series.len();
        Self {
            series,
            swings: vec![SwingFlags::default(); len],
            gaps: vec![GapFlags::default(); len],
        }
    }

    #[inline]
    pub fn series(&self) -> &'a S {
        self.series
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.swings.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.swings.is_empty()
    }

    pub fn swings(&self) -> &[SwingFlags] {
        &self.swings
    }

    pub fn gaps(&self) -> &[GapFlags] {
        &self.gaps
    }

    pub fn swing_at(&self, index: usize) -> Option<SwingFlags> {
        self.swings.get(index).copied()
    }

    pub fn gap_at(&self, index: usize) -> Option<GapFlags> {
        self.gaps.get(index).copied()
    }

    /// Run swing point detection with default settings on this series
    pub fn with_swing_points(mut self) -> Result<Self> {
        detectors::SwingDetector::default().annotate(&mut self)?;
        Ok(self)
    }

    /// Run fair value gap detection with default settings on this series
    pub fn with_fair_value_gaps(mut self) -> Result<Self> {
        detectors::FairValueGapDetector::default().annotate(&mut self)?;
        Ok(self)
    }

    /// Create an iterator over bars with their flags.
    pub fn rows(&self) -> AnnotatedRows<'_> {
        AnnotatedRows::new(&self.swings, &self.gaps)
    }

    /// All flagged swing points in index order
    pub fn swing_points(&self) -> Vec<SwingPoint> {
        let mut points = Vec::new();
        for (index, flags) in self.swings.iter().enumerate() {
            if flags.is_swing_high {
                if let Some(price) = self.series.value(PriceField::High, index) {
                    points.push(SwingPoint {
                        index,
                        kind: SwingKind::High,
                        price,
                        broken: flags.swing_high_broken,
                        invalidated: flags.swing_invalidated,
                    });
                }
            }
            if flags.is_swing_low {
                if let Some(price) = self.series.value(PriceField::Low, index) {
                    points.push(SwingPoint {
                        index,
                        kind: SwingKind::Low,
                        price,
                        broken: flags.swing_low_broken,
                        invalidated: flags.swing_invalidated,
                    });
                }
            }
        }
        points
    }

    /// All flagged gaps in index order, with the void bounds
    pub fn fair_value_gaps(&self) -> Vec<FairValueGap> {
        let mut found = Vec::new();
        for (index, flags) in self.gaps.iter().enumerate() {
            if index < 2 {
                continue;
            }
            let first = index - 2;
            let value = |field, i| self.series.value(field, i);
            if flags.bearish_fvg {
                if let (Some(top), Some(bottom)) =
                    (value(PriceField::Low, first), value(PriceField::High, index))
                {
                    found.push(FairValueGap { index, direction: Direction::Bearish, top, bottom });
                }
            }
            if flags.bullish_fvg {
                if let (Some(top), Some(bottom)) =
                    (value(PriceField::Low, index), value(PriceField::High, first))
                {
                    found.push(FairValueGap { index, direction: Direction::Bullish, top, bottom });
                }
            }
        }
        found
    }
}

impl<S: PriceSeries + ?Sized> Clone for Annotated<'_, S> {
    fn clone(&self) -> Self {
        Self {
            series: self.series,
            swings: self.swings.clone(),
            gaps: self.gaps.clone(),
        }
    }
}

impl<S: PriceSeries + ?Sized> fmt::Debug for Annotated<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Annotated")
            .field("len", &self.len())
            .field("swings", &self.swings)
            .field("gaps", &self.gaps)
            .finish()
    }
}

// ============================================================
// ROW ITERATOR
// ============================================================

/// Flags found at a specific bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnotatedRow {
    pub index: usize,
    pub swing: SwingFlags,
    pub gap: GapFlags,
}

/// Iterator over bars with their flags
pub struct AnnotatedRows<'a> {
    swings: &'a [SwingFlags],
    gaps: &'a [GapFlags],
    current: usize,
}

impl<'a> AnnotatedRows<'a> {
    fn new(swings: &'a [SwingFlags], gaps: &'a [GapFlags]) -> Self {
        Self { swings, gaps, current: 0 }
    }
}

impl Iterator for AnnotatedRows<'_> {
    type Item = AnnotatedRow;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.current;
        let swing = *self.swings.get(index)?;
        let gap = self.gaps.get(index).copied().unwrap_or_default();
        self.current += 1;
        Some(AnnotatedRow { index, swing, gap })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.swings.len().saturating_sub(self.current);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for AnnotatedRows<'_> {}

// ============================================================
// DETECTOR TRAIT
// ============================================================

/// Unique identifier for a detector type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DetectorId(pub &'static str);

impl DetectorId {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

/// A structure detector writes its flags into an [`Annotated`] series.
pub trait StructureDetector: Send + Sync {
    fn id(&self) -> DetectorId;
    fn annotate<S: PriceSeries + ?Sized>(&self, annotated: &mut Annotated<'_, S>) -> Result<()>;
}

// ============================================================
// BUILTIN DETECTORS - generated via macro
// ============================================================

use detectors::*;

/// Macro to generate BuiltinDetector enum without boilerplate
macro_rules! define_builtin_detectors {
    (
        $(
            $variant:ident($detector:ty)
        ),* $(,)?
    ) => {
        /// All builtin detectors - enum dispatch
        #[derive(Debug, Clone)]
        pub enum BuiltinDetector {
            $($variant($detector)),*
        }

        impl BuiltinDetector {
            #[inline]
            pub fn annotate<S: PriceSeries + ?Sized>(
                &self,
                annotated: &mut Annotated<'_, S>,
            ) -> Result<()> {
                match self {
                    $(Self::$variant(d) => StructureDetector::annotate(d, annotated)),*
                }
            }

            #[inline]
            pub fn id(&self) -> DetectorId {
                match self {
                    $(Self::$variant(d) => StructureDetector::id(d)),*
                }
            }
        }
    };
}

define_builtin_detectors! {
    SwingPoints(SwingDetector),
    FairValueGaps(FairValueGapDetector),
}

// ============================================================
// STRUCTURE ENGINE
// ============================================================

/// Bars above which extremum marking fans out across the rayon pool
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 16_384;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub swings: bool,
    pub fair_value_gaps: bool,
    /// Most-recent-N bars considered when extracting signals
    pub lookback: Option<Period>,
    pub validate_data: bool,
    /// Raise `InsufficientData` on series shorter than 3 bars instead of
    /// returning an all-false annotation
    pub strict_min_bars: bool,
    pub parallel_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            swings: true,
            fair_value_gaps: true,
            lookback: None,
            validate_data: false,
            strict_min_bars: false,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

/// Main structure detection engine
#[derive(Debug, Clone)]
pub struct StructureEngine {
    builtin: Vec<BuiltinDetector>,
    config: EngineConfig,
}

impl Default for StructureEngine {
    fn default() -> Self {
        Self::from_config(EngineConfig::default())
    }
}

impl StructureEngine {
    fn from_config(config: EngineConfig) -> Self {
        let mut builtin = Vec::new();
        if config.swings {
            builtin.push(BuiltinDetector::SwingPoints(SwingDetector {
                strict_min_bars: config.strict_min_bars,
                parallel_threshold: config.parallel_threshold,
            }));
        }
        if config.fair_value_gaps {
            builtin.push(BuiltinDetector::FairValueGaps(FairValueGapDetector {
                strict_min_bars: config.strict_min_bars,
            }));
        }
        Self { builtin, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn detectors(&self) -> &[BuiltinDetector] {
        &self.builtin
    }

    /// Run every configured detector over the series.
    pub fn scan<'a, S: PriceSeries + ?Sized>(&self, series: &'a S) -> Result<Annotated<'a, S>> {
        if self.config.validate_data {
            validate_series(series)?;
        }

        let mut annotated = Annotated::new(series);
        for detector in &self.builtin {
            detector.annotate(&mut annotated)?;
        }

        debug!(
            bars = annotated.len(),
            detectors = self.builtin.len(),
            "structure scan complete"
        );
        Ok(annotated)
    }

    /// Swing detection only, with this engine's settings
    pub fn scan_swings<'a, S: PriceSeries + ?Sized>(
        &self,
        series: &'a S,
    ) -> Result<Annotated<'a, S>> {
        if self.config.validate_data {
            validate_series(series)?;
        }
        let mut annotated = Annotated::new(series);
        SwingDetector {
            strict_min_bars: self.config.strict_min_bars,
            parallel_threshold: self.config.parallel_threshold,
        }
        .annotate(&mut annotated)?;
        Ok(annotated)
    }

    /// Fair value gap detection only, with this engine's settings
    pub fn scan_fair_value_gaps<'a, S: PriceSeries + ?Sized>(
        &self,
        series: &'a S,
    ) -> Result<Annotated<'a, S>> {
        if self.config.validate_data {
            validate_series(series)?;
        }
        let mut annotated = Annotated::new(series);
        FairValueGapDetector { strict_min_bars: self.config.strict_min_bars }
            .annotate(&mut annotated)?;
        Ok(annotated)
    }

    /// Latest levels within the configured lookback
    pub fn signals<S: PriceSeries + ?Sized>(&self, annotated: &Annotated<'_, S>) -> SignalRecord {
        SignalRecord::from_annotated(annotated, self.config.lookback)
    }

    fn validate(&self) -> Result<()> {
        if self.builtin.is_empty() {
            return Err(PatternError::InvalidConfig(
                "at least one detector must be enabled".to_string(),
            ));
        }
        Ok(())
    }
}

use signals::SignalRecord;

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating StructureEngine instances
#[derive(Debug, Clone)]
pub struct EngineBuilder {
    config: EngineConfig,
    lookback: Option<usize>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    /// Start with no detectors enabled
    pub fn new() -> Self {
        Self {
            config: EngineConfig {
                swings: false,
                fair_value_gaps: false,
                ..EngineConfig::default()
            },
            lookback: None,
        }
    }

    /// Start from a deserialized configuration
    pub fn from_config(config: EngineConfig) -> Self {
        let lookback = config.lookback.map(Period::get);
        Self { config, lookback }
    }

    /// Enable both detectors
    pub fn with_all_defaults(self) -> Self {
        self.with_swings().with_fair_value_gaps()
    }

    pub fn with_swings(mut self) -> Self {
        self.config.swings = true;
        self
    }

    pub fn with_fair_value_gaps(mut self) -> Self {
        self.config.fair_value_gaps = true;
        self
    }

    /// Bound signal extraction to the most recent `bars` bars
    pub fn lookback(mut self, bars: usize) -> Self {
        self.lookback = Some(bars);
        self
    }

    /// Enable/disable data validation
    pub fn validate_data(mut self, enable: bool) -> Self {
        self.config.validate_data = enable;
        self
    }

    /// Fail on series shorter than the 3-bar window
    pub fn strict_min_bars(mut self, enable: bool) -> Self {
        self.config.strict_min_bars = enable;
        self
    }

    pub fn parallel_threshold(mut self, bars: usize) -> Self {
        self.config.parallel_threshold = bars;
        self
    }

    /// Build the engine
    pub fn build(mut self) -> Result<StructureEngine> {
        self.config.lookback = self.lookback.map(Period::new).transpose()?;
        let engine = StructureEngine::from_config(self.config);
        engine.validate()?;
        Ok(engine)
    }
}

// ============================================================
// PARALLEL SCANNING
// ============================================================

use rayon::prelude::*;

/// Result of scanning a single instrument
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub symbol: String,
    pub signals: SignalRecord,
    pub swing_points: Vec<SwingPoint>,
    pub fair_value_gaps: Vec<FairValueGap>,
}

/// Error from scanning a single instrument
#[derive(Debug)]
pub struct ScanError {
    pub symbol: String,
    pub error: PatternError,
}

/// Parallel scanning of multiple independent instruments
pub fn scan_parallel<'a, S, I>(
    engine: &StructureEngine,
    instruments: I,
) -> (Vec<ScanResult>, Vec<ScanError>)
where
    S: PriceSeries + Sync + ?Sized + 'a,
    I: IntoParallelIterator<Item = (&'a str, &'a S)>,
{
    let results: Vec<_> = instruments
        .into_par_iter()
        .map(|(symbol, series)| {
            engine
                .scan(series)
                .map(|annotated| ScanResult {
                    symbol: symbol.to_string(),
                    signals: engine.signals(&annotated),
                    swing_points: annotated.swing_points(),
                    fair_value_gaps: annotated.fair_value_gaps(),
                })
                .map_err(|error| ScanError {
                    symbol: symbol.to_string(),
                    error,
                })
        })
        .collect();

    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => errors.push(e),
        }
    }

    (successes, errors)
}

// ============================================================
// TESTS
// ============================================================
