//! Strategy wrapper around the structure engine
//!
//! A strategy runs detection and exposes the latest levels as a
//! [`SignalRecord`]. It holds no detection logic of its own.

use tracing::info;

use crate::{signals::SignalRecord, Annotated, PriceSeries, Result, StructureEngine};

/// Analyze a series and expose the resulting signals
pub trait Strategy {
  fn name(&self) -> &str;

  /// Run detection over `series`, replacing the current signal record
  fn analyze<'a, S: PriceSeries + ?Sized>(&mut self, series: &'a S) -> Result<Annotated<'a, S>>;

  /// Signals from the most recent `analyze` call
  fn signals(&self) -> SignalRecord;
}

/// Trades reversals at liquidity levels marked by swing points and gaps
#[derive(Debug, Clone)]
pub struct LiquidityReversalSniper {
  engine: StructureEngine,
  last: SignalRecord,
}

impl Default for LiquidityReversalSniper {
  fn default() -> Self {
    Self::new()
  }
}

impl LiquidityReversalSniper {
  pub const NAME: &'static str = "Liquidity Reversal Sniper";

  pub fn new() -> Self {
    Self::with_engine(StructureEngine::default())
  }

  pub fn with_engine(engine: StructureEngine) -> Self {
    Self { engine, last: SignalRecord::default() }
  }

  pub fn engine(&self) -> &StructureEngine {
    &self.engine
  }

  /// Swing structure from the higher `setup` timeframe, gaps from the
  /// lower `trade` timeframe.
  pub fn analyze_timeframes<'s, 't, S, T>(
    &mut self,
    setup: &'s S,
    trade: &'t T,
  ) -> Result<(Annotated<'s, S>, Annotated<'t, T>)>
  where
    S: PriceSeries + ?Sized,
    T: PriceSeries + ?Sized,
  {
    let setup_annotated = self.engine.scan_swings(setup)?;
    let trade_annotated = self.engine.scan_fair_value_gaps(trade)?;

    let from_setup = self.engine.signals(&setup_annotated);
    let from_trade = self.engine.signals(&trade_annotated);
    self.last = SignalRecord {
      last_swing_high: from_setup.last_swing_high,
      last_swing_low: from_setup.last_swing_low,
      last_bullish_fvg: from_trade.last_bullish_fvg,
      last_bearish_fvg: from_trade.last_bearish_fvg,
    };

    info!(
      strategy = Self::NAME,
      setup_bars = setup_annotated.len(),
      trade_bars = trade_annotated.len(),
      "multi-timeframe analysis complete"
    );
    Ok((setup_annotated, trade_annotated))
  }
}

impl Strategy for LiquidityReversalSniper {
  fn name(&self) -> &str {
    Self::NAME
  }

  fn analyze<'a, S: PriceSeries + ?Sized>(&mut self, series: &'a S) -> Result<Annotated<'a, S>> {
    let annotated = self.engine.scan(series)?;
    self.last = self.engine.signals(&annotated);
    info!(strategy = Self::NAME, bars = annotated.len(), "analysis complete");
    Ok(annotated)
  }

  fn signals(&self) -> SignalRecord {
    self.last
  }
}
