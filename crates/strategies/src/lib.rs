use core_types::{Candle, MarketData, Position, Signal};

pub mod breakout;
pub mod factory;
pub mod mean_reversion;
pub mod types;

/// Everything a strategy may look at for one analysis cycle. The worker
/// assembles this from the gateway; strategies never touch the gateway or
/// the ledger themselves.
#[derive(Debug, Clone)]
pub struct MarketView {
    pub market: MarketData,
    /// Recent candles, oldest first.
    pub candles: Vec<Candle>,
    /// The open position for this strategy's symbol, if any.
    pub position: Option<Position>,
}

/// The universal interface for a trading strategy.
///
/// A strategy is a stateful entity that inspects a `MarketView` and may ask
/// for an order. The heuristics inside are pluggable and replaceable; the
/// engine only cares about this contract.
pub trait Strategy: Send + Sync + std::fmt::Debug {
    /// The name of the strategy.
    fn name(&self) -> &'static str;

    /// Desired polling interval for the live engine, in seconds. Ignored by
    /// the backtest orchestrator, which runs one cycle per candle.
    fn interval_secs(&self) -> u64;

    /// Inspects the market and returns a signal, or `None` to do nothing.
    fn analyze(&mut self, view: &MarketView) -> Option<Signal>;
}
