use async_trait::async_trait;
use core_types::{Candle, MarketData, OrderAck, OrderRequest, Position, Symbol};
use rust_decimal::Decimal;

pub mod error;

// Re-export public types
pub use error::{Error, Result};

/// Account-level numbers as reported by the exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountInfo {
    pub account_value: Decimal,
    pub total_notional: Decimal,
    pub available_balance: Decimal,
}

/// The universal interface to an exchange.
///
/// The core consumes the gateway only through this trait; it is implemented
/// by a live exchange client or by the deterministic market simulator, and a
/// strategy must behave identically against either. Every method a worker
/// calls is expected to be wrapped in a bounded timeout by the caller.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// The name of the gateway (e.g. "SimulatedExchange").
    fn name(&self) -> &'static str;

    /// Current quote for a symbol.
    async fn get_market_data(&self, symbol: &Symbol) -> Result<MarketData>;

    /// Recent candles for a symbol, oldest first.
    async fn get_ohlcv(&self, symbol: &Symbol, timeframe: &str, limit: usize)
        -> Result<Vec<Candle>>;

    /// All open positions.
    async fn get_positions(&self) -> Result<Vec<Position>>;

    /// Account value, aggregate notional exposure and available balance.
    async fn get_account_info(&self) -> Result<AccountInfo>;

    /// Submits an order. Market orders either fill or are rejected; limit
    /// orders may rest Open. A fill, when immediate, rides on the ack.
    async fn place_order(&self, request: &OrderRequest) -> Result<OrderAck>;

    /// Cancels every open order, optionally scoped to one symbol.
    async fn cancel_all_orders(&self, symbol: Option<&Symbol>) -> Result<()>;

    /// Emergency action: cancel all open orders, then flatten every
    /// non-zero position at market with reduce-only orders. Idempotent.
    async fn kill_switch(&self, symbol: Option<&Symbol>) -> Result<()>;
}
