use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A trading symbol, e.g. "ETH" or "BTC".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol(pub String);

impl Symbol {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

/// The side of an order. Position direction is carried by the sign of
/// `Position::size`, not by a side field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// +1 for buys, -1 for sells, as a `Decimal` multiplier.
    pub fn sign(&self) -> Decimal {
        match self {
            Side::Buy => Decimal::ONE,
            Side::Sell => Decimal::NEGATIVE_ONE,
        }
    }

    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    Market,
    Limit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    #[default]
    Gtc,
    Ioc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Open,
    Filled,
    Cancelled,
    Rejected,
}

/// One OHLCV bar. Timestamps are unix milliseconds of the bar open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp_ms: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// A point-in-time quote for a symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketData {
    pub symbol: Symbol,
    pub bid: Decimal,
    pub ask: Decimal,
    pub last_price: Decimal,
    pub volume_24h: Decimal,
    pub timestamp_ms: i64,
}

/// An open position. `size` is signed: positive is long, negative is short.
/// `entry_price` is the volume-weighted average of the fills that built it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: Symbol,
    pub size: Decimal,
    pub entry_price: Decimal,
    pub mark_price: Decimal,
    pub unrealized_pnl: Decimal,
    pub leverage: u32,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.size > Decimal::ZERO
    }

    /// Dollar exposure at the current mark.
    pub fn notional(&self) -> Decimal {
        self.size.abs() * self.mark_price
    }
}

/// A request to place an order, as accepted by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: Symbol,
    pub side: Side,
    pub size: Decimal,
    pub kind: OrderKind,
    pub limit_price: Option<Decimal>,
    #[serde(default)]
    pub reduce_only: bool,
    #[serde(default)]
    pub time_in_force: TimeInForce,
}

/// An order as tracked by the ledger.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: u64,
    pub symbol: Symbol,
    pub side: Side,
    pub size: Decimal,
    pub kind: OrderKind,
    pub limit_price: Option<Decimal>,
    pub time_in_force: TimeInForce,
    pub reduce_only: bool,
    pub status: OrderStatus,
    pub created_at_ms: i64,
}

/// The gateway's answer to `place_order`. A market order that executed
/// immediately carries its fill; a resting limit order carries none.
#[derive(Debug, Clone)]
pub struct OrderAck {
    pub order_id: u64,
    pub status: OrderStatus,
    pub fill: Option<Fill>,
}

/// The event of an order being matched and executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub symbol: Symbol,
    pub side: Side,
    pub size: Decimal,
    pub price: Decimal,
    pub fee: Decimal,
    pub timestamp_ms: i64,
}

/// A consistent, point-in-time copy of the whole account. This is what the
/// risk controller evaluates; it is never mutated after being taken.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountState {
    pub cash: Decimal,
    pub equity: Decimal,
    pub total_notional: Decimal,
    pub daily_realized_pnl: Decimal,
    pub peak_equity: Decimal,
    /// Fractional decline from `peak_equity`, in [0, 1].
    pub drawdown: Decimal,
    pub open_positions: usize,
}

/// What a strategy wants done. Sizing and order shape are the strategy's
/// call; the worker turns this into an `OrderRequest` and executes it.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Enter {
        side: Side,
        size: Decimal,
        kind: OrderKind,
        limit_price: Option<Decimal>,
    },
    /// Close the full open position with a reduce-only market order.
    Exit,
}
