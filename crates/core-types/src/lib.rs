pub mod strategy;
pub mod types;

// Re-export the most important types for easy access from other crates.
pub use strategy::StrategyConfig;
pub use types::{
    AccountState, Candle, Fill, MarketData, Order, OrderAck, OrderKind, OrderRequest, OrderStatus,
    Position, Side, Signal, Symbol, TimeInForce,
};
