//! In-memory exchange used for backtesting. Implements the full `Gateway`
//! contract against a caller-supplied tick stream: no network, no
//! randomness, no wall clock. Given the same candle sequence and the same
//! order flow, two runs produce identical fill histories.

pub mod types;

pub use types::SimulatorSettings;

use async_trait::async_trait;
use core_types::{
    AccountState, Candle, Fill, MarketData, OrderAck, OrderKind, OrderRequest, OrderStatus,
    Position, Side, Symbol,
};
use events::{Event, EventBus};
use gateway::{AccountInfo, Error, Gateway, Result};
use ledger::Ledger;
use num_traits::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

pub struct Simulator {
    fee_rate: Decimal,
    ledger: Ledger,
    prices: Mutex<HashMap<Symbol, Decimal>>,
    candles: Mutex<HashMap<Symbol, Vec<Candle>>>,
    /// Simulated time: the timestamp of the most recent tick.
    clock_ms: AtomicI64,
    halted: AtomicBool,
    fills: Mutex<Vec<Fill>>,
    bus: EventBus,
}

impl Simulator {
    pub fn new(settings: SimulatorSettings, bus: EventBus) -> Self {
        let initial_cash = Decimal::from_f64(settings.initial_cash).unwrap_or(dec!(100_000));
        let fee_rate =
            Decimal::from_f64(settings.taker_fee_bps).unwrap_or(dec!(2.5)) / dec!(10_000);
        Self {
            fee_rate,
            ledger: Ledger::new(initial_cash),
            prices: Mutex::new(HashMap::new()),
            candles: Mutex::new(HashMap::new()),
            clock_ms: AtomicI64::new(0),
            halted: AtomicBool::new(false),
            fills: Mutex::new(Vec::new()),
            bus,
        }
    }

    /// Advances simulated time and the current price for `symbol`, then
    /// re-marks the open position. Drives the entire simulation clock.
    pub fn update_market_state(&self, symbol: &Symbol, candle: &Candle) {
        self.prices
            .lock()
            .expect("simulator prices poisoned")
            .insert(symbol.clone(), candle.close);
        self.clock_ms.store(candle.timestamp_ms, Ordering::Relaxed);
        self.candles
            .lock()
            .expect("simulator candles poisoned")
            .entry(symbol.clone())
            .or_default()
            .push(candle.clone());
        self.ledger.mark_to_market(symbol, candle.close);
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Relaxed)
    }

    /// Every fill executed so far, in execution order.
    pub fn fill_history(&self) -> Vec<Fill> {
        self.fills.lock().expect("simulator fills poisoned").clone()
    }

    /// Consistent snapshot of the simulated account.
    pub fn account_snapshot(&self) -> AccountState {
        self.ledger.snapshot_account()
    }

    fn now_ms(&self) -> i64 {
        self.clock_ms.load(Ordering::Relaxed)
    }

    fn current_price(&self, symbol: &Symbol) -> Option<Decimal> {
        self.prices
            .lock()
            .expect("simulator prices poisoned")
            .get(symbol)
            .copied()
    }

    /// Matches one fill against the ledger, charging the taker fee on
    /// notional, and records it in the fill history.
    fn execute_fill(&self, symbol: &Symbol, side: Side, size: Decimal, price: Decimal)
        -> Result<Fill> {
        let fill = Fill {
            symbol: symbol.clone(),
            side,
            size,
            price,
            fee: size * price * self.fee_rate,
            timestamp_ms: self.now_ms(),
        };

        self.ledger
            .apply_fill(&fill)
            .map_err(|e| Error::OrderRejected { reason: e.to_string() })?;

        tracing::debug!(
            symbol = %symbol.0,
            side = ?side,
            size = %size,
            price = %price,
            "Simulated fill executed."
        );
        self.fills
            .lock()
            .expect("simulator fills poisoned")
            .push(fill.clone());
        self.bus.publish(Event::TradeExecuted(fill.clone()));
        Ok(fill)
    }
}

#[async_trait]
impl Gateway for Simulator {
    fn name(&self) -> &'static str {
        "SimulatedExchange"
    }

    async fn get_market_data(&self, symbol: &Symbol) -> Result<MarketData> {
        let price = self
            .current_price(symbol)
            .ok_or_else(|| Error::NoMarketData(symbol.0.clone()))?;
        let volume = self
            .candles
            .lock()
            .expect("simulator candles poisoned")
            .get(symbol)
            .and_then(|c| c.last())
            .map(|c| c.volume)
            .unwrap_or(Decimal::ZERO);
        Ok(MarketData {
            symbol: symbol.clone(),
            bid: price,
            ask: price,
            last_price: price,
            volume_24h: volume,
            timestamp_ms: self.now_ms(),
        })
    }

    /// Returns the tail of the tick stream pushed so far, oldest first. The
    /// simulator keeps a single stream per symbol; `timeframe` is ignored.
    async fn get_ohlcv(
        &self,
        symbol: &Symbol,
        _timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        let candles = self.candles.lock().expect("simulator candles poisoned");
        let Some(history) = candles.get(symbol) else {
            return Ok(Vec::new());
        };
        let start = history.len().saturating_sub(limit);
        Ok(history[start..].to_vec())
    }

    async fn get_positions(&self) -> Result<Vec<Position>> {
        Ok(self.ledger.positions())
    }

    async fn get_account_info(&self) -> Result<AccountInfo> {
        let snapshot = self.ledger.snapshot_account();
        Ok(AccountInfo {
            account_value: snapshot.equity,
            total_notional: snapshot.total_notional,
            available_balance: snapshot.cash,
        })
    }

    /// Market orders fill immediately at the current price. Limit orders
    /// fill immediately only if the current price has already crossed the
    /// limit; otherwise they rest Open and are NOT re-evaluated on later
    /// ticks — cross-only matching, a strategy must re-submit or abandon.
    async fn place_order(&self, request: &OrderRequest) -> Result<OrderAck> {
        if self.is_halted() {
            return Err(Error::Halted);
        }
        if request.size <= Decimal::ZERO {
            return Err(Error::OrderRejected {
                reason: format!("size must be positive, got {}", request.size),
            });
        }
        let current_price = self
            .current_price(&request.symbol)
            .ok_or_else(|| Error::NoMarketData(request.symbol.0.clone()))?;

        // Reduce-only orders are capped to the opposite-side size and can
        // never flip the position.
        let mut size = request.size;
        if request.reduce_only {
            let cap = self.ledger.reducible_size(&request.symbol, request.side);
            if cap == Decimal::ZERO {
                return Err(Error::OrderRejected {
                    reason: "reduce-only order with no opposite position".into(),
                });
            }
            size = size.min(cap);
        }

        match request.kind {
            OrderKind::Market => {
                let fill = self.execute_fill(&request.symbol, request.side, size, current_price)?;
                let order = self
                    .ledger
                    .register_order(request, OrderStatus::Filled, self.now_ms());
                Ok(OrderAck {
                    order_id: order.id,
                    status: OrderStatus::Filled,
                    fill: Some(fill),
                })
            }
            OrderKind::Limit => {
                let limit_price = request.limit_price.ok_or_else(|| Error::OrderRejected {
                    reason: "limit order without a limit price".into(),
                })?;
                let crossed = match request.side {
                    Side::Buy => current_price <= limit_price,
                    Side::Sell => current_price >= limit_price,
                };
                if crossed {
                    let fill =
                        self.execute_fill(&request.symbol, request.side, size, limit_price)?;
                    let order = self
                        .ledger
                        .register_order(request, OrderStatus::Filled, self.now_ms());
                    Ok(OrderAck {
                        order_id: order.id,
                        status: OrderStatus::Filled,
                        fill: Some(fill),
                    })
                } else {
                    let order = self
                        .ledger
                        .register_order(request, OrderStatus::Open, self.now_ms());
                    Ok(OrderAck {
                        order_id: order.id,
                        status: OrderStatus::Open,
                        fill: None,
                    })
                }
            }
        }
    }

    async fn cancel_all_orders(&self, symbol: Option<&Symbol>) -> Result<()> {
        let cancelled = self.ledger.cancel_all(symbol);
        tracing::info!(cancelled, "Cancelled open orders.");
        Ok(())
    }

    /// Cancels all open orders, then flattens every non-zero position with
    /// reduce-only market fills. Halts the exchange: any later
    /// `place_order` is refused. Idempotent.
    async fn kill_switch(&self, symbol: Option<&Symbol>) -> Result<()> {
        self.halted.store(true, Ordering::Relaxed);
        self.ledger.cancel_all(symbol);

        for position in self.ledger.positions() {
            if let Some(filter) = symbol
                && &position.symbol != filter
            {
                continue;
            }
            if position.size == Decimal::ZERO {
                continue;
            }
            let side = if position.is_long() { Side::Sell } else { Side::Buy };
            let price = match self.current_price(&position.symbol) {
                Some(p) => p,
                None => position.mark_price,
            };
            match self.execute_fill(&position.symbol, side, position.size.abs(), price) {
                Ok(_) => {
                    tracing::warn!(symbol = %position.symbol.0, "Position flattened by kill switch.");
                }
                Err(e) => {
                    // Best effort: keep flattening the rest.
                    tracing::error!(symbol = %position.symbol.0, error = %e, "Failed to flatten position.");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(ts: i64, price: Decimal) -> Candle {
        Candle {
            timestamp_ms: ts,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: dec!(1_000),
        }
    }

    fn market(symbol: &str, side: Side, size: Decimal) -> OrderRequest {
        OrderRequest {
            symbol: Symbol::new(symbol),
            side,
            size,
            kind: OrderKind::Market,
            limit_price: None,
            reduce_only: false,
            time_in_force: Default::default(),
        }
    }

    fn limit(symbol: &str, side: Side, size: Decimal, price: Decimal) -> OrderRequest {
        OrderRequest {
            symbol: Symbol::new(symbol),
            side,
            size,
            kind: OrderKind::Limit,
            limit_price: Some(price),
            reduce_only: false,
            time_in_force: Default::default(),
        }
    }

    fn sim() -> Simulator {
        Simulator::new(SimulatorSettings::default(), EventBus::new(16))
    }

    #[tokio::test]
    async fn market_order_fills_at_current_price_with_taker_fee() {
        let sim = sim();
        let eth = Symbol::new("ETH");
        sim.update_market_state(&eth, &candle(1, dec!(2_000)));

        let ack = sim.place_order(&market("ETH", Side::Buy, dec!(1))).await.unwrap();
        assert_eq!(ack.status, OrderStatus::Filled);
        let fill = ack.fill.unwrap();
        assert_eq!(fill.price, dec!(2_000));
        // 2.5 bps of 2000 notional.
        assert_eq!(fill.fee, dec!(0.5));

        let info = sim.get_account_info().await.unwrap();
        assert_eq!(info.available_balance, dec!(100_000) - dec!(2_000) - dec!(0.5));
        assert_eq!(info.account_value, dec!(100_000) - dec!(0.5));
    }

    #[tokio::test]
    async fn crossed_limit_fills_at_limit_price() {
        let sim = sim();
        let eth = Symbol::new("ETH");
        sim.update_market_state(&eth, &candle(1, dec!(95)));

        // Buy limit above the market is already crossed.
        let ack = sim
            .place_order(&limit("ETH", Side::Buy, dec!(1), dec!(100)))
            .await
            .unwrap();
        assert_eq!(ack.status, OrderStatus::Filled);
        assert_eq!(ack.fill.unwrap().price, dec!(100));
    }

    #[tokio::test]
    async fn uncrossed_limit_rests_open_and_is_never_reevaluated() {
        let sim = sim();
        let eth = Symbol::new("ETH");
        sim.update_market_state(&eth, &candle(1, dec!(100)));

        let ack = sim
            .place_order(&limit("ETH", Side::Buy, dec!(1), dec!(90)))
            .await
            .unwrap();
        assert_eq!(ack.status, OrderStatus::Open);
        assert!(ack.fill.is_none());

        // The price later crosses the limit, but resting orders are
        // abandoned rather than matched.
        sim.update_market_state(&eth, &candle(2, dec!(85)));
        assert!(sim.fill_history().is_empty());
        assert_eq!(sim.ledger.open_orders(None).len(), 1);
    }

    #[tokio::test]
    async fn reduce_only_is_capped_and_never_flips() {
        let sim = sim();
        let eth = Symbol::new("ETH");
        sim.update_market_state(&eth, &candle(1, dec!(100)));
        sim.place_order(&market("ETH", Side::Buy, dec!(10))).await.unwrap();

        let mut close = market("ETH", Side::Sell, dec!(15));
        close.reduce_only = true;
        let ack = sim.place_order(&close).await.unwrap();
        assert_eq!(ack.fill.unwrap().size, dec!(10));
        assert!(sim.get_positions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reduce_only_without_position_is_rejected() {
        let sim = sim();
        let eth = Symbol::new("ETH");
        sim.update_market_state(&eth, &candle(1, dec!(100)));

        let mut close = market("ETH", Side::Sell, dec!(1));
        close.reduce_only = true;
        let err = sim.place_order(&close).await.unwrap_err();
        assert!(matches!(err, Error::OrderRejected { .. }));
    }

    #[tokio::test]
    async fn order_without_price_data_is_rejected() {
        let sim = sim();
        let err = sim
            .place_order(&market("ETH", Side::Buy, dec!(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoMarketData(_)));
    }

    #[tokio::test]
    async fn kill_switch_flattens_cancels_and_halts_idempotently() {
        let sim = sim();
        let eth = Symbol::new("ETH");
        let btc = Symbol::new("BTC");
        sim.update_market_state(&eth, &candle(1, dec!(100)));
        sim.update_market_state(&btc, &candle(2, dec!(50)));
        sim.place_order(&market("ETH", Side::Buy, dec!(5))).await.unwrap();
        sim.place_order(&market("BTC", Side::Sell, dec!(2))).await.unwrap();
        sim.place_order(&limit("ETH", Side::Buy, dec!(1), dec!(90))).await.unwrap();

        sim.kill_switch(None).await.unwrap();
        let after_first = sim.account_snapshot();
        assert!(sim.get_positions().await.unwrap().is_empty());
        assert!(sim.ledger.open_orders(None).is_empty());

        // Second trip is a no-op with the same end state.
        sim.kill_switch(None).await.unwrap();
        let after_second = sim.account_snapshot();
        assert_eq!(after_first, after_second);

        // Once halted, every order from any caller is refused.
        let err = sim.place_order(&market("ETH", Side::Buy, dec!(1))).await.unwrap_err();
        assert!(matches!(err, Error::Halted));
    }

    #[tokio::test]
    async fn replay_is_deterministic() {
        let run = || async {
            let sim = sim();
            let eth = Symbol::new("ETH");
            for (i, price) in [100, 102, 99, 104, 101, 107].into_iter().enumerate() {
                sim.update_market_state(&eth, &candle(i as i64, Decimal::from(price)));
                if i % 2 == 0 {
                    sim.place_order(&market("ETH", Side::Buy, dec!(1))).await.unwrap();
                } else {
                    sim.place_order(&market("ETH", Side::Sell, dec!(1))).await.unwrap();
                }
            }
            (sim.fill_history(), sim.account_snapshot())
        };

        let (fills_a, account_a) = run().await;
        let (fills_b, account_b) = run().await;
        assert_eq!(fills_a, fills_b);
        assert_eq!(account_a, account_b);
    }

    #[tokio::test]
    async fn unrealized_gain_makes_a_new_peak_without_drawdown() {
        // Candles [100, 100, 100, 130], buy 1 at the first tick: by the
        // fourth tick unrealized PnL is 30 and drawdown is 0 (new peak).
        let sim = sim();
        let eth = Symbol::new("ETH");
        sim.update_market_state(&eth, &candle(1, dec!(100)));
        sim.place_order(&market("ETH", Side::Buy, dec!(1))).await.unwrap();
        for (ts, price) in [(2, dec!(100)), (3, dec!(100)), (4, dec!(130))] {
            sim.update_market_state(&eth, &candle(ts, price));
        }

        let position = &sim.get_positions().await.unwrap()[0];
        assert_eq!(position.unrealized_pnl, dec!(30));
        let snapshot = sim.account_snapshot();
        assert_eq!(snapshot.drawdown, dec!(0));
        assert_eq!(snapshot.peak_equity, snapshot.equity);
    }
}
