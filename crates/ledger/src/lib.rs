//! The single authoritative record of cash, open positions and in-flight
//! orders. Every mutation goes through one of the entry points below; all
//! other components hold read-only snapshots or issue mutation requests.
//!
//! Accounting model: cash moves by the full notional of every fill
//! (`-size*price - fee` on buys, `+size*price - fee` on sells), so account
//! equity is `cash + sum(size * mark_price)` over all open positions.

pub mod error;

pub use error::{Error, Result};

use core_types::{
    AccountState, Fill, Order, OrderRequest, OrderStatus, Position, Side, Symbol,
};
use rust_decimal::Decimal;
use rust_decimal::prelude::Signed;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// The result of applying one fill.
#[derive(Debug, Clone)]
pub struct FillOutcome {
    /// PnL realized by the portion of the fill that reduced or closed an
    /// opposite-side position. Excludes fees (fees only touch cash).
    pub realized_pnl: Decimal,
    /// The position after the fill; `None` when the fill closed it exactly.
    pub position: Option<Position>,
}

#[derive(Debug, Default)]
struct SymbolBook {
    position: Option<Position>,
}

#[derive(Debug)]
struct Account {
    cash: Decimal,
    daily_realized_pnl: Decimal,
    /// Signed sum of `size * mark_price` over all open positions.
    position_value: Decimal,
    peak_equity: Decimal,
}

impl Account {
    fn equity(&self) -> Decimal {
        self.cash + self.position_value
    }

    fn roll_peak(&mut self) {
        let equity = self.equity();
        if equity > self.peak_equity {
            self.peak_equity = equity;
        }
    }
}

pub struct Ledger {
    /// Fills and marks hold this shared; `snapshot_account` holds it
    /// exclusively, so a snapshot can never observe a half-applied fill.
    snapshot_gate: RwLock<()>,
    /// One slot per symbol. Same-symbol fills serialize on the slot mutex;
    /// different symbols proceed independently.
    symbols: Mutex<HashMap<Symbol, Arc<Mutex<SymbolBook>>>>,
    account: Mutex<Account>,
    orders: Mutex<HashMap<u64, Order>>,
    next_order_id: AtomicU64,
}

impl Ledger {
    pub fn new(initial_cash: Decimal) -> Self {
        Self {
            snapshot_gate: RwLock::new(()),
            symbols: Mutex::new(HashMap::new()),
            account: Mutex::new(Account {
                cash: initial_cash,
                daily_realized_pnl: Decimal::ZERO,
                position_value: Decimal::ZERO,
                peak_equity: initial_cash,
            }),
            orders: Mutex::new(HashMap::new()),
            next_order_id: AtomicU64::new(1),
        }
    }

    fn slot(&self, symbol: &Symbol) -> Arc<Mutex<SymbolBook>> {
        let mut map = self.symbols.lock().expect("ledger symbol map poisoned");
        map.entry(symbol.clone())
            .or_insert_with(|| Arc::new(Mutex::new(SymbolBook::default())))
            .clone()
    }

    /// Applies one fill as a single atomic step for its symbol: extends,
    /// reduces or flips the position, and moves cash by notional and fee.
    ///
    /// A fill whose resulting cash would be negative is rejected with
    /// nothing applied. A sell that opens or extends a short adds cash, so
    /// this floor cannot bound short exposure; that is the risk
    /// controller's max-notional rule.
    pub fn apply_fill(&self, fill: &Fill) -> Result<FillOutcome> {
        if fill.size <= Decimal::ZERO {
            return Err(Error::InvalidSize(fill.size));
        }
        if fill.price <= Decimal::ZERO {
            return Err(Error::InvalidPrice(fill.price));
        }

        let _gate = self.snapshot_gate.read().expect("ledger gate poisoned");
        let slot = self.slot(&fill.symbol);
        let mut book = slot.lock().expect("ledger symbol slot poisoned");

        let signed = fill.side.sign() * fill.size;
        let cash_delta = match fill.side {
            Side::Buy => -(fill.size * fill.price) - fill.fee,
            Side::Sell => fill.size * fill.price - fill.fee,
        };

        let old_value = book
            .position
            .as_ref()
            .map(|p| p.size * p.mark_price)
            .unwrap_or(Decimal::ZERO);
        let (new_position, realized_pnl) =
            apply_to_position(book.position.as_ref(), &fill.symbol, signed, fill.price);
        let new_value = new_position
            .as_ref()
            .map(|p| p.size * p.mark_price)
            .unwrap_or(Decimal::ZERO);

        // Lock order is always symbol slot, then account.
        let mut account = self.account.lock().expect("ledger account poisoned");
        let new_cash = account.cash + cash_delta;
        if new_cash < Decimal::ZERO {
            return Err(Error::InsufficientMargin {
                needed: -cash_delta,
                cash: account.cash,
            });
        }

        book.position = new_position.clone();
        account.cash = new_cash;
        account.daily_realized_pnl += realized_pnl;
        account.position_value += new_value - old_value;
        account.roll_peak();

        tracing::debug!(
            symbol = %fill.symbol.0,
            side = ?fill.side,
            size = %fill.size,
            price = %fill.price,
            realized = %realized_pnl,
            "Fill applied to ledger."
        );

        Ok(FillOutcome {
            realized_pnl,
            position: new_position,
        })
    }

    /// Revalues the symbol's open position at `price` and returns its
    /// unrealized PnL (zero when flat). Peak equity only ever increases.
    pub fn mark_to_market(&self, symbol: &Symbol, price: Decimal) -> Decimal {
        let _gate = self.snapshot_gate.read().expect("ledger gate poisoned");
        let slot = self.slot(symbol);
        let mut book = slot.lock().expect("ledger symbol slot poisoned");

        let Some(position) = book.position.as_mut() else {
            return Decimal::ZERO;
        };

        let old_value = position.size * position.mark_price;
        position.mark_price = price;
        position.unrealized_pnl = (price - position.entry_price) * position.size;
        let unrealized = position.unrealized_pnl;
        let delta = position.size * price - old_value;

        let mut account = self.account.lock().expect("ledger account poisoned");
        account.position_value += delta;
        account.roll_peak();

        unrealized
    }

    /// A consistent point-in-time read of the whole account. Takes the
    /// snapshot gate exclusively, so no fill or mark is in flight while the
    /// numbers are assembled.
    pub fn snapshot_account(&self) -> AccountState {
        let _gate = self.snapshot_gate.write().expect("ledger gate poisoned");
        let account = self.account.lock().expect("ledger account poisoned");
        let map = self.symbols.lock().expect("ledger symbol map poisoned");

        let mut total_notional = Decimal::ZERO;
        let mut open_positions = 0;
        for slot in map.values() {
            let book = slot.lock().expect("ledger symbol slot poisoned");
            if let Some(position) = &book.position {
                open_positions += 1;
                total_notional += position.notional();
            }
        }

        let equity = account.equity();
        let drawdown = if account.peak_equity > Decimal::ZERO {
            ((account.peak_equity - equity) / account.peak_equity).max(Decimal::ZERO)
        } else {
            Decimal::ZERO
        };

        AccountState {
            cash: account.cash,
            equity,
            total_notional,
            daily_realized_pnl: account.daily_realized_pnl,
            peak_equity: account.peak_equity,
            drawdown,
            open_positions,
        }
    }

    pub fn position(&self, symbol: &Symbol) -> Option<Position> {
        let slot = self.slot(symbol);
        let book = slot.lock().expect("ledger symbol slot poisoned");
        book.position.clone()
    }

    pub fn positions(&self) -> Vec<Position> {
        let map = self.symbols.lock().expect("ledger symbol map poisoned");
        map.values()
            .filter_map(|slot| {
                slot.lock()
                    .expect("ledger symbol slot poisoned")
                    .position
                    .clone()
            })
            .collect()
    }

    /// The largest size a reduce-only order of `side` may fill without
    /// flipping the position: the opposite-side size, or zero.
    pub fn reducible_size(&self, symbol: &Symbol, side: Side) -> Decimal {
        match self.position(symbol) {
            Some(p) if p.is_long() && side == Side::Sell => p.size,
            Some(p) if !p.is_long() && side == Side::Buy => p.size.abs(),
            _ => Decimal::ZERO,
        }
    }

    /// Records a new order and assigns it an id.
    pub fn register_order(
        &self,
        request: &OrderRequest,
        status: OrderStatus,
        created_at_ms: i64,
    ) -> Order {
        let id = self.next_order_id.fetch_add(1, Ordering::Relaxed);
        let order = Order {
            id,
            symbol: request.symbol.clone(),
            side: request.side,
            size: request.size,
            kind: request.kind,
            limit_price: request.limit_price,
            time_in_force: request.time_in_force,
            reduce_only: request.reduce_only,
            status,
            created_at_ms,
        };
        self.orders
            .lock()
            .expect("ledger orders poisoned")
            .insert(id, order.clone());
        order
    }

    pub fn open_orders(&self, symbol: Option<&Symbol>) -> Vec<Order> {
        let orders = self.orders.lock().expect("ledger orders poisoned");
        orders
            .values()
            .filter(|o| o.status == OrderStatus::Open)
            .filter(|o| symbol.is_none_or(|s| &o.symbol == s))
            .cloned()
            .collect()
    }

    /// Cancels every Open order (optionally for one symbol) and returns how
    /// many were cancelled.
    pub fn cancel_all(&self, symbol: Option<&Symbol>) -> usize {
        let mut orders = self.orders.lock().expect("ledger orders poisoned");
        let mut cancelled = 0;
        for order in orders.values_mut() {
            if order.status == OrderStatus::Open && symbol.is_none_or(|s| &order.symbol == s) {
                order.status = OrderStatus::Cancelled;
                cancelled += 1;
            }
        }
        cancelled
    }

    /// Zeroes the daily realized PnL counter at the start of a new day.
    pub fn reset_daily(&self) {
        let mut account = self.account.lock().expect("ledger account poisoned");
        account.daily_realized_pnl = Decimal::ZERO;
    }
}

/// Pure position math for one signed fill: extend at VWAP entry, reduce
/// realizing PnL, or flip by closing fully and reopening the remainder at
/// the fill price. The position is deleted when its size reaches zero.
fn apply_to_position(
    old: Option<&Position>,
    symbol: &Symbol,
    signed: Decimal,
    price: Decimal,
) -> (Option<Position>, Decimal) {
    let Some(old) = old else {
        return (Some(open_position(symbol, signed, price)), Decimal::ZERO);
    };

    if old.size.signum() == signed.signum() {
        // Same direction: extend and move the VWAP entry.
        let new_size = old.size + signed;
        let entry_price = (old.entry_price * old.size.abs() + price * signed.abs())
            / new_size.abs();
        let position = Position {
            symbol: symbol.clone(),
            size: new_size,
            entry_price,
            mark_price: price,
            unrealized_pnl: (price - entry_price) * new_size,
            leverage: old.leverage,
        };
        return (Some(position), Decimal::ZERO);
    }

    // Opposite direction: reduce first, realizing PnL on the closed part.
    let closed = signed.abs().min(old.size.abs());
    let realized = (price - old.entry_price) * closed * old.size.signum();
    let remainder = signed.abs() - closed;

    if remainder > Decimal::ZERO {
        // Flip: the old position is fully closed, the remainder opens a
        // fresh one at the fill price.
        let position = open_position(symbol, signed.signum() * remainder, price);
        return (Some(position), realized);
    }

    let new_size = old.size + signed;
    if new_size == Decimal::ZERO {
        return (None, realized);
    }

    let position = Position {
        symbol: symbol.clone(),
        size: new_size,
        entry_price: old.entry_price,
        mark_price: price,
        unrealized_pnl: (price - old.entry_price) * new_size,
        leverage: old.leverage,
    };
    (Some(position), realized)
}

fn open_position(symbol: &Symbol, size: Decimal, price: Decimal) -> Position {
    Position {
        symbol: symbol.clone(),
        size,
        entry_price: price,
        mark_price: price,
        unrealized_pnl: Decimal::ZERO,
        leverage: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{OrderKind, TimeInForce};
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use std::thread;

    fn fill(symbol: &str, side: Side, size: Decimal, price: Decimal) -> Fill {
        Fill {
            symbol: Symbol::new(symbol),
            side,
            size,
            price,
            fee: Decimal::ZERO,
            timestamp_ms: 0,
        }
    }

    #[test]
    fn entry_moves_cash_by_notional() {
        let ledger = Ledger::new(dec!(10_000));
        let outcome = ledger
            .apply_fill(&fill("ETH", Side::Buy, dec!(2), dec!(100)))
            .unwrap();
        assert_eq!(outcome.realized_pnl, dec!(0));
        let snap = ledger.snapshot_account();
        assert_eq!(snap.cash, dec!(9_800));
        assert_eq!(snap.equity, dec!(10_000));
        assert_eq!(snap.total_notional, dec!(200));
    }

    #[test]
    fn extend_uses_vwap_entry() {
        let ledger = Ledger::new(dec!(10_000));
        ledger
            .apply_fill(&fill("ETH", Side::Buy, dec!(1), dec!(100)))
            .unwrap();
        let outcome = ledger
            .apply_fill(&fill("ETH", Side::Buy, dec!(3), dec!(120)))
            .unwrap();
        let position = outcome.position.unwrap();
        assert_eq!(position.size, dec!(4));
        assert_eq!(position.entry_price, dec!(115));
    }

    #[test]
    fn flip_realizes_then_reopens_remainder() {
        // Long 10 @ 100, sell 15 @ 110: realize (110-100)*10 = 100, end up
        // short 5 @ 110 with no double-counted PnL.
        let ledger = Ledger::new(dec!(10_000));
        ledger
            .apply_fill(&fill("ETH", Side::Buy, dec!(10), dec!(100)))
            .unwrap();
        let outcome = ledger
            .apply_fill(&fill("ETH", Side::Sell, dec!(15), dec!(110)))
            .unwrap();
        assert_eq!(outcome.realized_pnl, dec!(100));
        let position = outcome.position.unwrap();
        assert_eq!(position.size, dec!(-5));
        assert_eq!(position.entry_price, dec!(110));
        assert_eq!(position.unrealized_pnl, dec!(0));

        let snap = ledger.snapshot_account();
        assert_eq!(snap.daily_realized_pnl, dec!(100));
        assert_eq!(snap.equity, dec!(10_100));
    }

    #[test]
    fn exact_close_deletes_position() {
        let ledger = Ledger::new(dec!(10_000));
        ledger
            .apply_fill(&fill("ETH", Side::Buy, dec!(4), dec!(50)))
            .unwrap();
        let outcome = ledger
            .apply_fill(&fill("ETH", Side::Sell, dec!(4), dec!(45)))
            .unwrap();
        assert_eq!(outcome.realized_pnl, dec!(-20));
        assert!(outcome.position.is_none());
        assert!(ledger.position(&Symbol::new("ETH")).is_none());
        assert_eq!(ledger.snapshot_account().open_positions, 0);
    }

    #[test]
    fn fill_with_insufficient_cash_is_rejected_whole() {
        let ledger = Ledger::new(dec!(100));
        let err = ledger
            .apply_fill(&fill("ETH", Side::Buy, dec!(2), dec!(100)))
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientMargin { .. }));
        // Nothing was applied.
        let snap = ledger.snapshot_account();
        assert_eq!(snap.cash, dec!(100));
        assert_eq!(snap.open_positions, 0);
    }

    #[test]
    fn cash_never_negative_through_apply_fill() {
        let ledger = Ledger::new(dec!(1_000));
        for _ in 0..50 {
            let _ = ledger.apply_fill(&fill("ETH", Side::Buy, dec!(3), dec!(100)));
            assert!(ledger.snapshot_account().cash >= dec!(0));
        }
    }

    #[test]
    fn mark_to_market_updates_unrealized_and_equity() {
        let ledger = Ledger::new(dec!(10_000));
        ledger
            .apply_fill(&fill("ETH", Side::Buy, dec!(1), dec!(100)))
            .unwrap();
        let unrealized = ledger.mark_to_market(&Symbol::new("ETH"), dec!(130));
        assert_eq!(unrealized, dec!(30));
        let snap = ledger.snapshot_account();
        assert_eq!(snap.equity, dec!(10_030));
        assert_eq!(snap.peak_equity, dec!(10_030));
        assert_eq!(snap.drawdown, dec!(0));
    }

    #[test]
    fn peak_equity_is_monotone_across_marks() {
        let ledger = Ledger::new(dec!(10_000));
        ledger
            .apply_fill(&fill("ETH", Side::Buy, dec!(1), dec!(100)))
            .unwrap();
        let mut last_peak = Decimal::ZERO;
        for price in [dec!(120), dec!(90), dec!(150), dec!(80), dec!(140)] {
            ledger.mark_to_market(&Symbol::new("ETH"), price);
            let snap = ledger.snapshot_account();
            assert!(snap.peak_equity >= last_peak);
            assert!(snap.drawdown >= dec!(0));
            last_peak = snap.peak_equity;
        }
        assert_eq!(last_peak, dec!(10_050));
    }

    #[test]
    fn reducible_size_caps_at_opposite_side() {
        let ledger = Ledger::new(dec!(10_000));
        ledger
            .apply_fill(&fill("ETH", Side::Buy, dec!(3), dec!(100)))
            .unwrap();
        let symbol = Symbol::new("ETH");
        assert_eq!(ledger.reducible_size(&symbol, Side::Sell), dec!(3));
        assert_eq!(ledger.reducible_size(&symbol, Side::Buy), dec!(0));
        assert_eq!(ledger.reducible_size(&Symbol::new("BTC"), Side::Sell), dec!(0));
    }

    #[test]
    fn concurrent_fills_on_distinct_symbols_commute() {
        // Final account value must match applying the same fills serially,
        // in any order, whatever the interleaving.
        let symbols = ["ETH", "BTC", "SOL", "ADA"];
        let per_symbol_fills = 25;

        let concurrent = Arc::new(Ledger::new(dec!(1_000_000)));
        let mut handles = Vec::new();
        for symbol in symbols {
            let ledger = Arc::clone(&concurrent);
            handles.push(thread::spawn(move || {
                for i in 0..per_symbol_fills {
                    let price = Decimal::from(100 + i);
                    ledger
                        .apply_fill(&fill(symbol, Side::Buy, dec!(1), price))
                        .unwrap();
                    ledger
                        .apply_fill(&fill(symbol, Side::Sell, dec!(1), price + dec!(2)))
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let serial = Ledger::new(dec!(1_000_000));
        for symbol in symbols {
            for i in 0..per_symbol_fills {
                let price = Decimal::from(100 + i);
                serial
                    .apply_fill(&fill(symbol, Side::Buy, dec!(1), price))
                    .unwrap();
                serial
                    .apply_fill(&fill(symbol, Side::Sell, dec!(1), price + dec!(2)))
                    .unwrap();
            }
        }

        let a = concurrent.snapshot_account();
        let b = serial.snapshot_account();
        assert_eq!(a.cash, b.cash);
        assert_eq!(a.equity, b.equity);
        assert_eq!(a.daily_realized_pnl, b.daily_realized_pnl);
    }

    #[test]
    fn order_registry_cancels_open_orders_only() {
        let ledger = Ledger::new(dec!(10_000));
        let request = OrderRequest {
            symbol: Symbol::new("ETH"),
            side: Side::Buy,
            size: dec!(1),
            kind: OrderKind::Limit,
            limit_price: Some(dec!(90)),
            reduce_only: false,
            time_in_force: TimeInForce::Gtc,
        };
        let open = ledger.register_order(&request, OrderStatus::Open, 0);
        ledger.register_order(&request, OrderStatus::Filled, 0);
        assert_eq!(ledger.open_orders(None).len(), 1);
        assert_eq!(ledger.cancel_all(None), 1);
        assert_eq!(ledger.open_orders(None).len(), 0);
        assert!(open.id > 0);
    }

    #[test]
    fn reset_daily_zeroes_realized_only() {
        let ledger = Ledger::new(dec!(10_000));
        ledger
            .apply_fill(&fill("ETH", Side::Buy, dec!(1), dec!(100)))
            .unwrap();
        ledger
            .apply_fill(&fill("ETH", Side::Sell, dec!(1), dec!(90)))
            .unwrap();
        assert_eq!(ledger.snapshot_account().daily_realized_pnl, dec!(-10));
        ledger.reset_daily();
        let snap = ledger.snapshot_account();
        assert_eq!(snap.daily_realized_pnl, dec!(0));
        assert_eq!(snap.equity, dec!(9_990));
    }
}
