//! Deterministic historical replay. The orchestrator pushes candles into
//! the market simulator in timestamp order, runs every registered
//! strategy's cycle exactly once per candle, and evaluates the risk rules
//! on the simulated account between steps. Everything happens on one
//! logical thread; given the same feed and configuration, two runs produce
//! identical fill histories and final account values.

pub mod data;
pub mod report;

pub use report::{BacktestReport, EquityPoint, print_report};

use core_types::{Candle, OrderKind, OrderRequest, Side, Signal, Symbol, TimeInForce};
use gateway::Gateway;
use risk::{RiskSettings, assess};
use rust_decimal::Decimal;
use simulator::Simulator;
use strategies::{MarketView, Strategy};

/// One tick of the historical feed.
#[derive(Debug, Clone)]
pub struct FeedEvent {
    pub symbol: Symbol,
    pub candle: Candle,
}

impl FeedEvent {
    pub fn stream(symbol: Symbol, candles: Vec<Candle>) -> Vec<FeedEvent> {
        candles
            .into_iter()
            .map(|candle| FeedEvent {
                symbol: symbol.clone(),
                candle,
            })
            .collect()
    }
}

struct Registered {
    symbol: Symbol,
    timeframe: String,
    strategy: Box<dyn Strategy>,
}

/// The main engine for running historical backtests.
pub struct Backtester {
    simulator: Simulator,
    risk_settings: Option<RiskSettings>,
    strategies: Vec<Registered>,
    /// How often (in feed steps) the account value is sampled for the
    /// equity curve.
    sample_every: usize,
    candle_limit: usize,
}

impl Backtester {
    pub fn new(simulator: Simulator) -> Self {
        Self {
            simulator,
            risk_settings: None,
            strategies: Vec::new(),
            sample_every: 100,
            candle_limit: 100,
        }
    }

    /// Evaluates the account-wide risk rules after every step, tripping
    /// the simulator's kill switch on a breach exactly as the live risk
    /// controller would.
    pub fn with_risk(mut self, settings: RiskSettings) -> Self {
        self.risk_settings = Some(settings);
        self
    }

    pub fn with_sample_every(mut self, sample_every: usize) -> Self {
        self.sample_every = sample_every.max(1);
        self
    }

    pub fn register_strategy(
        &mut self,
        symbol: Symbol,
        timeframe: impl Into<String>,
        strategy: Box<dyn Strategy>,
    ) {
        self.strategies.push(Registered {
            symbol,
            timeframe: timeframe.into(),
            strategy,
        });
    }

    /// Replays the feed. The feed must already be in timestamp order.
    pub async fn run(mut self, feed: &[FeedEvent]) -> anyhow::Result<BacktestReport> {
        if self.strategies.is_empty() {
            anyhow::bail!("No strategies registered for the backtest.");
        }
        let initial_value = self.simulator.account_snapshot().equity;
        tracing::info!(
            steps = feed.len(),
            strategies = self.strategies.len(),
            "Starting backtest replay."
        );

        let mut equity_curve = Vec::new();
        let mut risk_tripped = false;

        for (step, event) in feed.iter().enumerate() {
            self.simulator.update_market_state(&event.symbol, &event.candle);

            if !self.simulator.is_halted() {
                for registered in &mut self.strategies {
                    run_cycle(&self.simulator, registered, self.candle_limit).await;
                }
            }

            if let Some(settings) = &self.risk_settings
                && !self.simulator.is_halted()
            {
                let snapshot = self.simulator.account_snapshot();
                let assessment = assess(&snapshot, settings);
                for warning in &assessment.warnings {
                    tracing::warn!(step, warning = %warning, "Risk warning.");
                }
                if let Some(breach) = assessment.breach {
                    tracing::error!(
                        step,
                        rule = breach.rule(),
                        detail = %breach.detail(),
                        "Risk breach during replay; tripping kill switch."
                    );
                    self.simulator
                        .kill_switch(None)
                        .await
                        .map_err(|e| anyhow::anyhow!("kill switch failed: {e}"))?;
                    risk_tripped = true;
                }
            }

            if step % self.sample_every == 0 || step + 1 == feed.len() {
                equity_curve.push(EquityPoint {
                    timestamp_ms: event.candle.timestamp_ms,
                    value: self.simulator.account_snapshot().equity,
                });
            }
        }

        let final_value = self.simulator.account_snapshot().equity;
        tracing::info!(final_value = %final_value, "Backtest finished.");

        Ok(BacktestReport::new(
            initial_value,
            final_value,
            self.simulator.fill_history(),
            equity_curve,
            risk_tripped,
        ))
    }
}

/// One analysis/execution cycle for one strategy, mirroring the live
/// worker's pipeline without its polling or backoff machinery.
async fn run_cycle(simulator: &Simulator, registered: &mut Registered, candle_limit: usize) {
    let Ok(market) = simulator.get_market_data(&registered.symbol).await else {
        // No price for this symbol yet.
        return;
    };
    let Ok(candles) = simulator
        .get_ohlcv(&registered.symbol, &registered.timeframe, candle_limit)
        .await
    else {
        return;
    };
    let position = simulator
        .get_positions()
        .await
        .unwrap_or_default()
        .into_iter()
        .find(|p| p.symbol == registered.symbol);

    let view = MarketView {
        market,
        candles,
        position,
    };
    let Some(signal) = registered.strategy.analyze(&view) else {
        return;
    };
    let Some(request) = request_from_signal(&registered.symbol, signal, &view) else {
        return;
    };

    match simulator.place_order(&request).await {
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(
                symbol = %registered.symbol.0,
                strategy = registered.strategy.name(),
                error = %e,
                "Order rejected during replay."
            );
        }
    }
}

fn request_from_signal(symbol: &Symbol, signal: Signal, view: &MarketView) -> Option<OrderRequest> {
    match signal {
        Signal::Enter {
            side,
            size,
            kind,
            limit_price,
        } => {
            if size <= Decimal::ZERO || (kind == OrderKind::Limit && limit_price.is_none()) {
                tracing::warn!(symbol = %symbol.0, "Malformed signal skipped during replay.");
                return None;
            }
            Some(OrderRequest {
                symbol: symbol.clone(),
                side,
                size,
                kind,
                limit_price,
                reduce_only: false,
                time_in_force: TimeInForce::Gtc,
            })
        }
        Signal::Exit => {
            let position = view.position.as_ref()?;
            let side = if position.is_long() { Side::Sell } else { Side::Buy };
            Some(OrderRequest {
                symbol: symbol.clone(),
                side,
                size: position.size.abs(),
                kind: OrderKind::Market,
                limit_price: None,
                reduce_only: true,
                time_in_force: TimeInForce::Gtc,
            })
        }
    }
}
