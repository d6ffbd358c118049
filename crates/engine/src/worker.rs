use chrono::Utc;
use core_types::{Fill, OrderKind, OrderRequest, Side, Signal, Symbol, TimeInForce};
use events::{Event, EventBus};
use gateway::Gateway;
use ledger::Ledger;
use risk::KillSwitch;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use strategies::{MarketView, Strategy};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// How many candles a worker hands to its strategy each cycle.
pub const CANDLE_HISTORY_SIZE: usize = 100;

/// Bound on every gateway call a worker makes. A timed-out call is a
/// recoverable error, never a fatal one.
const CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a worker sits out after a recoverable error before resuming.
const ERROR_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Analyzing,
    Signaling,
    Executing,
    Error,
    Stopped,
}

/// Observable events a worker queues for external reporting. Drained (and
/// cleared) through `WorkerHandle::drain_updates`.
#[derive(Debug, Clone)]
pub enum WorkerUpdate {
    TradeExecuted(Fill),
    Error { message: String, timestamp_ms: i64 },
    Stopped { timestamp_ms: i64 },
}

/// State shared between the worker task and its handle.
#[derive(Debug)]
struct Shared {
    stop: AtomicBool,
    running: AtomicBool,
    state: Mutex<WorkerState>,
    updates: Mutex<Vec<WorkerUpdate>>,
    /// Wakes the worker out of its interval or backoff sleep on stop.
    wake: Notify,
}

enum CycleError {
    /// Transient I/O: retried next cycle after backoff.
    Transient(gateway::Error),
    /// Rejected order or similar: logged, cycle ends, no retry.
    Rejected(String),
    /// The strategy broke its contract: stops this worker only.
    Contract(String),
}

/// A single strategy's polling loop. One worker per strategy instance; a
/// worker's failure never stops its siblings or the engine.
pub struct StrategyWorker {
    id: String,
    symbol: Symbol,
    timeframe: String,
    strategy: Box<dyn Strategy>,
    gateway: Arc<dyn Gateway>,
    ledger: Arc<Ledger>,
    bus: EventBus,
    kill: Arc<KillSwitch>,
    shared: Arc<Shared>,
    poll_interval: Duration,
}

/// Spawns a worker onto the runtime and returns its handle.
pub fn spawn(
    symbol: Symbol,
    timeframe: String,
    strategy: Box<dyn Strategy>,
    gateway: Arc<dyn Gateway>,
    ledger: Arc<Ledger>,
    bus: EventBus,
    kill: Arc<KillSwitch>,
) -> WorkerHandle {
    let id = format!("{}_{}_{}", symbol.0, timeframe, strategy.name());
    let poll_interval = Duration::from_secs(strategy.interval_secs().max(1));
    let shared = Arc::new(Shared {
        stop: AtomicBool::new(false),
        running: AtomicBool::new(true),
        state: Mutex::new(WorkerState::Idle),
        updates: Mutex::new(Vec::new()),
        wake: Notify::new(),
    });

    let worker = StrategyWorker {
        id: id.clone(),
        symbol: symbol.clone(),
        timeframe,
        strategy,
        gateway,
        ledger,
        bus,
        kill,
        shared: Arc::clone(&shared),
        poll_interval,
    };
    let join = tokio::spawn(worker.run());

    WorkerHandle {
        id,
        symbol,
        poll_interval,
        shared,
        join,
    }
}

impl StrategyWorker {
    async fn run(mut self) {
        tracing::info!(worker = %self.id, interval = ?self.poll_interval, "Worker started.");

        loop {
            if self.should_stop() {
                break;
            }

            self.set_state(WorkerState::Analyzing);
            match self.cycle().await {
                Ok(()) => {
                    self.set_state(WorkerState::Idle);
                    self.sleep(self.poll_interval).await;
                }
                Err(CycleError::Rejected(message)) => {
                    self.record_error(&message);
                    self.set_state(WorkerState::Idle);
                    self.sleep(self.poll_interval).await;
                }
                Err(CycleError::Transient(e)) => {
                    self.record_error(&e.to_string());
                    self.set_state(WorkerState::Error);
                    tracing::warn!(worker = %self.id, error = %e, "Recoverable error; backing off.");
                    self.sleep(ERROR_BACKOFF).await;
                    self.set_state(WorkerState::Idle);
                }
                Err(CycleError::Contract(message)) => {
                    self.record_error(&message);
                    tracing::error!(worker = %self.id, error = %message,
                        "Strategy contract violation; stopping this worker.");
                    break;
                }
            }
        }

        self.set_state(WorkerState::Stopped);
        self.shared.running.store(false, Ordering::SeqCst);
        let now_ms = Utc::now().timestamp_millis();
        self.push_update(WorkerUpdate::Stopped { timestamp_ms: now_ms });
        self.bus.publish(Event::StrategyStatus {
            worker: self.id.clone(),
            status: "stopped".to_string(),
            timestamp_ms: now_ms,
        });
        tracing::info!(worker = %self.id, "Worker stopped.");
    }

    /// One full pass of the state machine: fetch market state, let the
    /// strategy look at it, and execute whatever it asks for.
    async fn cycle(&mut self) -> Result<(), CycleError> {
        let market = self
            .gateway_call(self.gateway.get_market_data(&self.symbol))
            .await?;
        self.ledger.mark_to_market(&self.symbol, market.last_price);

        let candles = self
            .gateway_call(
                self.gateway
                    .get_ohlcv(&self.symbol, &self.timeframe, CANDLE_HISTORY_SIZE),
            )
            .await?;
        let position = self
            .gateway_call(self.gateway.get_positions())
            .await?
            .into_iter()
            .find(|p| p.symbol == self.symbol);

        let view = MarketView {
            market,
            candles,
            position,
        };
        let Some(signal) = self.strategy.analyze(&view) else {
            return Ok(());
        };

        self.set_state(WorkerState::Signaling);
        tracing::info!(worker = %self.id, ?signal, "Strategy generated a signal.");
        let Some(request) = self.build_request(signal, &view)? else {
            return Ok(());
        };

        self.set_state(WorkerState::Executing);
        let ack = self.gateway_call(self.gateway.place_order(&request)).await?;
        if let Some(fill) = ack.fill {
            match self.ledger.apply_fill(&fill) {
                Ok(outcome) => {
                    tracing::info!(
                        worker = %self.id,
                        price = %fill.price,
                        size = %fill.size,
                        realized = %outcome.realized_pnl,
                        "Trade executed."
                    );
                    self.push_update(WorkerUpdate::TradeExecuted(fill.clone()));
                    self.bus.publish(Event::TradeExecuted(fill));
                }
                Err(e) => {
                    // The gateway filled but our book refused it: surfaces as
                    // a rejected order, never a retry.
                    self.record_error(&format!("fill rejected by ledger: {e}"));
                }
            }
        }
        Ok(())
    }

    /// Turns a signal into an order request, validating the strategy's
    /// contract on the way. `Exit` with nothing open is a no-op.
    fn build_request(
        &self,
        signal: Signal,
        view: &MarketView,
    ) -> Result<Option<OrderRequest>, CycleError> {
        match signal {
            Signal::Enter {
                side,
                size,
                kind,
                limit_price,
            } => {
                if size <= rust_decimal::Decimal::ZERO {
                    return Err(CycleError::Contract(format!(
                        "malformed signal: non-positive size {size}"
                    )));
                }
                if kind == OrderKind::Limit && limit_price.is_none() {
                    return Err(CycleError::Contract(
                        "malformed signal: limit entry without a price".to_string(),
                    ));
                }
                Ok(Some(OrderRequest {
                    symbol: self.symbol.clone(),
                    side,
                    size,
                    kind,
                    limit_price,
                    reduce_only: false,
                    time_in_force: TimeInForce::Gtc,
                }))
            }
            Signal::Exit => {
                let Some(position) = &view.position else {
                    return Ok(None);
                };
                let side = if position.is_long() { Side::Sell } else { Side::Buy };
                Ok(Some(OrderRequest {
                    symbol: self.symbol.clone(),
                    side,
                    size: position.size.abs(),
                    kind: OrderKind::Market,
                    limit_price: None,
                    reduce_only: true,
                    time_in_force: TimeInForce::Gtc,
                }))
            }
        }
    }

    /// Wraps a gateway call in the bounded timeout and classifies the
    /// outcome along the error taxonomy.
    async fn gateway_call<T>(
        &self,
        call: impl Future<Output = gateway::Result<T>>,
    ) -> Result<T, CycleError> {
        match timeout(CALL_TIMEOUT, call).await {
            Err(_) => Err(CycleError::Transient(gateway::Error::Timeout {
                seconds: CALL_TIMEOUT.as_secs(),
            })),
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) if e.is_transient() => Err(CycleError::Transient(e)),
            Ok(Err(e)) => Err(CycleError::Rejected(e.to_string())),
        }
    }

    fn should_stop(&self) -> bool {
        self.shared.stop.load(Ordering::SeqCst) || self.kill.is_halted()
    }

    fn set_state(&self, state: WorkerState) {
        *self.shared.state.lock().expect("worker state poisoned") = state;
    }

    fn push_update(&self, update: WorkerUpdate) {
        self.shared
            .updates
            .lock()
            .expect("worker updates poisoned")
            .push(update);
    }

    fn record_error(&self, message: &str) {
        let timestamp_ms = Utc::now().timestamp_millis();
        self.push_update(WorkerUpdate::Error {
            message: message.to_string(),
            timestamp_ms,
        });
        self.bus.publish(Event::Error {
            source: self.id.clone(),
            message: message.to_string(),
            timestamp_ms,
        });
    }

    /// Sleeps for `duration`, waking early if a stop is requested.
    async fn sleep(&self, duration: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.shared.wake.notified() => {}
        }
    }
}

/// The engine's grip on one running worker.
pub struct WorkerHandle {
    pub id: String,
    pub symbol: Symbol,
    pub poll_interval: Duration,
    shared: Arc<Shared>,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    /// Flags the worker to stop. The flag is observed at the top of the
    /// next cycle; an in-flight `execute` is allowed to complete.
    pub fn request_stop(&self) {
        self.shared.stop.store(true, Ordering::SeqCst);
        self.shared.wake.notify_waiters();
    }

    /// Stops the worker and waits for the in-flight cycle to yield. Safe to
    /// call while a cycle is running.
    pub async fn stop(self) {
        self.request_stop();
        let _ = self.join.await;
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> WorkerState {
        *self.shared.state.lock().expect("worker state poisoned")
    }

    /// Returns and clears the queue of observable events. Each update is
    /// delivered at most once per drain.
    pub fn drain_updates(&self) -> Vec<WorkerUpdate> {
        mem::take(&mut *self.shared.updates.lock().expect("worker updates poisoned"))
    }
}
