//! The top-level orchestrator. An `Engine` owns the gateway, the ledger,
//! the kill switch and the event bus, spawns one worker task per strategy
//! instance plus the risk controller, and stops them as a unit. There are
//! no ambient globals: everything a subcomponent needs is handed to it here.

pub mod worker;

pub use worker::{WorkerHandle, WorkerState, WorkerUpdate};

use anyhow::Result;
use app_config::PortfolioConfig;
use core_types::Symbol;
use events::EventBus;
use futures::future;
use gateway::Gateway;
use ledger::Ledger;
use risk::{KillSwitch, RiskController, RiskSettings};
use std::sync::Arc;
use strategies::factory::create_strategies;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub struct Engine {
    gateway: Arc<dyn Gateway>,
    ledger: Arc<Ledger>,
    bus: EventBus,
    kill: Arc<KillSwitch>,
    risk_settings: RiskSettings,
    workers: Vec<WorkerHandle>,
    risk_shutdown: Option<watch::Sender<bool>>,
    risk_join: Option<JoinHandle<()>>,
}

impl Engine {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        ledger: Arc<Ledger>,
        bus: EventBus,
        risk_settings: RiskSettings,
    ) -> Self {
        Self {
            gateway,
            ledger,
            bus,
            kill: Arc::new(KillSwitch::new()),
            risk_settings,
            workers: Vec::new(),
            risk_shutdown: None,
            risk_join: None,
        }
    }

    /// Spawns one worker per configured strategy instance, then the risk
    /// controller. N strategies plus one controller share the same ledger
    /// and gateway.
    pub fn start(&mut self, portfolio: &PortfolioConfig) -> Result<()> {
        if !self.workers.is_empty() {
            anyhow::bail!("Engine is already running.");
        }
        tracing::info!("Initializing engine...");

        for entry in &portfolio.workers {
            if !entry.enabled {
                tracing::warn!(symbol = %entry.symbol, "Skipping disabled worker entry.");
                continue;
            }

            let strategies = create_strategies(&entry.strategies)?;
            if strategies.is_empty() {
                tracing::error!(symbol = %entry.symbol, "No strategies configured for entry. Skipping.");
                continue;
            }

            for strategy in strategies {
                let handle = worker::spawn(
                    Symbol::new(entry.symbol.clone()),
                    entry.timeframe.clone(),
                    strategy,
                    Arc::clone(&self.gateway),
                    Arc::clone(&self.ledger),
                    self.bus.clone(),
                    Arc::clone(&self.kill),
                );
                tracing::info!(worker = %handle.id, "Worker spawned.");
                self.workers.push(handle);
            }
        }

        if self.workers.is_empty() {
            anyhow::bail!("No workers were started. Check the portfolio configuration.");
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let controller = RiskController::new(
            self.risk_settings.clone(),
            Arc::clone(&self.ledger),
            Arc::clone(&self.gateway),
            self.bus.clone(),
            Arc::clone(&self.kill),
        );
        self.risk_join = Some(tokio::spawn(controller.run(shutdown_rx)));
        self.risk_shutdown = Some(shutdown_tx);

        tracing::info!(workers = self.workers.len(), "Engine started.");
        Ok(())
    }

    /// Graceful shutdown: flags every worker, waits for each in-flight
    /// cycle to yield and every worker to reach `Stopped`, then stops the
    /// risk controller.
    pub async fn stop(&mut self) {
        tracing::info!("Stopping engine...");
        for handle in &self.workers {
            handle.request_stop();
        }
        future::join_all(self.workers.drain(..).map(WorkerHandle::stop)).await;

        if let Some(shutdown) = self.risk_shutdown.take() {
            let _ = shutdown.send(true);
        }
        if let Some(join) = self.risk_join.take() {
            let _ = join.await;
        }
        tracing::info!("Engine stopped.");
    }

    pub fn is_halted(&self) -> bool {
        self.kill.is_halted()
    }

    pub fn kill_switch(&self) -> Arc<KillSwitch> {
        Arc::clone(&self.kill)
    }

    pub fn ledger(&self) -> Arc<Ledger> {
        Arc::clone(&self.ledger)
    }

    pub fn workers(&self) -> &[WorkerHandle] {
        &self.workers
    }

    /// Drains every worker's pending update queue, tagged by worker id.
    pub fn drain_updates(&self) -> Vec<(String, Vec<WorkerUpdate>)> {
        self.workers
            .iter()
            .map(|w| (w.id.clone(), w.drain_updates()))
            .filter(|(_, updates)| !updates.is_empty())
            .collect()
    }
}
