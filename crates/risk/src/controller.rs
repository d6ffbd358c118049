use crate::{KillSwitch, RiskSettings, assess};
use chrono::Utc;
use events::{Event, EventBus};
use gateway::Gateway;
use ledger::Ledger;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// The periodic control loop: every `check_interval_secs` it takes a
/// consistent snapshot of the ledger, runs the rule set over it, and trips
/// the kill switch on the first breach. It is the only component allowed to
/// decide that a risk violation is fatal.
pub struct RiskController {
    settings: RiskSettings,
    ledger: Arc<Ledger>,
    gateway: Arc<dyn Gateway>,
    bus: EventBus,
    kill: Arc<KillSwitch>,
}

impl RiskController {
    pub fn new(
        settings: RiskSettings,
        ledger: Arc<Ledger>,
        gateway: Arc<dyn Gateway>,
        bus: EventBus,
        kill: Arc<KillSwitch>,
    ) -> Self {
        Self {
            settings,
            ledger,
            gateway,
            bus,
            kill,
        }
    }

    /// Runs until the engine shuts down or the kill switch trips. The
    /// shutdown receiver flips when `Engine::stop` is called.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            interval_secs = self.settings.check_interval_secs,
            "Risk controller started."
        );
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.settings.check_interval_secs.max(1)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut last_day = Utc::now().date_naive();

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if self.kill.is_halted() {
                        tracing::warn!("Kill switch is tripped; risk controller standing down.");
                        break;
                    }

                    // New UTC day: the daily realized PnL counter starts over.
                    let today = Utc::now().date_naive();
                    if today > last_day {
                        self.ledger.reset_daily();
                        last_day = today;
                        tracing::info!("Daily PnL reset.");
                    }

                    self.check().await;
                }
                _ = shutdown.changed() => {
                    tracing::info!("Risk controller shutting down.");
                    break;
                }
            }
        }
    }

    /// One evaluation pass over a fresh snapshot.
    pub async fn check(&self) {
        let snapshot = self.ledger.snapshot_account();
        let now_ms = Utc::now().timestamp_millis();

        tracing::info!(
            equity = %snapshot.equity,
            daily_pnl = %snapshot.daily_realized_pnl,
            notional = %snapshot.total_notional,
            drawdown = %snapshot.drawdown,
            positions = snapshot.open_positions,
            "Account status."
        );

        let assessment = assess(&snapshot, &self.settings);
        for warning in &assessment.warnings {
            tracing::warn!(warning = %warning, "Risk warning.");
            self.bus.publish(Event::Warning {
                source: "risk_controller".to_string(),
                message: warning.clone(),
                timestamp_ms: now_ms,
            });
        }

        if let Some(breach) = assessment.breach {
            self.kill
                .trip(
                    self.gateway.as_ref(),
                    &self.bus,
                    breach.rule(),
                    breach.detail(),
                    now_ms,
                )
                .await;
        }
    }
}
