use events::{Event, EventBus};
use gateway::Gateway;
use std::sync::atomic::{AtomicBool, Ordering};

/// The system-wide halt flag. Tripping it cancels all open orders and
/// flattens every position through the gateway; every strategy worker
/// checks `is_halted` before each cycle and stops immediately.
///
/// Tripping is idempotent, and there is no way to un-trip: a halted engine
/// resumes only through an explicit external restart.
#[derive(Debug, Default)]
pub struct KillSwitch {
    halted: AtomicBool,
}

impl KillSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Trips the switch. Only the first call performs the cancel-and-flatten;
    /// later calls observe the flag and return. Gateway failures during the
    /// emergency are logged — there is nothing better to do with them.
    pub async fn trip(
        &self,
        gateway: &dyn Gateway,
        bus: &EventBus,
        rule: &str,
        detail: String,
        timestamp_ms: i64,
    ) {
        if self.halted.swap(true, Ordering::SeqCst) {
            tracing::debug!(rule, "Kill switch already tripped.");
            return;
        }

        tracing::error!(rule, detail = %detail, "KILL SWITCH TRIPPED. Halting all trading.");
        bus.publish(Event::RiskTripped {
            rule: rule.to_string(),
            detail,
            timestamp_ms,
        });

        if let Err(e) = gateway.kill_switch(None).await {
            tracing::error!(error = %e, "Failed to flatten positions during kill switch.");
        }
    }
}
