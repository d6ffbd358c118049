use serde::Deserialize;

/// Account-wide limits enforced by the risk controller.
#[derive(Debug, Clone, Deserialize)]
pub struct RiskSettings {
    /// Daily realized loss, in dollars, that trips the kill switch.
    pub daily_loss_limit: f64,

    /// Aggregate notional exposure, in dollars, that trips the kill switch.
    pub max_portfolio_risk: f64,

    /// Drawdown fraction from peak equity that trips the kill switch when
    /// `emergency_stop_enabled` is set.
    #[serde(default = "default_max_drawdown_pct")]
    pub max_drawdown_pct: f64,

    #[serde(default = "default_emergency_stop")]
    pub emergency_stop_enabled: bool,

    /// How often the controller takes and evaluates a snapshot.
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,

    /// Available-balance fraction of account value below which a warning
    /// (never a trip) is emitted.
    #[serde(default = "default_low_balance_warning_pct")]
    pub low_balance_warning_pct: f64,
}

fn default_max_drawdown_pct() -> f64 {
    0.15
}

fn default_emergency_stop() -> bool {
    true
}

fn default_check_interval_secs() -> u64 {
    10
}

fn default_low_balance_warning_pct() -> f64 {
    0.10
}
