use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BreakoutSettings {
    /// How many completed candles form the entry channel.
    pub lookback: usize,

    /// Order size in base units.
    pub size: f64,

    #[serde(default = "default_breakout_interval")]
    pub interval_secs: u64,
}

fn default_breakout_interval() -> u64 {
    60
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MeanReversionSettings {
    /// SMA / standard deviation window.
    pub period: usize,

    /// Deviation (in standard deviations) that opens a fade.
    pub entry_z: f64,

    /// Deviation below which an open fade is closed.
    pub exit_z: f64,

    /// Order size in base units.
    pub size: f64,

    #[serde(default = "default_mean_reversion_interval")]
    pub interval_secs: u64,
}

fn default_mean_reversion_interval() -> u64 {
    900
}
