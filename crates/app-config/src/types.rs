use core_types::StrategyConfig;
use risk::RiskSettings;
use serde::Deserialize;
use simulator::SimulatorSettings;

#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    /// The application's general settings.
    pub app: AppSettings,
    /// Account-wide risk limits enforced by the risk controller.
    pub risk: RiskSettings,
    /// Paper-trading exchange parameters.
    #[serde(default)]
    pub simulator: SimulatorSettings,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AppSettings {
    /// The environment the application is running in (e.g. "development").
    pub environment: String,
    /// The log level filter for the application.
    pub log_level: String,
}

// --- Structs for engine.toml ---

/// The portfolio run configuration: which workers to spawn, on which
/// symbols, with which strategies.
#[derive(Deserialize, Debug, Clone)]
pub struct PortfolioConfig {
    pub workers: Vec<WorkerEntry>,
}

/// One worker entry. Each strategy listed here becomes its own worker task.
#[derive(Deserialize, Debug, Clone)]
pub struct WorkerEntry {
    pub symbol: String,
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    pub strategies: Vec<StrategyConfig>,
}

fn default_timeframe() -> String {
    "1m".to_string()
}

fn default_enabled() -> bool {
    true
}
