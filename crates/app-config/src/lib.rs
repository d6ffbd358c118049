use config::{Config, Environment, File};

pub mod error;
pub mod types;

// Re-export the most important types for easy access.
pub use error::{Error, Result};
pub use types::{PortfolioConfig, Settings, WorkerEntry};

/// Loads the application settings from various sources.
///
/// Layered loading: a default `base.toml`, then an environment-specific
/// file (e.g. `development.toml`), then `APP_*` environment variables.
pub fn load_settings() -> Result<Settings> {
    let environment = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "development".into());

    let settings = Config::builder()
        .add_source(File::with_name("config/base"))
        .add_source(File::with_name(&format!("config/{}", environment)).required(false))
        // Environment variables use the `APP` prefix with `__` separators,
        // e.g. `APP_RISK__DAILY_LOSS_LIMIT=500`.
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let settings: Settings = settings.try_deserialize()?;
    Ok(settings)
}

/// Loads the portfolio configuration from `config/engine.toml`.
pub fn load_portfolio_config() -> Result<PortfolioConfig> {
    let content = std::fs::read_to_string("config/engine.toml")?;

    let config: PortfolioConfig = toml::from_str(&content)?;
    Ok(config)
}
