use serde::Deserialize;
use toml::Value;

/// One strategy entry from the portfolio config. `params` holds the raw
/// `params = { ... }` table and is deserialized by the strategy factory.
#[derive(Deserialize, Debug, Clone)]
pub struct StrategyConfig {
    pub name: String,
    pub params: Value,
}
