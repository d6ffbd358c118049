use crate::types::{BreakoutSettings, MeanReversionSettings};
use crate::{Strategy, breakout::Breakout, mean_reversion::MeanReversion};
use anyhow::Result;
use core_types::StrategyConfig;

/// Builds the strategy instances for one worker from its config entries.
/// Identifiers are resolved here, at startup; there is no runtime lookup.
pub fn create_strategies(configs: &[StrategyConfig]) -> Result<Vec<Box<dyn Strategy>>> {
    let mut active_strategies = Vec::new();

    for config in configs {
        let strategy: Box<dyn Strategy> = match config.name.as_str() {
            "breakout" => {
                let settings: BreakoutSettings = config.params.clone().try_into()?;
                if settings.lookback == 0 || settings.size <= 0.0 {
                    anyhow::bail!("breakout: lookback and size must be positive");
                }
                Box::new(Breakout::new(settings))
            }
            "mean_reversion" => {
                let settings: MeanReversionSettings = config.params.clone().try_into()?;
                if settings.period == 0 || settings.size <= 0.0 {
                    anyhow::bail!("mean_reversion: period and size must be positive");
                }
                Box::new(MeanReversion::new(settings))
            }
            unknown => anyhow::bail!("Attempted to create unknown strategy: {}", unknown),
        };
        active_strategies.push(strategy);
    }

    Ok(active_strategies)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(name: &str, params: &str) -> StrategyConfig {
        StrategyConfig {
            name: name.to_string(),
            params: toml::from_str(params).unwrap(),
        }
    }

    #[test]
    fn builds_known_strategies_from_params() {
        let strategies = create_strategies(&[
            config("breakout", "lookback = 20\nsize = 0.5"),
            config("mean_reversion", "period = 14\nentry_z = 2.0\nexit_z = 0.5\nsize = 0.25"),
        ])
        .unwrap();
        assert_eq!(strategies.len(), 2);
        assert_eq!(strategies[0].name(), "Breakout");
        assert_eq!(strategies[1].name(), "MeanReversion");
    }

    #[test]
    fn rejects_unknown_strategy_names() {
        let err = create_strategies(&[config("arbitrage", "size = 1.0")]).unwrap_err();
        assert!(err.to_string().contains("unknown strategy"));
    }

    #[test]
    fn rejects_invalid_parameters() {
        let err = create_strategies(&[config("breakout", "lookback = 0\nsize = 1.0")]).unwrap_err();
        assert!(err.to_string().contains("positive"));
    }
}
