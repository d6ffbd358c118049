use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct SimulatorSettings {
    /// Starting cash balance for the simulated account.
    pub initial_cash: f64,

    /// Taker fee charged on every fill, in basis points of notional
    /// (e.g. 2.5 for 0.025%).
    pub taker_fee_bps: f64,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            initial_cash: 100_000.0,
            taker_fee_bps: 2.5,
        }
    }
}
