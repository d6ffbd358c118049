use core_types::Fill;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub timestamp_ms: i64,
    pub value: Decimal,
}

/// The persisted result of one backtest run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestReport {
    pub initial_account_value: Decimal,
    pub final_account_value: Decimal,
    pub total_trades: usize,
    pub fill_history: Vec<Fill>,
    pub net_pnl: Decimal,
    /// Worst peak-to-trough decline over the sampled equity curve, as a
    /// fraction in [0, 1].
    pub max_drawdown: Decimal,
    pub risk_tripped: bool,
    pub equity_curve: Vec<EquityPoint>,
}

impl BacktestReport {
    pub fn new(
        initial_account_value: Decimal,
        final_account_value: Decimal,
        fill_history: Vec<Fill>,
        equity_curve: Vec<EquityPoint>,
        risk_tripped: bool,
    ) -> Self {
        Self {
            initial_account_value,
            final_account_value,
            total_trades: fill_history.len(),
            net_pnl: final_account_value - initial_account_value,
            max_drawdown: max_drawdown(&equity_curve),
            fill_history,
            risk_tripped,
            equity_curve,
        }
    }
}

fn max_drawdown(curve: &[EquityPoint]) -> Decimal {
    let mut peak = Decimal::ZERO;
    let mut worst = Decimal::ZERO;
    for point in curve {
        if point.value > peak {
            peak = point.value;
        }
        if peak > Decimal::ZERO {
            let drawdown = (peak - point.value) / peak;
            if drawdown > worst {
                worst = drawdown;
            }
        }
    }
    worst
}

/// Prints the report in a readable format.
pub fn print_report(report: &BacktestReport) {
    println!("\n--- Backtest Report ---");
    println!("-----------------------");
    println!("Initial Value:  ${:.2}", report.initial_account_value);
    println!("Final Value:    ${:.2}", report.final_account_value);
    println!("Net P&L:        ${:.2}", report.net_pnl);
    println!("Max Drawdown:   {:.2}%", report.max_drawdown * Decimal::ONE_HUNDRED);
    println!("Total Trades:   {}", report.total_trades);
    if report.risk_tripped {
        println!("NOTE: the kill switch tripped during this run.");
    }
    println!("-----------------------");
}
