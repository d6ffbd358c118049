//! Account-wide risk rules and the control loop that enforces them. The
//! rules are evaluated over an immutable `AccountState` snapshot, in a
//! fixed order; the first breached rule wins.

pub mod controller;
pub mod kill_switch;
pub mod types;

pub use controller::RiskController;
pub use kill_switch::KillSwitch;
pub use types::RiskSettings;

use core_types::AccountState;
use num_traits::FromPrimitive;
use rust_decimal::Decimal;

/// A tripped account-wide rule. Always fatal to the whole engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Breach {
    DailyLoss { pnl: Decimal, limit: Decimal },
    Exposure { notional: Decimal, limit: Decimal },
    Drawdown { drawdown: Decimal, limit: Decimal },
}

impl Breach {
    pub fn rule(&self) -> &'static str {
        match self {
            Breach::DailyLoss { .. } => "daily_loss_limit",
            Breach::Exposure { .. } => "max_portfolio_risk",
            Breach::Drawdown { .. } => "max_drawdown",
        }
    }

    pub fn detail(&self) -> String {
        match self {
            Breach::DailyLoss { pnl, limit } => {
                format!("daily realized PnL {pnl} breached loss limit {limit}")
            }
            Breach::Exposure { notional, limit } => {
                format!("notional exposure {notional} exceeds limit {limit}")
            }
            Breach::Drawdown { drawdown, limit } => {
                format!("drawdown {drawdown} exceeds limit {limit}")
            }
        }
    }
}

/// The outcome of one evaluation pass: at most one breach, plus any number
/// of non-fatal warnings.
#[derive(Debug, Default)]
pub struct Assessment {
    pub breach: Option<Breach>,
    pub warnings: Vec<String>,
}

/// Evaluates the rules in their fixed order: daily loss, then exposure,
/// then drawdown (gated on `emergency_stop_enabled`), then the low-balance
/// warning.
pub fn assess(snapshot: &AccountState, settings: &RiskSettings) -> Assessment {
    let mut assessment = Assessment::default();

    let daily_loss_limit = Decimal::from_f64(settings.daily_loss_limit).unwrap_or_default();
    if snapshot.daily_realized_pnl <= -daily_loss_limit {
        assessment.breach = Some(Breach::DailyLoss {
            pnl: snapshot.daily_realized_pnl,
            limit: daily_loss_limit,
        });
        return assessment;
    }

    let max_portfolio_risk = Decimal::from_f64(settings.max_portfolio_risk).unwrap_or_default();
    if snapshot.total_notional > max_portfolio_risk {
        assessment.breach = Some(Breach::Exposure {
            notional: snapshot.total_notional,
            limit: max_portfolio_risk,
        });
        return assessment;
    }

    let max_drawdown = Decimal::from_f64(settings.max_drawdown_pct).unwrap_or_default();
    if settings.emergency_stop_enabled && snapshot.drawdown > max_drawdown {
        assessment.breach = Some(Breach::Drawdown {
            drawdown: snapshot.drawdown,
            limit: max_drawdown,
        });
        return assessment;
    }

    let low_balance =
        Decimal::from_f64(settings.low_balance_warning_pct).unwrap_or_default();
    if snapshot.equity > Decimal::ZERO && snapshot.cash < snapshot.equity * low_balance {
        assessment.warnings.push(format!(
            "available balance {} is below {}% of account value {}",
            snapshot.cash,
            low_balance * Decimal::ONE_HUNDRED,
            snapshot.equity
        ));
    }

    assessment
}
