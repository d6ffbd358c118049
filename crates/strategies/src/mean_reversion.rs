use crate::types::MeanReversionSettings;
use crate::{MarketView, Strategy};
use core_types::{OrderKind, Side, Signal};
use num_traits::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use ta::Next;
use ta::indicators::{SimpleMovingAverage as Sma, StandardDeviation as Sd};

/// Fades stretched prices: when the close sits more than `entry_z` standard
/// deviations from its SMA, trade back toward the mean; close the fade once
/// the deviation collapses below `exit_z`.
#[derive(Debug)]
pub struct MeanReversion {
    settings: MeanReversionSettings,
    size: Decimal,
}

impl MeanReversion {
    pub fn new(settings: MeanReversionSettings) -> Self {
        let size = Decimal::from_f64(settings.size).unwrap_or_default();
        Self { settings, size }
    }

    /// Z-score of the latest close against the SMA of the window. The
    /// indicators are re-fed from the candle slice each cycle, so the same
    /// view always yields the same score.
    fn z_score(&self, view: &MarketView) -> Option<f64> {
        let candles = &view.candles;
        if candles.len() < self.settings.period {
            return None;
        }

        let mut sma = Sma::new(self.settings.period).ok()?;
        let mut sd = Sd::new(self.settings.period).ok()?;
        let mut mean = 0.0;
        let mut deviation = 0.0;
        for candle in &candles[candles.len() - self.settings.period..] {
            let close = candle.close.to_f64()?;
            mean = sma.next(close);
            deviation = sd.next(close);
        }

        if deviation < f64::EPSILON {
            return None;
        }
        let close = candles.last()?.close.to_f64()?;
        Some((close - mean) / deviation)
    }
}

impl Strategy for MeanReversion {
    fn name(&self) -> &'static str {
        "MeanReversion"
    }

    fn interval_secs(&self) -> u64 {
        self.settings.interval_secs
    }

    fn analyze(&mut self, view: &MarketView) -> Option<Signal> {
        if self.size <= Decimal::ZERO {
            return None;
        }
        let z = self.z_score(view)?;

        match &view.position {
            None => {
                if z >= self.settings.entry_z {
                    Some(Signal::Enter {
                        side: Side::Sell,
                        size: self.size,
                        kind: OrderKind::Market,
                        limit_price: None,
                    })
                } else if z <= -self.settings.entry_z {
                    Some(Signal::Enter {
                        side: Side::Buy,
                        size: self.size,
                        kind: OrderKind::Market,
                        limit_price: None,
                    })
                } else {
                    None
                }
            }
            Some(_) => (z.abs() <= self.settings.exit_z).then_some(Signal::Exit),
        }
    }
}
