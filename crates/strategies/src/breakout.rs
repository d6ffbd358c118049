use crate::types::BreakoutSettings;
use crate::{MarketView, Strategy};
use core_types::{OrderKind, Side, Signal};
use num_traits::FromPrimitive;
use rust_decimal::Decimal;

/// Donchian channel breakout: go long when the close clears the highest
/// high of the lookback window, short when it breaks the lowest low, and
/// exit when the close crosses back through the channel midline.
#[derive(Debug)]
pub struct Breakout {
    settings: BreakoutSettings,
    size: Decimal,
}

impl Breakout {
    pub fn new(settings: BreakoutSettings) -> Self {
        let size = Decimal::from_f64(settings.size).unwrap_or_default();
        Self { settings, size }
    }
}

impl Strategy for Breakout {
    fn name(&self) -> &'static str {
        "Breakout"
    }

    fn interval_secs(&self) -> u64 {
        self.settings.interval_secs
    }

    fn analyze(&mut self, view: &MarketView) -> Option<Signal> {
        let candles = &view.candles;
        if candles.len() < self.settings.lookback + 1 || self.size <= Decimal::ZERO {
            return None;
        }

        // Channel over the completed candles, excluding the current one.
        let window = &candles[candles.len() - 1 - self.settings.lookback..candles.len() - 1];
        let channel_high = window.iter().map(|c| c.high).max()?;
        let channel_low = window.iter().map(|c| c.low).min()?;
        let midline = (channel_high + channel_low) / Decimal::TWO;
        let close = candles.last()?.close;

        match &view.position {
            None => {
                if close > channel_high {
                    Some(Signal::Enter {
                        side: Side::Buy,
                        size: self.size,
                        kind: OrderKind::Market,
                        limit_price: None,
                    })
                } else if close < channel_low {
                    Some(Signal::Enter {
                        side: Side::Sell,
                        size: self.size,
                        kind: OrderKind::Market,
                        limit_price: None,
                    })
                } else {
                    None
                }
            }
            Some(position) => {
                let against = if position.is_long() {
                    close < midline
                } else {
                    close > midline
                };
                against.then_some(Signal::Exit)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{Candle, MarketData, Position, Symbol};
    use rust_decimal_macros::dec;

    fn candles(closes: &[i64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Candle {
                timestamp_ms: i as i64 * 60_000,
                open: Decimal::from(c),
                high: Decimal::from(c) + dec!(1),
                low: Decimal::from(c) - dec!(1),
                close: Decimal::from(c),
                volume: dec!(100),
            })
            .collect()
    }

    fn view(closes: &[i64], position: Option<Position>) -> MarketView {
        let candles = candles(closes);
        let last = candles.last().unwrap().clone();
        MarketView {
            market: MarketData {
                symbol: Symbol::new("ETH"),
                bid: last.close,
                ask: last.close,
                last_price: last.close,
                volume_24h: dec!(0),
                timestamp_ms: last.timestamp_ms,
            },
            candles,
            position,
        }
    }

    fn settings() -> BreakoutSettings {
        BreakoutSettings {
            lookback: 4,
            size: 1.0,
            interval_secs: 60,
        }
    }

    #[test]
    fn breaks_out_long_above_channel_high() {
        let mut strategy = Breakout::new(settings());
        // Channel over [100..103] has high 104; close 110 clears it.
        let signal = strategy.analyze(&view(&[100, 101, 102, 103, 110], None));
        assert!(matches!(
            signal,
            Some(Signal::Enter { side: Side::Buy, kind: OrderKind::Market, .. })
        ));
    }

    #[test]
    fn holds_inside_the_channel() {
        let mut strategy = Breakout::new(settings());
        assert!(strategy.analyze(&view(&[100, 101, 102, 103, 102], None)).is_none());
    }

    #[test]
    fn exits_long_below_midline() {
        let mut strategy = Breakout::new(settings());
        let position = Position {
            symbol: Symbol::new("ETH"),
            size: dec!(1),
            entry_price: dec!(110),
            mark_price: dec!(95),
            unrealized_pnl: dec!(-15),
            leverage: 1,
        };
        // Channel [100..110], midline ~105; close 95 is below it.
        let signal = strategy.analyze(&view(&[100, 104, 108, 110, 95], Some(position)));
        assert_eq!(signal, Some(Signal::Exit));
    }

    #[test]
    fn needs_a_full_lookback_window() {
        let mut strategy = Breakout::new(settings());
        assert!(strategy.analyze(&view(&[100, 110], None)).is_none());
    }
}
