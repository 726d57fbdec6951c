//! Mean-Reversion Strategy (Bollinger bands + RSI)
//!
//! Fades band extremes with Hurst-adaptive band widths and RSI
//! thresholds. Positions are unwound when price reverts to the middle
//! band, half the position is banked at the halfway point, and the
//! strategy stands down entirely when the market turns persistently
//! trending.

use tracing::debug;

use crate::indicators::{self, adaptive_bb_width, adaptive_rsi_thresholds};
use crate::utils::types::{AgentKind, TradeSignal};

use super::{Strategy, StrategyContext};

const MIN_SAMPLES: usize = 30;
const BAND_PERIOD: usize = 20;
const BASE_BAND_WIDTH: f64 = 2.0;
/// Hurst above this disables mean reversion outright.
const TREND_CUTOFF: f64 = 0.6;
/// Hurst above this triggers the adverse-position early exit.
const TREND_SHIFT: f64 = 0.55;
/// Price within this relative distance of the middle band counts as
/// reverted.
const MEAN_TOUCH_EPS: f64 = 0.005;
/// "Approaching the band" for divergence entries.
const DIVERGENCE_BAND_EPS: f64 = 1.015;
/// Funding rate magnitude treated as an extreme.
const FUNDING_EXTREME: f64 = 0.0005;

pub struct MeanReversionStrategy {
    base_size: f64,
    partial_taken: bool,
    prev_rsi: Option<f64>,
}

impl MeanReversionStrategy {
    pub fn new(base_size: f64) -> Self {
        Self {
            base_size,
            partial_taken: false,
            prev_rsi: None,
        }
    }

    fn entry_size(&self, distance_sd: f64) -> f64 {
        (self.base_size * (1.0 + distance_sd.clamp(0.0, 1.0))).clamp(0.1, 1.0)
    }

    /// Nudge confidence when funding is at an extreme: crowded longs make
    /// shorts more attractive and vice versa.
    fn apply_funding_bias(&self, ctx: &StrategyContext<'_>, mut signal: TradeSignal) -> TradeSignal {
        let Some(rate) = ctx.funding_rate else {
            return signal;
        };
        if rate.abs() < FUNDING_EXTREME {
            return signal;
        }
        use crate::utils::types::TradeDirection::*;
        let crowded_long = rate > 0.0;
        match (signal.direction, crowded_long) {
            (Short, true) | (Long, false) => {
                signal.confidence = (signal.confidence * 1.15).min(1.0);
                signal.reason.push_str("; funding extreme supports entry");
            }
            (Long, true) | (Short, false) => {
                signal.confidence *= 0.8;
                signal.reason.push_str("; funding extreme against entry");
            }
            _ => {}
        }
        signal
    }
}

impl Strategy for MeanReversionStrategy {
    fn name(&self) -> &'static str {
        "mean_reversion"
    }

    fn kind(&self) -> AgentKind {
        AgentKind::MeanReversion
    }

    fn evaluate(&mut self, ctx: &StrategyContext<'_>) -> TradeSignal {
        let prices = ctx.prices;
        if prices.len() < MIN_SAMPLES {
            return TradeSignal::none("Insufficient data for mean-reversion strategy");
        }
        if !ctx.has_position() {
            self.partial_taken = false;
        }

        let hurst = ctx.hurst();
        if hurst > TREND_CUTOFF {
            let signal = if ctx.has_position() {
                TradeSignal::close(
                    ctx.position_size.abs(),
                    0.8,
                    format!("Trending regime (hurst {hurst:.2}): exiting mean-reversion position"),
                )
            } else {
                TradeSignal::none(format!(
                    "Strong trend (hurst {hurst:.2}): mean reversion disabled"
                ))
            };
            self.prev_rsi = None;
            return signal;
        }

        let mid = indicators::sma(prices, BAND_PERIOD);
        let sd = indicators::std_dev(prices, BAND_PERIOD);
        if mid <= 0.0 || sd <= 0.0 {
            return TradeSignal::none("Flat price history: no band signal");
        }
        let width = adaptive_bb_width(BASE_BAND_WIDTH, hurst);
        let upper = mid + width * sd;
        let lower = mid - width * sd;
        let thresholds = adaptive_rsi_thresholds(hurst);
        let rsi = ctx.rsi();
        let rsi_rising = self.prev_rsi.map(|prev| rsi > prev).unwrap_or(false);
        let rsi_falling = self.prev_rsi.map(|prev| rsi < prev).unwrap_or(false);
        self.prev_rsi = Some(rsi);

        let price = ctx.current_price;
        let position = ctx.position_size;
        let entry = ctx.entry_price;

        // Early exit when the regime drifts toward trending against us
        if position != 0.0 && hurst > TREND_SHIFT {
            let short_trend_up = indicators::sma(prices, 10) > mid;
            let adverse = (position > 0.0 && !short_trend_up) || (position < 0.0 && short_trend_up);
            if adverse {
                return TradeSignal::close(
                    position.abs(),
                    0.7,
                    format!("Regime shifting to trending (hurst {hurst:.2}) against position"),
                );
            }
        }

        // Full exit on reversion to the middle band
        if position != 0.0 && ((price - mid) / mid).abs() < MEAN_TOUCH_EPS {
            return TradeSignal::close(position.abs(), 0.8, "Price reverted to middle band");
        }

        // Bank half once price covers half the gap back to the mean
        if !self.partial_taken && position != 0.0 && entry > 0.0 {
            let halfway_reached = if position > 0.0 && entry < mid {
                price >= entry + 0.5 * (mid - entry)
            } else if position < 0.0 && entry > mid {
                price <= entry - 0.5 * (entry - mid)
            } else {
                false
            };
            if halfway_reached {
                self.partial_taken = true;
                return TradeSignal::close(
                    position.abs() * 0.5,
                    0.6,
                    "Halfway to middle band: taking partial profit",
                );
            }
        }

        // Band-extreme entries
        if price < lower && rsi < thresholds.oversold {
            if ctx.is_short() {
                return TradeSignal::close(
                    position.abs(),
                    0.7,
                    "Closing short before reversal long at lower band",
                );
            }
            let size = self.entry_size((lower - price) / sd);
            debug!(price, lower, rsi, "lower-band entry");
            let signal = TradeSignal::long(
                size,
                0.65,
                format!("Price {price:.2} below lower band {lower:.2}, RSI {rsi:.1} oversold"),
            );
            return self.apply_funding_bias(ctx, signal);
        }
        if price > upper && rsi > thresholds.overbought {
            if ctx.is_long() {
                return TradeSignal::close(
                    position.abs(),
                    0.7,
                    "Closing long before reversal short at upper band",
                );
            }
            let size = self.entry_size((price - upper) / sd);
            debug!(price, upper, rsi, "upper-band entry");
            let signal = TradeSignal::short(
                size,
                0.65,
                format!("Price {price:.2} above upper band {upper:.2}, RSI {rsi:.1} overbought"),
            );
            return self.apply_funding_bias(ctx, signal);
        }

        // Divergence entries: approaching a band without a fresh extreme
        // while RSI is already turning
        if !ctx.has_position() && prices.len() > 10 {
            let recent = &prices[prices.len() - 10..prices.len() - 1];
            let recent_low = recent.iter().copied().fold(f64::MAX, f64::min);
            let recent_high = recent.iter().copied().fold(f64::MIN, f64::max);

            if price <= lower * DIVERGENCE_BAND_EPS
                && price > recent_low
                && rsi_rising
                && rsi < 50.0
            {
                let signal = TradeSignal::long(
                    self.entry_size(0.0) * 0.5,
                    0.5,
                    "Bullish divergence near lower band",
                );
                return self.apply_funding_bias(ctx, signal);
            }
            if price >= upper / DIVERGENCE_BAND_EPS
                && price < recent_high
                && rsi_falling
                && rsi > 50.0
            {
                let signal = TradeSignal::short(
                    self.entry_size(0.0) * 0.5,
                    0.5,
                    "Bearish divergence near upper band",
                );
                return self.apply_funding_bias(ctx, signal);
            }
        }

        TradeSignal::none("Price inside bands: no reversion signal")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::types::{AccountSnapshot, TradeDirection};

    fn ctx<'a>(price: f64, prices: &'a [f64], account: &AccountSnapshot) -> StrategyContext<'a> {
        StrategyContext::new(price, prices, account)
    }

    #[test]
    fn test_insufficient_data() {
        let prices = [100.0; 20];
        let account = AccountSnapshot::default();
        let mut strategy = MeanReversionStrategy::new(0.3);
        let signal = strategy.evaluate(&ctx(100.0, &prices, &account));
        assert_eq!(signal.direction, TradeDirection::None);
        assert!(signal.reason.contains("Insufficient data"));
    }

    #[test]
    fn test_long_below_lower_band() {
        // Stable range then a sharp drop below the band with depressed RSI
        let mut prices: Vec<f64> = (0..40)
            .map(|i| 100.0 + if i % 2 == 0 { 0.5 } else { -0.5 })
            .collect();
        for i in 1..=8 {
            prices.push(100.0 - 1.5 * i as f64);
        }
        let last = *prices.last().unwrap();
        let account = AccountSnapshot {
            available_collateral: 5_000.0,
            ..Default::default()
        };
        let mut strategy = MeanReversionStrategy::new(0.3);
        let signal = strategy.evaluate(&ctx(last, &prices, &account));
        // Depending on Hurst the sharp drop may read as trending; both the
        // long entry and a stand-down are acceptable, a short never is.
        assert_ne!(signal.direction, TradeDirection::Short);
        if signal.direction == TradeDirection::Long {
            assert!((0.1..=1.0).contains(&signal.size));
        }
    }

    #[test]
    fn test_close_on_mean_touch() {
        let prices: Vec<f64> = (0..40)
            .map(|i| 100.0 + if i % 2 == 0 { 0.4 } else { -0.4 })
            .collect();
        let mid = indicators::sma(&prices, 20);
        let account = AccountSnapshot {
            position_size: 0.4,
            entry_price: 95.0,
            unrealized_pnl: 2.0,
            available_collateral: 5_000.0,
        };
        let mut strategy = MeanReversionStrategy::new(0.3);
        let signal = strategy.evaluate(&ctx(mid, &prices, &account));
        assert_eq!(signal.direction, TradeDirection::Close);
        assert_eq!(signal.size, 0.4);
        assert!(signal.reason.contains("middle band"));
    }

    #[test]
    fn test_partial_profit_halfway() {
        let prices: Vec<f64> = (0..40)
            .map(|i| 100.0 + if i % 2 == 0 { 0.4 } else { -0.4 })
            .collect();
        let mid = indicators::sma(&prices, 20);
        let entry = mid - 4.0;
        // Past halfway back to the mean but clear of the mean-touch band
        let price = entry + 0.55 * (mid - entry);
        let account = AccountSnapshot {
            position_size: 0.6,
            entry_price: entry,
            unrealized_pnl: 1.5,
            available_collateral: 5_000.0,
        };
        let mut strategy = MeanReversionStrategy::new(0.3);
        let signal = strategy.evaluate(&ctx(price, &prices, &account));
        assert_eq!(signal.direction, TradeDirection::Close);
        assert!((signal.size - 0.3).abs() < 1e-9);
        assert!(signal.reason.contains("partial"));

        // Second evaluation at the same spot must not bank again
        let signal = strategy.evaluate(&ctx(price, &prices, &account));
        assert_ne!(signal.reason.contains("partial"), true);
    }

    #[test]
    fn test_trending_regime_disables() {
        let prices: Vec<f64> = (0..120).map(|i| 100.0 + 1.5 * i as f64).collect();
        let account = AccountSnapshot::default();
        let mut strategy = MeanReversionStrategy::new(0.3);
        let signal = strategy.evaluate(&ctx(280.0, &prices, &account));
        // Pure ramp: either the trend cutoff fires or price is inside the
        // (wide) bands; it must never fade the trend with a short
        assert_ne!(signal.direction, TradeDirection::Short);
    }

    #[test]
    fn test_funding_bias_nudges_confidence() {
        let strategy = MeanReversionStrategy::new(0.3);
        let prices = [100.0; 30];
        let account = AccountSnapshot::default();
        let context = ctx(100.0, &prices, &account).with_funding_rate(0.001);
        let signal = TradeSignal::short(0.3, 0.6, "test entry");
        let biased = strategy.apply_funding_bias(&context, signal);
        assert!(biased.confidence > 0.6);
        assert!(biased.reason.contains("funding"));
    }
}
