//! Momentum Strategy (SMA crossover)
//!
//! Trades breakout crossovers with volatility-adaptive lookbacks:
//! - Filters out mean-reverting regimes entirely
//! - Requires ADX >= 20 before opening
//! - Confirms crossovers against a breakout window
//! - Adds on pullbacks to the fast SMA while in profit
//! - Exits on SMA convergence (trend exhaustion)

use tracing::debug;

use crate::indicators::{
    self, adaptive_period, DEFAULT_MAX_PERIOD_SCALE, DEFAULT_MIN_PERIOD_SCALE,
};
use crate::utils::types::{AgentKind, MarketRegime, TradeSignal};

use super::{Strategy, StrategyContext};

const MIN_SAMPLES: usize = 50;
const MIN_ADX_FOR_ENTRY: f64 = 20.0;
const FAST_PERIOD: usize = 10;
const SLOW_PERIOD: usize = 30;
const BREAKOUT_PERIOD: usize = 20;
/// SMAs within this relative distance count as converged.
const CONVERGENCE_EPS: f64 = 0.001;
/// Breakout confirmation: price within 0.5% of the window extreme.
const BREAKOUT_CONFIRM: f64 = 0.995;
/// Pullback proximity to the fast SMA.
const PULLBACK_EPS: f64 = 0.003;

pub struct MomentumStrategy {
    base_size: f64,
    adaptive_periods: bool,
}

impl MomentumStrategy {
    pub fn new(base_size: f64, adaptive_periods: bool) -> Self {
        Self {
            base_size,
            adaptive_periods,
        }
    }

    /// Fast/slow/breakout lookbacks, stretched with current-vs-average ATR
    /// when adaptive periods are enabled, fixed at the base values otherwise.
    fn lookbacks(&self, ctx: &StrategyContext<'_>) -> (usize, usize, usize) {
        if !self.adaptive_periods {
            return (FAST_PERIOD, SLOW_PERIOD, BREAKOUT_PERIOD);
        }
        let current_atr = ctx.atr();
        let avg_atr = indicators::atr(ctx.prices, 50);
        let scale = |base| {
            adaptive_period(
                base,
                current_atr,
                avg_atr,
                DEFAULT_MIN_PERIOD_SCALE,
                DEFAULT_MAX_PERIOD_SCALE,
            )
        };
        (scale(FAST_PERIOD), scale(SLOW_PERIOD), scale(BREAKOUT_PERIOD))
    }

    /// Position size scaled by trend strength, Hurst persistence, and
    /// inverse volatility, clamped to [0.1, 1.0] base units.
    fn position_size(&self, ctx: &StrategyContext<'_>, hurst: f64) -> f64 {
        let adx_scale = (ctx.adx() / 40.0).min(1.5);
        let hurst_scale = 0.5 + (hurst - 0.5).abs() * 2.0;
        let vol = indicators::realized_volatility(ctx.prices, 20);
        let vol_scale = if vol > 0.0 { (0.5 / vol).min(1.5) } else { 1.0 };
        (self.base_size * adx_scale * hurst_scale * vol_scale).clamp(0.1, 1.0)
    }
}

impl Strategy for MomentumStrategy {
    fn name(&self) -> &'static str {
        "momentum"
    }

    fn kind(&self) -> AgentKind {
        AgentKind::Momentum
    }

    fn evaluate(&mut self, ctx: &StrategyContext<'_>) -> TradeSignal {
        let prices = ctx.prices;
        if prices.len() < MIN_SAMPLES {
            return TradeSignal::none("Insufficient data for momentum strategy");
        }

        let hurst = ctx.hurst();
        if ctx.regime() == MarketRegime::MeanReverting {
            if ctx.has_position() {
                return TradeSignal::close(
                    ctx.position_size.abs(),
                    0.8,
                    format!("Mean-reverting regime (hurst {hurst:.2}): closing momentum position"),
                );
            }
            return TradeSignal::none(format!(
                "Mean-reverting regime (hurst {hurst:.2}) unfavourable for momentum"
            ));
        }

        let (fast_period, slow_period, breakout_period) = self.lookbacks(ctx);
        let breakout_period = breakout_period.min(prices.len());

        let fast = indicators::sma(prices, fast_period);
        let slow = indicators::sma(prices, slow_period);
        let prev = &prices[..prices.len() - 1];
        let prev_fast = indicators::sma(prev, fast_period);
        let prev_slow = indicators::sma(prev, slow_period);

        // Trend exhaustion: the SMAs have converged
        if ctx.has_position() && slow > 0.0 && ((fast - slow) / slow).abs() < CONVERGENCE_EPS {
            return TradeSignal::close(
                ctx.position_size.abs(),
                0.7,
                "Trend exhaustion: SMAs converged",
            );
        }

        let adx = ctx.adx();
        if adx < MIN_ADX_FOR_ENTRY {
            return TradeSignal::none(format!(
                "ADX {adx:.1} below {MIN_ADX_FOR_ENTRY:.0}: trend too weak to enter"
            ));
        }

        let price = ctx.current_price;
        let window = &prices[prices.len() - breakout_period..];
        let window_high = window.iter().copied().fold(f64::MIN, f64::max);
        let window_low = window.iter().copied().fold(f64::MAX, f64::min);
        let size = self.position_size(ctx, hurst);
        let confidence = (0.5 + (adx / 100.0) + (hurst - 0.5).max(0.0)).min(1.0);

        let bullish_cross = prev_fast <= prev_slow && fast > slow;
        if bullish_cross && price >= window_high * BREAKOUT_CONFIRM && price > fast && price > slow
        {
            debug!(fast, slow, price, "bullish crossover confirmed");
            return TradeSignal::long(
                size,
                confidence,
                format!("Bullish SMA crossover with breakout above {window_high:.2}"),
            );
        }

        let bearish_cross = prev_fast >= prev_slow && fast < slow;
        if bearish_cross
            && price <= window_low * (2.0 - BREAKOUT_CONFIRM)
            && price < fast
            && price < slow
        {
            debug!(fast, slow, price, "bearish crossover confirmed");
            return TradeSignal::short(
                size,
                confidence,
                format!("Bearish SMA crossover with breakdown below {window_low:.2}"),
            );
        }

        // Pullback adds to a winning trend
        if ctx.unrealized_pnl > 0.0 && fast > 0.0 && ((price - fast) / fast).abs() < PULLBACK_EPS {
            let last_delta = price - prices[prices.len() - 2];
            if ctx.is_long() && last_delta > 0.0 {
                return TradeSignal::long(
                    size * 0.5,
                    confidence * 0.8,
                    "Pullback bounce off fast SMA: adding to long",
                );
            }
            if ctx.is_short() && last_delta < 0.0 {
                return TradeSignal::short(
                    size * 0.5,
                    confidence * 0.8,
                    "Pullback rejection at fast SMA: adding to short",
                );
            }
        }

        TradeSignal::none("No momentum crossover signal")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::types::{AccountSnapshot, TradeDirection};

    fn ctx<'a>(prices: &'a [f64], account: &AccountSnapshot) -> StrategyContext<'a> {
        StrategyContext::new(*prices.last().unwrap(), prices, account)
    }

    #[test]
    fn test_insufficient_data() {
        let prices: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let account = AccountSnapshot::default();
        let mut strategy = MomentumStrategy::new(0.5, true);
        let signal = strategy.evaluate(&ctx(&prices, &account));
        assert_eq!(signal.direction, TradeDirection::None);
        assert!(signal.reason.contains("Insufficient data"));
    }

    #[test]
    fn test_never_shorts_without_position_in_recovery() {
        // 25-sample decline then 15-sample rise, flat position: the
        // strategy must emit long or none, never short or close.
        let mut prices = Vec::new();
        for i in 0..25 {
            prices.push(210.0 - 0.3 * i as f64);
        }
        let bottom = *prices.last().unwrap();
        for i in 1..=15 {
            prices.push(bottom + 1.22 * i as f64);
        }
        // Pad the front so the 50-sample minimum is met
        let mut padded: Vec<f64> = (0..20).map(|i| 209.0 + 0.05 * i as f64).collect();
        padded.extend(prices);

        let account = AccountSnapshot {
            available_collateral: 10_000.0,
            ..Default::default()
        };
        let mut strategy = MomentumStrategy::new(0.5, true);
        let signal = strategy.evaluate(&ctx(&padded, &account));

        match signal.direction {
            TradeDirection::Long => {
                assert!((0.1..=1.0).contains(&signal.size));
            }
            TradeDirection::None => {}
            other => panic!("unexpected direction {other} with no open position"),
        }
    }

    #[test]
    fn test_mean_reverting_regime_closes_position() {
        // Strongly alternating prices push Hurst below 0.45
        let prices: Vec<f64> = (0..120)
            .map(|i| 100.0 + if i % 2 == 0 { 2.0 } else { -2.0 })
            .collect();
        let account = AccountSnapshot {
            position_size: 0.4,
            entry_price: 100.0,
            unrealized_pnl: 5.0,
            available_collateral: 1_000.0,
        };
        let mut strategy = MomentumStrategy::new(0.5, true);
        let signal = strategy.evaluate(&ctx(&prices, &account));
        assert_eq!(signal.direction, TradeDirection::Close);
        assert_eq!(signal.size, 0.4);
        assert!(signal.reason.contains("Mean-reverting"));
    }

    #[test]
    fn test_adaptive_periods_toggle() {
        // Calm history then a burst: current ATR runs well above its
        // 50-sample average
        let mut prices: Vec<f64> = (0..80)
            .map(|i| 100.0 + 0.05 * (i % 2) as f64)
            .collect();
        let top = *prices.last().unwrap();
        for i in 1..=20 {
            prices.push(top + 3.0 * i as f64);
        }
        let account = AccountSnapshot::default();

        let fixed = MomentumStrategy::new(0.5, false);
        let context = ctx(&prices, &account);
        assert_eq!(fixed.lookbacks(&context), (10, 30, 20));

        let adaptive = MomentumStrategy::new(0.5, true);
        let (fast, slow, breakout) = adaptive.lookbacks(&context);
        assert!(fast > 10, "fast lookback should stretch, got {fast}");
        assert!(slow > 30, "slow lookback should stretch, got {slow}");
        assert!(breakout > 20, "breakout lookback should stretch, got {breakout}");
    }

    #[test]
    fn test_size_clamped() {
        let prices: Vec<f64> = (0..120).map(|i| 100.0 + 0.8 * i as f64).collect();
        let account = AccountSnapshot::default();
        let strategy = MomentumStrategy::new(0.5, true);
        let context = ctx(&prices, &account);
        let size = strategy.position_size(&context, context.hurst());
        assert!((0.1..=1.0).contains(&size));
    }
}
