//! Technical/Statistical Indicator Library
//!
//! Pure, deterministic functions over close-only price sequences
//! (oldest first). No I/O, no panics: every function returns a documented
//! neutral default when the input is shorter than its window or an input
//! is degenerate.
//!
//! ATR and the Hurst estimator run on consecutive close deltas rather than
//! true OHLC ranges, which underestimates intrabar movement. Downstream
//! ATR multipliers are tuned against that bias, so it is kept as-is.

use serde::{Deserialize, Serialize};

use crate::utils::types::MarketRegime;

/// Kelly fraction is hard-capped regardless of inputs.
pub const MAX_KELLY_FRACTION: f64 = 0.25;

/// Annualization factor for realized volatility, assuming hourly samples.
const PERIODS_PER_YEAR: f64 = 8_760.0;

/// Default scale bounds for `adaptive_period`.
pub const DEFAULT_MIN_PERIOD_SCALE: f64 = 0.5;
pub const DEFAULT_MAX_PERIOD_SCALE: f64 = 2.0;

/// Simple moving average over the last `period` samples. 0 below window.
pub fn sma(prices: &[f64], period: usize) -> f64 {
    if period == 0 || prices.len() < period {
        return 0.0;
    }
    let window = &prices[prices.len() - period..];
    window.iter().sum::<f64>() / period as f64
}

/// Exponential moving average seeded with the SMA of the first `period`
/// samples. 0 below window.
pub fn ema(prices: &[f64], period: usize) -> f64 {
    if period == 0 || prices.len() < period {
        return 0.0;
    }
    let k = 2.0 / (period as f64 + 1.0);
    let mut value = prices[..period].iter().sum::<f64>() / period as f64;
    for &price in &prices[period..] {
        value = price * k + value * (1.0 - k);
    }
    value
}

/// Population standard deviation of the last `period` samples. 0 below window.
pub fn std_dev(prices: &[f64], period: usize) -> f64 {
    if period == 0 || prices.len() < period {
        return 0.0;
    }
    let window = &prices[prices.len() - period..];
    let mean = window.iter().sum::<f64>() / period as f64;
    let variance = window.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / period as f64;
    variance.sqrt()
}

/// Relative strength index over the trailing `period` deltas.
/// Returns 50 (neutral) with insufficient data, 100 when there are no losses.
pub fn rsi(prices: &[f64], period: usize) -> f64 {
    if period == 0 || prices.len() < period + 1 {
        return 50.0;
    }
    let window = &prices[prices.len() - period - 1..];
    let (mut gains, mut losses) = (0.0_f64, 0.0_f64);
    for pair in window.windows(2) {
        let delta = pair[1] - pair[0];
        if delta >= 0.0 {
            gains += delta;
        } else {
            losses += -delta;
        }
    }
    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

/// Average true range approximated from consecutive close deltas
/// (no high/low data at this layer). 0 below `period + 1` samples.
pub fn atr(prices: &[f64], period: usize) -> f64 {
    if period == 0 || prices.len() < period + 1 {
        return 0.0;
    }
    let window = &prices[prices.len() - period - 1..];
    let sum: f64 = window.windows(2).map(|pair| (pair[1] - pair[0]).abs()).sum();
    sum / period as f64
}

/// ATR as a percentage of the last price.
pub fn atr_percent(prices: &[f64], period: usize) -> f64 {
    let last = match prices.last() {
        Some(&p) if p > 0.0 => p,
        _ => return 0.0,
    };
    atr(prices, period) / last * 100.0
}

/// Stop distance in price units: ATR scaled by a multiplier.
pub fn atr_stop_distance(prices: &[f64], multiplier: f64, period: usize) -> f64 {
    atr(prices, period) * multiplier
}

/// Take-profit distance in price units: ATR scaled by a multiplier.
pub fn atr_take_profit_distance(prices: &[f64], multiplier: f64, period: usize) -> f64 {
    atr(prices, period) * multiplier
}

/// Hurst exponent via rescaled-range (R/S) analysis.
///
/// Log returns are split into non-overlapping chunks over a geometric
/// window ladder (8, 16, 32, ... up to half the series); the slope of
/// ln(R/S) against ln(window) is the estimate, clamped to [0, 1].
/// Returns 0.5 (random-walk neutral) for short series.
pub fn hurst_exponent(prices: &[f64]) -> f64 {
    if prices.len() < 20 {
        return 0.5;
    }
    let returns: Vec<f64> = prices
        .windows(2)
        .filter(|pair| pair[0] > 0.0 && pair[1] > 0.0)
        .map(|pair| (pair[1] / pair[0]).ln())
        .collect();
    let n = returns.len();

    let mut sizes = Vec::new();
    let mut w = 8;
    while w <= n / 2 {
        sizes.push(w);
        w *= 2;
    }
    // Need at least two ladder rungs for a regression
    if sizes.len() < 2 {
        return 0.5;
    }

    let mut points = Vec::with_capacity(sizes.len());
    for &size in &sizes {
        let mut rs_sum = 0.0;
        let mut chunks = 0usize;
        for chunk in returns.chunks_exact(size) {
            let mean = chunk.iter().sum::<f64>() / size as f64;
            let mut cum = 0.0;
            let (mut max_dev, mut min_dev) = (f64::MIN, f64::MAX);
            let mut var = 0.0;
            for &r in chunk {
                cum += r - mean;
                max_dev = max_dev.max(cum);
                min_dev = min_dev.min(cum);
                var += (r - mean).powi(2);
            }
            let range = max_dev - min_dev;
            let std = (var / size as f64).sqrt();
            if std > 0.0 {
                rs_sum += range / std;
                chunks += 1;
            }
        }
        if chunks > 0 {
            let avg_rs = rs_sum / chunks as f64;
            if avg_rs > 0.0 {
                points.push(((size as f64).ln(), avg_rs.ln()));
            }
        }
    }
    if points.len() < 2 {
        return 0.5;
    }

    // Least-squares slope of ln(R/S) vs ln(window size)
    let n_pts = points.len() as f64;
    let x_mean = points.iter().map(|(x, _)| x).sum::<f64>() / n_pts;
    let y_mean = points.iter().map(|(_, y)| y).sum::<f64>() / n_pts;
    let (mut num, mut den) = (0.0, 0.0);
    for (x, y) in &points {
        num += (x - x_mean) * (y - y_mean);
        den += (x - x_mean).powi(2);
    }
    if den == 0.0 {
        return 0.5;
    }
    let slope = num / den;
    if !slope.is_finite() {
        return 0.5;
    }
    slope.clamp(0.0, 1.0)
}

/// Map a Hurst exponent to a primary market regime.
pub fn classify_regime(hurst: f64) -> MarketRegime {
    if hurst > 0.55 {
        MarketRegime::Trending
    } else if hurst < 0.45 {
        MarketRegime::MeanReverting
    } else {
        MarketRegime::Random
    }
}

/// Directional-movement trend strength derived from close deltas.
/// Always >= 0; 0 below `period + 1` samples.
pub fn adx(prices: &[f64], period: usize) -> f64 {
    if period == 0 || prices.len() < period + 1 {
        return 0.0;
    }
    let window = &prices[prices.len() - period - 1..];
    let (mut plus_dm, mut minus_dm, mut true_range) = (0.0_f64, 0.0_f64, 0.0_f64);
    for pair in window.windows(2) {
        let delta = pair[1] - pair[0];
        if delta > 0.0 {
            plus_dm += delta;
        } else {
            minus_dm += -delta;
        }
        true_range += delta.abs();
    }
    if true_range == 0.0 {
        return 0.0;
    }
    let plus_di = 100.0 * plus_dm / true_range;
    let minus_di = 100.0 * minus_dm / true_range;
    let di_sum = plus_di + minus_di;
    if di_sum == 0.0 {
        return 0.0;
    }
    100.0 * (plus_di - minus_di).abs() / di_sum
}

/// Annualized standard deviation of log returns over the trailing window.
/// 0 below `period + 1` samples.
pub fn realized_volatility(prices: &[f64], period: usize) -> f64 {
    if period < 2 || prices.len() < period + 1 {
        return 0.0;
    }
    let window = &prices[prices.len() - period - 1..];
    let returns: Vec<f64> = window
        .windows(2)
        .filter(|pair| pair[0] > 0.0 && pair[1] > 0.0)
        .map(|pair| (pair[1] / pair[0]).ln())
        .collect();
    if returns.len() < 2 {
        return 0.0;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    variance.sqrt() * PERIODS_PER_YEAR.sqrt()
}

/// Percentile rank (0-100) of the current realized volatility against the
/// trailing history of rolling-window volatilities. 50 with thin history.
pub fn volatility_percentile(prices: &[f64], period: usize) -> f64 {
    if period < 2 || prices.len() < period + 1 {
        return 50.0;
    }
    let mut vols = Vec::new();
    for end in (period + 1)..=prices.len() {
        let v = realized_volatility(&prices[..end], period);
        if v > 0.0 {
            vols.push(v);
        }
    }
    if vols.len() < 10 {
        return 50.0;
    }
    let current = *vols.last().unwrap_or(&0.0);
    let below = vols.iter().filter(|&&v| v <= current).count();
    below as f64 / vols.len() as f64 * 100.0
}

/// Kelly fraction `f* = w - (1 - w) / r`, scaled by `fraction_multiplier`
/// (0.5 = half-Kelly) and hard-capped at [`MAX_KELLY_FRACTION`].
/// Returns 0 for a non-positive edge or invalid inputs.
pub fn kelly_fraction(win_rate: f64, avg_win_loss_ratio: f64, fraction_multiplier: f64) -> f64 {
    if win_rate <= 0.0 || win_rate >= 1.0 || avg_win_loss_ratio <= 0.0 || fraction_multiplier <= 0.0
    {
        return 0.0;
    }
    let edge = win_rate - (1.0 - win_rate) / avg_win_loss_ratio;
    if edge <= 0.0 {
        return 0.0;
    }
    (edge * fraction_multiplier).min(MAX_KELLY_FRACTION)
}

/// Kelly-derived position size in base-asset units, scaled down as current
/// volatility rises above its average. Always strictly below
/// `account_value / price`.
pub fn kelly_position_size(
    account_value: f64,
    price: f64,
    win_rate: f64,
    avg_win_loss_ratio: f64,
    current_vol: f64,
    avg_vol: f64,
) -> f64 {
    if account_value <= 0.0 || price <= 0.0 {
        return 0.0;
    }
    let fraction = kelly_fraction(win_rate, avg_win_loss_ratio, 1.0);
    let vol_scale = if avg_vol > 0.0 && current_vol > avg_vol {
        avg_vol / current_vol
    } else {
        1.0
    };
    fraction * account_value / price * vol_scale
}

/// Volatility-adaptive lookback: the base period stretches when current ATR
/// runs above its average and shrinks when below, clamped to
/// `[base * min_scale, base * max_scale]`. Base is returned unchanged when
/// `avg_atr` is zero.
pub fn adaptive_period(
    base_period: usize,
    current_atr: f64,
    avg_atr: f64,
    min_scale: f64,
    max_scale: f64,
) -> usize {
    if base_period == 0 || avg_atr <= 0.0 || current_atr < 0.0 {
        return base_period;
    }
    let base = base_period as f64;
    let scaled = (base * current_atr / avg_atr).clamp(base * min_scale, base * max_scale);
    (scaled.round() as usize).max(1)
}

/// Bollinger band width multiplier adapted to the Hurst exponent:
/// tighter bands in mean-reverting markets, wider in trending ones.
pub fn adaptive_bb_width(base_width: f64, hurst: f64) -> f64 {
    base_width * (0.7 + 0.6 * hurst.clamp(0.0, 1.0))
}

/// Adaptive RSI entry thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RsiThresholds {
    pub oversold: f64,
    pub overbought: f64,
}

/// RSI thresholds by regime: trending markets demand deeper extremes
/// before fading a move, mean-reverting markets trigger earlier.
pub fn adaptive_rsi_thresholds(hurst: f64) -> RsiThresholds {
    if hurst > 0.55 {
        RsiThresholds {
            oversold: 20.0,
            overbought: 80.0,
        }
    } else if hurst < 0.45 {
        RsiThresholds {
            oversold: 35.0,
            overbought: 65.0,
        }
    } else {
        RsiThresholds {
            oversold: 30.0,
            overbought: 70.0,
        }
    }
}

/// Full per-tick indicator bundle, derived fresh from the price series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub sma10: f64,
    pub sma20: f64,
    pub sma30: f64,
    pub ema10: f64,
    pub ema20: f64,
    pub std_dev20: f64,
    pub rsi14: f64,
    pub atr14: f64,
    pub atr_percent: f64,
    pub hurst: f64,
    pub regime: MarketRegime,
    pub adx14: f64,
    pub realized_vol: f64,
    pub vol_percentile: f64,
}

/// Convenience aggregate for callers that want the full snapshot in one call.
pub fn calculate_indicators(prices: &[f64]) -> IndicatorSnapshot {
    let hurst = hurst_exponent(prices);
    IndicatorSnapshot {
        sma10: sma(prices, 10),
        sma20: sma(prices, 20),
        sma30: sma(prices, 30),
        ema10: ema(prices, 10),
        ema20: ema(prices, 20),
        std_dev20: std_dev(prices, 20),
        rsi14: rsi(prices, 14),
        atr14: atr(prices, 14),
        atr_percent: atr_percent(prices, 14),
        hurst,
        regime: classify_regime(hurst),
        adx14: adx(prices, 14),
        realized_vol: realized_volatility(prices, 20),
        vol_percentile: volatility_percentile(prices, 20),
    }
}
