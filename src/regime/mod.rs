//! Market Regime Classifier
//!
//! Composes the indicator library into a per-tick regime classification:
//! - Primary regime from the Hurst exponent
//! - Volatility regime from percentile ranking
//! - Trend strength from ADX
//! - Confidence, risk adjustment, and per-agent recommendations
//!
//! The only cross-call state is [`RegimeTracker`], which is owned per agent
//! and never shared.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::indicators::{self, IndicatorSnapshot};
use crate::utils::types::{AgentKind, MarketRegime, TrendStrength, VolatilityRegime};

/// Composite market-state classification, recomputed fresh each tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeState {
    pub primary: MarketRegime,
    pub volatility: VolatilityRegime,
    pub trend_strength: TrendStrength,
    pub hurst: f64,
    pub atr_percent: f64,
    pub adx: f64,
    /// Agreement between the Hurst and ADX reads, in [0, 1]
    pub confidence: f64,
    /// Position-size dampener in (0, 1.5], inverse to volatility
    pub risk_adjustment: f64,
    pub recommended_agents: Vec<AgentKind>,
    pub description: String,
}

impl RegimeState {
    pub fn recommends(&self, agent: AgentKind) -> bool {
        self.recommended_agents.contains(&agent)
    }
}

/// Volatility percentile buckets: <30 low, 30-69 medium, 70-89 high,
/// >=90 extreme.
pub fn classify_volatility_regime(percentile: f64) -> VolatilityRegime {
    if percentile >= 90.0 {
        VolatilityRegime::Extreme
    } else if percentile >= 70.0 {
        VolatilityRegime::High
    } else if percentile >= 30.0 {
        VolatilityRegime::Medium
    } else {
        VolatilityRegime::Low
    }
}

/// ADX buckets: <15 none, 15-24 weak, 25-39 moderate, >=40 strong.
pub fn classify_trend_strength(adx: f64) -> TrendStrength {
    if adx >= 40.0 {
        TrendStrength::Strong
    } else if adx >= 25.0 {
        TrendStrength::Moderate
    } else if adx >= 15.0 {
        TrendStrength::Weak
    } else {
        TrendStrength::None
    }
}

fn risk_adjustment_for(volatility: VolatilityRegime) -> f64 {
    match volatility {
        VolatilityRegime::Low => 1.2,
        VolatilityRegime::Medium => 1.0,
        VolatilityRegime::High => 0.8,
        VolatilityRegime::Extreme => 0.6,
    }
}

fn recommended_agents_for(
    primary: MarketRegime,
    volatility: VolatilityRegime,
    trend: TrendStrength,
) -> Vec<AgentKind> {
    let mut agents = Vec::new();

    if primary == MarketRegime::Trending
        && matches!(trend, TrendStrength::Moderate | TrendStrength::Strong)
    {
        agents.push(AgentKind::Momentum);
    }
    if matches!(primary, MarketRegime::MeanReverting | MarketRegime::Random) {
        agents.push(AgentKind::MeanReversion);
    }
    if matches!(volatility, VolatilityRegime::Low | VolatilityRegime::Medium)
        && trend != TrendStrength::Strong
    {
        agents.push(AgentKind::Grid);
    }

    // The recommendation set is never empty; fall back to the most
    // defensive strategy.
    if agents.is_empty() {
        agents.push(AgentKind::MeanReversion);
    }
    agents
}

/// Classify the current market regime from the rolling price history.
pub fn detect_regime(prices: &[f64]) -> RegimeState {
    detect_regime_from(&indicators::calculate_indicators(prices))
}

/// Classify from an already-computed indicator bundle. Callers that hold a
/// fresh snapshot use this to avoid recomputing the Hurst R/S analysis.
pub fn detect_regime_from(snapshot: &IndicatorSnapshot) -> RegimeState {
    let hurst = snapshot.hurst;
    let primary = snapshot.regime;
    let atr_percent = snapshot.atr_percent;
    let adx = snapshot.adx14;

    let volatility = classify_volatility_regime(snapshot.vol_percentile);
    let trend_strength = classify_trend_strength(adx);

    // Confidence: base prior, plus agreement between the two trend reads,
    // plus how far Hurst sits from the random-walk midpoint.
    let hurst_trending = hurst > 0.55;
    let adx_trending = adx >= 25.0;
    let agreement = hurst_trending == adx_trending;
    let hurst_distance = ((hurst - 0.5).abs() * 2.0).min(1.0);
    let confidence =
        (0.4 + if agreement { 0.3 } else { 0.0 } + 0.3 * hurst_distance).clamp(0.0, 1.0);

    let risk_adjustment = risk_adjustment_for(volatility);
    let recommended_agents = recommended_agents_for(primary, volatility, trend_strength);

    let description = format!(
        "{primary} market, {volatility} volatility, {trend_strength} trend (hurst {hurst:.2}, adx {adx:.1})"
    );
    debug!(%primary, %volatility, %trend_strength, confidence, "regime detected");

    RegimeState {
        primary,
        volatility,
        trend_strength,
        hurst,
        atr_percent,
        adx,
        confidence,
        risk_adjustment,
        recommended_agents,
        description,
    }
}

/// Result of a regime-change check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegimeChange {
    pub changed: bool,
    pub from: Option<MarketRegime>,
    pub to: MarketRegime,
    pub change_count: u64,
}

/// Session-scoped regime-change tracker. One instance per agent; explicit
/// instance state so concurrent agents and test runs never interfere.
#[derive(Debug, Default)]
pub struct RegimeTracker {
    last: Option<MarketRegime>,
    change_count: u64,
}

impl RegimeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the primary regime from the price history and compare it
    /// against the last seen one.
    pub fn check(&mut self, prices: &[f64]) -> RegimeChange {
        self.check_regime(indicators::classify_regime(indicators::hurst_exponent(
            prices,
        )))
    }

    /// Compare an already-classified primary regime against the last seen
    /// one. The first call after construction or reset always reports
    /// `changed = false, from = None`.
    pub fn check_regime(&mut self, current: MarketRegime) -> RegimeChange {
        let from = self.last;
        let changed = matches!(from, Some(prev) if prev != current);
        if changed {
            self.change_count += 1;
        }
        self.last = Some(current);
        RegimeChange {
            changed,
            from,
            to: current,
            change_count: self.change_count,
        }
    }

    /// Clear the tracker back to its initial untouched state.
    pub fn reset(&mut self) {
        self.last = None;
        self.change_count = 0;
    }

    pub fn change_count(&self) -> u64 {
        self.change_count
    }
}

/// Gate decision for one agent under the current regime.
#[derive(Debug, Clone)]
pub struct AgentGate {
    pub should_trade: bool,
    pub size_multiplier: f64,
    pub reason: String,
}

/// Decide whether an agent should trade under the given regime, and at
/// what size. The reason is always populated.
pub fn should_agent_trade(agent: AgentKind, regime: &RegimeState) -> AgentGate {
    if regime.recommends(agent) {
        return AgentGate {
            should_trade: true,
            size_multiplier: regime.risk_adjustment.min(1.0),
            reason: format!("{agent} recommended: {}", regime.description),
        };
    }

    if regime.volatility == VolatilityRegime::Extreme {
        return AgentGate {
            should_trade: false,
            size_multiplier: 0.0,
            reason: format!("{agent} not recommended under extreme volatility"),
        };
    }

    // Off-regime agents may still trade, at reduced size.
    AgentGate {
        should_trade: true,
        size_multiplier: 0.5 * regime.risk_adjustment.min(1.0),
        reason: format!("{agent} off-regime, trading at reduced size: {}", regime.description),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trending_prices() -> Vec<f64> {
        (0..120).map(|i| 100.0 + 0.5 * i as f64).collect()
    }

    #[test]
    fn test_volatility_regime_boundaries() {
        assert_eq!(classify_volatility_regime(0.0), VolatilityRegime::Low);
        assert_eq!(classify_volatility_regime(29.9), VolatilityRegime::Low);
        assert_eq!(classify_volatility_regime(30.0), VolatilityRegime::Medium);
        assert_eq!(classify_volatility_regime(69.9), VolatilityRegime::Medium);
        assert_eq!(classify_volatility_regime(70.0), VolatilityRegime::High);
        assert_eq!(classify_volatility_regime(89.9), VolatilityRegime::High);
        assert_eq!(classify_volatility_regime(90.0), VolatilityRegime::Extreme);
    }

    #[test]
    fn test_trend_strength_boundaries() {
        assert_eq!(classify_trend_strength(0.0), TrendStrength::None);
        assert_eq!(classify_trend_strength(14.9), TrendStrength::None);
        assert_eq!(classify_trend_strength(15.0), TrendStrength::Weak);
        assert_eq!(classify_trend_strength(25.0), TrendStrength::Moderate);
        assert_eq!(classify_trend_strength(40.0), TrendStrength::Strong);
    }

    #[test]
    fn test_detect_regime_invariants() {
        let state = detect_regime(&trending_prices());
        assert!((0.0..=1.0).contains(&state.confidence));
        assert!(state.risk_adjustment > 0.0 && state.risk_adjustment <= 1.5);
        assert!(!state.recommended_agents.is_empty());
        assert!(!state.description.is_empty());
    }

    #[test]
    fn test_risk_adjustment_floor() {
        // Extreme volatility must keep at least half the low-vol adjustment
        let extreme = risk_adjustment_for(VolatilityRegime::Extreme);
        let low = risk_adjustment_for(VolatilityRegime::Low);
        assert!(extreme >= low / 2.0);
    }

    #[test]
    fn test_detect_regime_from_matches_price_path() {
        let prices = trending_prices();
        let snapshot = indicators::calculate_indicators(&prices);
        let from_snapshot = detect_regime_from(&snapshot);
        let from_prices = detect_regime(&prices);

        assert_eq!(from_snapshot.primary, from_prices.primary);
        assert_eq!(from_snapshot.volatility, from_prices.volatility);
        assert_eq!(from_snapshot.trend_strength, from_prices.trend_strength);
        assert_eq!(from_snapshot.hurst, from_prices.hurst);
        assert_eq!(from_snapshot.confidence, from_prices.confidence);
        assert_eq!(from_snapshot.recommended_agents, from_prices.recommended_agents);
    }

    #[test]
    fn test_tracker_check_regime_counts_transitions() {
        let mut tracker = RegimeTracker::new();

        let first = tracker.check_regime(MarketRegime::Random);
        assert!(!first.changed);
        assert_eq!(first.from, None);

        let flip = tracker.check_regime(MarketRegime::Trending);
        assert!(flip.changed);
        assert_eq!(flip.from, Some(MarketRegime::Random));
        assert_eq!(flip.change_count, 1);

        let hold = tracker.check_regime(MarketRegime::Trending);
        assert!(!hold.changed);
        assert_eq!(hold.change_count, 1);
    }

    #[test]
    fn test_tracker_first_call_and_stability() {
        let mut tracker = RegimeTracker::new();
        let prices = trending_prices();

        let first = tracker.check(&prices);
        assert!(!first.changed);
        assert_eq!(first.from, None);
        assert_eq!(first.change_count, 0);

        let second = tracker.check(&prices);
        assert!(!second.changed);
        assert_eq!(second.from, Some(second.to));
        assert_eq!(second.change_count, 0);
    }

    #[test]
    fn test_tracker_reset() {
        let mut tracker = RegimeTracker::new();
        let prices = trending_prices();
        tracker.check(&prices);
        tracker.check(&prices);
        tracker.reset();

        let after = tracker.check(&prices);
        assert!(!after.changed);
        assert_eq!(after.from, None);
        assert_eq!(after.change_count, 0);
    }

    #[test]
    fn test_agent_gate_always_has_reason() {
        let state = detect_regime(&trending_prices());
        for agent in [AgentKind::Momentum, AgentKind::MeanReversion, AgentKind::Grid] {
            let gate = should_agent_trade(agent, &state);
            assert!(!gate.reason.is_empty());
            if state.recommends(agent) {
                assert!(gate.should_trade);
                assert!(gate.size_multiplier > 0.0);
            }
        }
    }
}
