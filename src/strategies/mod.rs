//! Strategy State Machines
//!
//! Three strategy variants behind one contract: momentum (SMA crossover),
//! mean-reversion (Bollinger + RSI), and grid. Each variant owns its
//! cross-call state as plain instance fields; nothing is ambient or
//! shared between agents.

pub mod grid;
pub mod mean_reversion;
pub mod momentum;

pub use grid::GridStrategy;
pub use mean_reversion::MeanReversionStrategy;
pub use momentum::MomentumStrategy;

use std::cell::OnceCell;

use crate::indicators::{self, IndicatorSnapshot};
use crate::utils::types::{AccountSnapshot, AgentKind, MarketRegime, TradeSignal};

/// Common strategy contract: one evaluation per tick.
pub trait Strategy {
    fn name(&self) -> &'static str;
    fn kind(&self) -> AgentKind;
    fn evaluate(&mut self, ctx: &StrategyContext<'_>) -> TradeSignal;
}

/// Read-only per-tick bundle passed into every strategy and the risk
/// manager. Indicator values may be precomputed upstream; accessors
/// memoize an on-demand computation otherwise, so each value is derived
/// at most once per tick.
pub struct StrategyContext<'a> {
    pub current_price: f64,
    pub prices: &'a [f64],
    pub position_size: f64,
    pub entry_price: f64,
    pub unrealized_pnl: f64,
    pub available_collateral: f64,
    /// Optional external funding-rate signal (per-interval rate)
    pub funding_rate: Option<f64>,
    atr: OnceCell<f64>,
    hurst: OnceCell<f64>,
    rsi: OnceCell<f64>,
    adx: OnceCell<f64>,
    regime: OnceCell<MarketRegime>,
}

impl<'a> StrategyContext<'a> {
    pub fn new(current_price: f64, prices: &'a [f64], account: &AccountSnapshot) -> Self {
        Self {
            current_price,
            prices,
            position_size: account.position_size,
            entry_price: account.entry_price,
            unrealized_pnl: account.unrealized_pnl,
            available_collateral: account.available_collateral,
            funding_rate: None,
            atr: OnceCell::new(),
            hurst: OnceCell::new(),
            rsi: OnceCell::new(),
            adx: OnceCell::new(),
            regime: OnceCell::new(),
        }
    }

    /// Seed the memoized accessors from a precomputed snapshot.
    pub fn with_snapshot(self, snapshot: &IndicatorSnapshot) -> Self {
        let _ = self.atr.set(snapshot.atr14);
        let _ = self.hurst.set(snapshot.hurst);
        let _ = self.rsi.set(snapshot.rsi14);
        let _ = self.adx.set(snapshot.adx14);
        let _ = self.regime.set(snapshot.regime);
        self
    }

    pub fn with_funding_rate(mut self, rate: f64) -> Self {
        self.funding_rate = Some(rate);
        self
    }

    pub fn atr(&self) -> f64 {
        *self.atr.get_or_init(|| indicators::atr(self.prices, 14))
    }

    pub fn hurst(&self) -> f64 {
        *self.hurst.get_or_init(|| indicators::hurst_exponent(self.prices))
    }

    pub fn rsi(&self) -> f64 {
        *self.rsi.get_or_init(|| indicators::rsi(self.prices, 14))
    }

    pub fn adx(&self) -> f64 {
        *self.adx.get_or_init(|| indicators::adx(self.prices, 14))
    }

    pub fn regime(&self) -> MarketRegime {
        *self
            .regime
            .get_or_init(|| indicators::classify_regime(self.hurst()))
    }

    pub fn has_position(&self) -> bool {
        self.position_size != 0.0
    }

    pub fn is_long(&self) -> bool {
        self.position_size > 0.0
    }

    pub fn is_short(&self) -> bool {
        self.position_size < 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_memoizes_precomputed_values() {
        let prices: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let account = AccountSnapshot::default();
        let snapshot = indicators::calculate_indicators(&prices);

        let ctx = StrategyContext::new(160.0, &prices, &account).with_snapshot(&snapshot);
        assert_eq!(ctx.atr(), snapshot.atr14);
        assert_eq!(ctx.hurst(), snapshot.hurst);
        assert_eq!(ctx.regime(), snapshot.regime);
    }

    #[test]
    fn test_context_computes_on_demand() {
        let prices: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let account = AccountSnapshot::default();
        let ctx = StrategyContext::new(160.0, &prices, &account);

        assert_eq!(ctx.atr(), indicators::atr(&prices, 14));
        assert_eq!(ctx.rsi(), indicators::rsi(&prices, 14));
    }
}
