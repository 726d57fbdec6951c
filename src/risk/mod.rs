//! Risk Manager
//!
//! Validates and resizes proposed trade signals against the account and
//! configuration:
//! - Stop-loss / take-profit overrides (percent or ATR-scaled)
//! - Leverage-based notional clamping
//! - Collateral gate
//!
//! Check order matters: stop-loss/take-profit first, then the leverage
//! clamp, then the collateral gate.

use tracing::{debug, warn};

use crate::config::AgentConfig;
use crate::strategies::StrategyContext;
use crate::utils::types::{TradeDirection, TradeSignal};

pub struct RiskManager {
    budget: f64,
    max_leverage: f64,
    stop_loss_pct: f64,
    take_profit_pct: f64,
    atr_stop_multiplier: f64,
    atr_take_profit_multiplier: f64,
}

impl RiskManager {
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            budget: config.trading.budget,
            max_leverage: config.trading.max_leverage,
            stop_loss_pct: config.risk.stop_loss_pct,
            take_profit_pct: config.risk.take_profit_pct,
            atr_stop_multiplier: config.risk.atr_stop_multiplier,
            atr_take_profit_multiplier: config.risk.atr_take_profit_multiplier,
        }
    }

    /// Apply all risk checks to a proposed signal, returning the possibly
    /// rewritten signal.
    pub fn apply(&self, signal: TradeSignal, ctx: &StrategyContext<'_>) -> TradeSignal {
        // `none` and `close` pass through untouched: the emitting strategy
        // already decided to stand down or unwind.
        if matches!(signal.direction, TradeDirection::None | TradeDirection::Close) {
            return signal;
        }

        // 1. Stop-loss / take-profit on the open position
        if ctx.position_size != 0.0 && ctx.entry_price > 0.0 {
            let notional = ctx.position_size.abs() * ctx.entry_price;
            let pnl_frac = ctx.unrealized_pnl / notional;

            let atr = ctx.atr();
            let (stop_frac, take_frac) = if atr > 0.0 {
                (
                    atr * self.atr_stop_multiplier / ctx.entry_price,
                    atr * self.atr_take_profit_multiplier / ctx.entry_price,
                )
            } else {
                (self.stop_loss_pct / 100.0, self.take_profit_pct / 100.0)
            };

            if pnl_frac <= -stop_frac {
                warn!(pnl_frac, stop_frac, "stop-loss override");
                return TradeSignal::close(
                    ctx.position_size.abs(),
                    1.0,
                    format!("Stop-loss: position at {:.2}% of notional", pnl_frac * 100.0),
                );
            }
            if pnl_frac >= take_frac {
                debug!(pnl_frac, take_frac, "take-profit override");
                return TradeSignal::close(
                    ctx.position_size.abs(),
                    1.0,
                    format!("Take-profit: position at {:.2}% of notional", pnl_frac * 100.0),
                );
            }
        }

        // 2. Leverage clamp: shrink to headroom instead of rejecting
        let mut size = signal.size;
        if ctx.current_price > 0.0 {
            let existing_notional = ctx.position_size.abs() * ctx.entry_price;
            let max_notional = self.budget * self.max_leverage;
            let headroom = (max_notional - existing_notional).max(0.0);
            let proposed_notional = size * ctx.current_price;
            if proposed_notional > headroom {
                size = headroom / ctx.current_price;
                debug!(
                    proposed = proposed_notional,
                    headroom, "leverage clamp applied"
                );
            }
        }

        // 3. Collateral gate
        if ctx.available_collateral <= 0.0 {
            return TradeSignal::none("No collateral available for new positions");
        }

        TradeSignal {
            direction: signal.direction,
            size,
            confidence: signal.confidence,
            reason: signal.reason,
        }
    }
}
