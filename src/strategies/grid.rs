//! Grid Strategy
//!
//! Maintains a ladder of buy levels below and sell levels above a
//! reference price. The ladder is rebuilt whenever price drifts more than
//! 5% from the reference; filled levels re-arm once price has moved away
//! by more than twice the grid spacing.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::utils::types::{AgentKind, TradeSignal};

use super::{Strategy, StrategyContext};

const MIN_SAMPLES: usize = 5;
/// Relative drift from the reference that forces a rebuild.
const REANCHOR_DRIFT: f64 = 0.05;
/// Filled levels re-arm beyond this many spacings away.
const REARM_SPACINGS: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridSide {
    Buy,
    Sell,
}

/// One price tier of the ladder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridLevel {
    pub price: f64,
    pub side: GridSide,
    pub filled: bool,
}

pub struct GridStrategy {
    levels: Vec<GridLevel>,
    reference_price: Option<f64>,
    prev_price: Option<f64>,
    spacing_pct: f64,
    grid_unit: f64,
    levels_per_side: usize,
}

impl GridStrategy {
    pub fn new(spacing_pct: f64, grid_unit: f64, levels_per_side: usize) -> Self {
        Self {
            levels: Vec::new(),
            reference_price: None,
            prev_price: None,
            spacing_pct: spacing_pct.max(1e-6),
            grid_unit: grid_unit.max(1e-9),
            levels_per_side: levels_per_side.max(1),
        }
    }

    pub fn levels(&self) -> &[GridLevel] {
        &self.levels
    }

    fn rebuild(&mut self, reference: f64) {
        let spacing = reference * self.spacing_pct;
        self.levels.clear();
        for i in 1..=self.levels_per_side {
            self.levels.push(GridLevel {
                price: reference - spacing * i as f64,
                side: GridSide::Buy,
                filled: false,
            });
            self.levels.push(GridLevel {
                price: reference + spacing * i as f64,
                side: GridSide::Sell,
                filled: false,
            });
        }
        self.reference_price = Some(reference);
        debug!(reference, spacing, levels = self.levels.len(), "grid rebuilt");
    }
}

impl Strategy for GridStrategy {
    fn name(&self) -> &'static str {
        "grid"
    }

    fn kind(&self) -> AgentKind {
        AgentKind::Grid
    }

    fn evaluate(&mut self, ctx: &StrategyContext<'_>) -> TradeSignal {
        if ctx.prices.len() < MIN_SAMPLES {
            return TradeSignal::none("Insufficient data for grid strategy");
        }
        let price = ctx.current_price;

        let needs_init = match self.reference_price {
            None => true,
            Some(reference) => ((price - reference) / reference).abs() > REANCHOR_DRIFT,
        };
        if needs_init {
            self.rebuild(price);
            self.prev_price = Some(price);
            return TradeSignal::none("Grid initialized");
        }

        let reference = self.reference_price.unwrap_or(price);
        let spacing = reference * self.spacing_pct;

        // Re-arm filled levels once price has moved far enough away
        for level in &mut self.levels {
            if level.filled && (price - level.price).abs() > REARM_SPACINGS * spacing {
                level.filled = false;
            }
        }

        let prev = self.prev_price.replace(price).unwrap_or(price);
        let position = ctx.position_size;
        let unit = self.grid_unit;

        for level in &mut self.levels {
            if level.filled {
                continue;
            }
            match level.side {
                GridSide::Buy if prev > level.price && price <= level.price => {
                    level.filled = true;
                    return TradeSignal::long(
                        unit,
                        0.6,
                        format!("Grid buy: crossed down through {:.2}", level.price),
                    );
                }
                GridSide::Sell if prev < level.price && price >= level.price => {
                    level.filled = true;
                    if position > unit {
                        return TradeSignal::close(
                            unit,
                            0.6,
                            format!("Grid sell: partial close at {:.2}", level.price),
                        );
                    }
                    if position > 0.0 {
                        return TradeSignal::close(
                            position,
                            0.6,
                            format!("Grid sell: closing residual long at {:.2}", level.price),
                        );
                    }
                    if position == 0.0 {
                        return TradeSignal::short(
                            unit,
                            0.5,
                            format!("Grid sell: opening short at {:.2}", level.price),
                        );
                    }
                    // Already short: level is consumed without adding
                    return TradeSignal::none(format!(
                        "Grid sell level {:.2} crossed while short",
                        level.price
                    ));
                }
                _ => {}
            }
        }

        TradeSignal::none("No grid level crossed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::types::{AccountSnapshot, TradeDirection};

    fn ctx<'a>(price: f64, prices: &'a [f64], account: &AccountSnapshot) -> StrategyContext<'a> {
        StrategyContext::new(price, prices, account)
    }

    fn flat() -> AccountSnapshot {
        AccountSnapshot {
            available_collateral: 1_000.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_first_call_initializes() {
        let prices = [100.0; 10];
        let mut grid = GridStrategy::new(0.01, 0.1, 5);
        let signal = grid.evaluate(&ctx(100.0, &prices, &flat()));
        assert_eq!(signal.direction, TradeDirection::None);
        assert!(signal.reason.contains("Grid initialized"));
        assert_eq!(grid.levels().len(), 10);
    }

    #[test]
    fn test_reinit_on_drift() {
        let prices = [100.0; 10];
        let mut grid = GridStrategy::new(0.01, 0.1, 5);
        grid.evaluate(&ctx(100.0, &prices, &flat()));

        // >5% jump from the stored reference re-anchors the ladder
        let signal = grid.evaluate(&ctx(106.0, &prices, &flat()));
        assert!(signal.reason.contains("Grid initialized"));
        assert_eq!(grid.reference_price, Some(106.0));
    }

    #[test]
    fn test_buy_level_cross_goes_long() {
        let prices = [100.0; 10];
        let mut grid = GridStrategy::new(0.01, 0.1, 5);
        grid.evaluate(&ctx(100.0, &prices, &flat()));

        // First buy level sits at 99.0; cross down through it
        let signal = grid.evaluate(&ctx(98.9, &prices, &flat()));
        assert_eq!(signal.direction, TradeDirection::Long);
        assert!((signal.size - 0.1).abs() < 1e-9);
        assert!(signal.reason.contains("Grid buy"));
    }

    #[test]
    fn test_sell_cross_partial_close_with_large_long() {
        let prices = [100.0; 10];
        let mut grid = GridStrategy::new(0.01, 0.1, 5);
        grid.evaluate(&ctx(100.0, &prices, &flat()));

        let long_account = AccountSnapshot {
            position_size: 0.18, // > 1.5 grid units
            entry_price: 99.0,
            unrealized_pnl: 0.4,
            available_collateral: 1_000.0,
        };
        // First sell level sits at 101.0; cross up through it
        let signal = grid.evaluate(&ctx(101.2, &prices, &long_account));
        assert_eq!(signal.direction, TradeDirection::Close);
        assert!(signal.size <= 0.1 + 1e-9, "partial close is at most one unit");
        assert!(signal.size < long_account.position_size, "never a full close");
    }

    #[test]
    fn test_sell_cross_closes_residual_long() {
        let prices = [100.0; 10];
        let mut grid = GridStrategy::new(0.01, 0.1, 5);
        grid.evaluate(&ctx(100.0, &prices, &flat()));

        let small_long = AccountSnapshot {
            position_size: 0.06,
            entry_price: 99.5,
            unrealized_pnl: 0.1,
            available_collateral: 1_000.0,
        };
        let signal = grid.evaluate(&ctx(101.1, &prices, &small_long));
        assert_eq!(signal.direction, TradeDirection::Close);
        assert!((signal.size - 0.06).abs() < 1e-9);
    }

    #[test]
    fn test_sell_cross_opens_short_when_flat() {
        let prices = [100.0; 10];
        let mut grid = GridStrategy::new(0.01, 0.1, 5);
        grid.evaluate(&ctx(100.0, &prices, &flat()));

        let signal = grid.evaluate(&ctx(101.1, &prices, &flat()));
        assert_eq!(signal.direction, TradeDirection::Short);
        assert!((signal.size - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_filled_level_rearms_after_two_spacings() {
        let prices = [100.0; 10];
        let mut grid = GridStrategy::new(0.01, 0.1, 5);
        grid.evaluate(&ctx(100.0, &prices, &flat()));

        // Fill the 99.0 buy level
        let signal = grid.evaluate(&ctx(98.9, &prices, &flat()));
        assert_eq!(signal.direction, TradeDirection::Long);

        // Recross without leaving the re-arm radius: nothing fires
        grid.evaluate(&ctx(99.5, &prices, &flat()));
        let signal = grid.evaluate(&ctx(98.9, &prices, &flat()));
        assert_eq!(signal.direction, TradeDirection::None);

        // Move beyond two spacings (> 2.0), then recross: fires again
        grid.evaluate(&ctx(101.5, &prices, &flat()));
        grid.evaluate(&ctx(99.4, &prices, &flat()));
        let signal = grid.evaluate(&ctx(98.9, &prices, &flat()));
        assert_eq!(signal.direction, TradeDirection::Long);
    }
}
