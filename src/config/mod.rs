//! Configuration module
//!
//! Handles loading and validation of the per-agent configuration. Loaded
//! once before the first tick and never mutated afterwards.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::utils::types::AgentKind;

/// Main agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub trading: TradingConfig,
    pub risk: RiskConfig,
    pub adaptive: AdaptiveConfig,
    pub strategy: StrategyConfig,
    pub telemetry: TelemetryConfig,
    #[serde(default = "default_true")]
    pub paper_trading: bool,
}

impl AgentConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: Self =
            serde_yaml::from_str(&content).with_context(|| "Failed to parse config file")?;

        config.validate()?;
        info!("Configuration loaded from {:?}", path);
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.trading.budget > 0.0, "budget must be positive");
        anyhow::ensure!(
            self.trading.loop_interval_ms >= 100,
            "loop_interval_ms must be at least 100"
        );
        anyhow::ensure!(
            self.trading.max_leverage > 0.0 && self.trading.max_leverage <= 20.0,
            "max_leverage must be between 0 and 20"
        );
        anyhow::ensure!(
            self.risk.stop_loss_pct > 0.0 && self.risk.stop_loss_pct <= 50.0,
            "stop_loss_pct must be between 0 and 50"
        );
        anyhow::ensure!(
            self.risk.take_profit_pct > 0.0,
            "take_profit_pct must be positive"
        );
        anyhow::ensure!(
            self.adaptive.kelly_win_rate > 0.0 && self.adaptive.kelly_win_rate < 1.0,
            "kelly_win_rate must be strictly between 0 and 1"
        );
        anyhow::ensure!(
            self.adaptive.kelly_avg_win_loss_ratio > 0.0,
            "kelly_avg_win_loss_ratio must be positive"
        );
        anyhow::ensure!(
            self.strategy.base_size > 0.0,
            "strategy base_size must be positive"
        );
        anyhow::ensure!(
            self.strategy.grid.spacing_pct > 0.0 && self.strategy.grid.spacing_pct < 0.5,
            "grid spacing_pct must be in (0, 0.5)"
        );
        Ok(())
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            trading: TradingConfig::default(),
            risk: RiskConfig::default(),
            adaptive: AdaptiveConfig::default(),
            strategy: StrategyConfig::default(),
            telemetry: TelemetryConfig::default(),
            paper_trading: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Account budget in USD
    pub budget: f64,
    /// Decision-cycle interval
    #[serde(default = "default_loop_interval")]
    pub loop_interval_ms: u64,
    pub max_leverage: f64,
    /// Rolling price window length
    #[serde(default = "default_price_window")]
    pub price_window: usize,
    /// Candle bucket duration for the OHLC aggregator
    #[serde(default = "default_candle_ms")]
    pub candle_interval_ms: i64,
}

fn default_loop_interval() -> u64 {
    5_000
}
fn default_price_window() -> usize {
    200
}
fn default_candle_ms() -> i64 {
    60_000
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            budget: 1_000.0,
            loop_interval_ms: default_loop_interval(),
            max_leverage: 3.0,
            price_window: default_price_window(),
            candle_interval_ms: default_candle_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Fallback stop-loss when no ATR data is available, percent
    pub stop_loss_pct: f64,
    /// Fallback take-profit, percent
    pub take_profit_pct: f64,
    /// ATR multipliers run wide because close-only ATR underestimates
    /// true range
    #[serde(default = "default_atr_stop_multiplier")]
    pub atr_stop_multiplier: f64,
    #[serde(default = "default_atr_tp_multiplier")]
    pub atr_take_profit_multiplier: f64,
    /// Daily realized loss (fraction of budget) that trips the circuit
    /// breaker
    #[serde(default = "default_daily_loss_limit")]
    pub daily_loss_limit_pct: f64,
}

fn default_atr_stop_multiplier() -> f64 {
    2.0
}
fn default_atr_tp_multiplier() -> f64 {
    3.0
}
fn default_daily_loss_limit() -> f64 {
    15.0
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            stop_loss_pct: 5.0,
            take_profit_pct: 10.0,
            atr_stop_multiplier: default_atr_stop_multiplier(),
            atr_take_profit_multiplier: default_atr_tp_multiplier(),
            daily_loss_limit_pct: default_daily_loss_limit(),
        }
    }
}

/// Adaptive parameterization and Kelly sizing toggles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveConfig {
    /// Enable volatility-adaptive indicator periods
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Gate strategies by the detected regime
    #[serde(default = "default_true")]
    pub regime_filter: bool,
    /// Cap sizes with a Kelly-derived bound
    #[serde(default = "default_true")]
    pub kelly_sizing: bool,
    #[serde(default = "default_kelly_win_rate")]
    pub kelly_win_rate: f64,
    #[serde(default = "default_kelly_ratio")]
    pub kelly_avg_win_loss_ratio: f64,
    /// 0.5 = half-Kelly
    #[serde(default = "default_kelly_multiplier")]
    pub kelly_fraction_multiplier: f64,
}

fn default_kelly_win_rate() -> f64 {
    0.55
}
fn default_kelly_ratio() -> f64 {
    1.5
}
fn default_kelly_multiplier() -> f64 {
    0.5
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            regime_filter: true,
            kelly_sizing: true,
            kelly_win_rate: default_kelly_win_rate(),
            kelly_avg_win_loss_ratio: default_kelly_ratio(),
            kelly_fraction_multiplier: default_kelly_multiplier(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Which strategy this agent runs
    #[serde(default = "default_agent_kind")]
    pub kind: AgentKind,
    /// Base position size in base-asset units
    #[serde(default = "default_base_size")]
    pub base_size: f64,
    #[serde(default)]
    pub grid: GridConfig,
}

fn default_agent_kind() -> AgentKind {
    AgentKind::Momentum
}
fn default_base_size() -> f64 {
    0.5
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            kind: default_agent_kind(),
            base_size: default_base_size(),
            grid: GridConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    /// Level spacing as a fraction of the reference price
    #[serde(default = "default_grid_spacing")]
    pub spacing_pct: f64,
    /// Size of one grid fill in base-asset units
    #[serde(default = "default_grid_unit")]
    pub unit: f64,
    #[serde(default = "default_levels_per_side")]
    pub levels_per_side: usize,
}

fn default_grid_spacing() -> f64 {
    0.01
}
fn default_grid_unit() -> f64 {
    0.1
}
fn default_levels_per_side() -> usize {
    5
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            spacing_pct: default_grid_spacing(),
            unit: default_grid_unit(),
            levels_per_side: default_levels_per_side(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub json_logs: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AgentConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_roundtrip_with_defaults() {
        let yaml = r#"
trading:
  budget: 5000.0
  max_leverage: 5.0
risk:
  stop_loss_pct: 3.0
  take_profit_pct: 8.0
adaptive: {}
strategy:
  kind: grid
telemetry: {}
"#;
        let config: AgentConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.trading.budget, 5000.0);
        assert_eq!(config.trading.loop_interval_ms, 5_000);
        assert_eq!(config.strategy.kind, AgentKind::Grid);
        assert_eq!(config.strategy.grid.levels_per_side, 5);
        assert!(config.paper_trading);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = AgentConfig::default();
        config.trading.budget = 0.0;
        assert!(config.validate().is_err());

        let mut config = AgentConfig::default();
        config.adaptive.kelly_win_rate = 1.0;
        assert!(config.validate().is_err());
    }
}
