//! Trading agent
//!
//! Owns the decision cycle: pull a price, refresh indicators and regime,
//! let the strategy propose a signal, gate it by regime, cap it with a
//! Kelly bound, pass it through risk, then execute. Every cycle emits an
//! audit record whether or not a trade fired.
//!
//! All state is per-instance so multiple agents can run side by side
//! without interference.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{NaiveDate, TimeZone, Utc};
use tracing::{debug, error, info, warn};

use crate::config::AgentConfig;
use crate::execution::ExecutionClient;
use crate::feeds::{AccountProvider, FeedError, PriceFeed};
use crate::indicators::{self, calculate_indicators};
use crate::regime::{detect_regime_from, should_agent_trade, RegimeTracker};
use crate::risk::RiskManager;
use crate::strategies::{
    GridStrategy, MeanReversionStrategy, MomentumStrategy, Strategy, StrategyContext,
};
use crate::telemetry::AuditSink;
use crate::utils::types::{
    AgentKind, CandleAggregator, PriceSeries, TickRecord, TradeDirection, TradeSignal,
};

/// Cooldown between fills, as a multiple of the loop interval.
const COOLDOWN_INTERVALS: u64 = 2;
/// Suspension length after the daily loss limit trips.
const CIRCUIT_BREAKER_INTERVALS: u64 = 10;
/// Backoff ceiling for repeated tick failures.
const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Realized PnL accumulator that resets at the UTC day boundary. Tracks
/// the intraday peak alongside the running total.
#[derive(Debug, Default)]
struct DailyTracker {
    date: Option<NaiveDate>,
    realized_pnl: f64,
    peak_pnl: f64,
}

impl DailyTracker {
    fn roll(&mut self, timestamp_ms: i64) {
        let date = Utc
            .timestamp_millis_opt(timestamp_ms)
            .single()
            .map(|dt| dt.date_naive());
        if date != self.date {
            if self.date.is_some() {
                info!(
                    pnl = self.realized_pnl,
                    peak = self.peak_pnl,
                    "daily PnL rollover"
                );
            }
            self.date = date;
            self.realized_pnl = 0.0;
            self.peak_pnl = 0.0;
        }
    }

    fn record(&mut self, pnl: f64) {
        self.realized_pnl += pnl;
        self.peak_pnl = self.peak_pnl.max(self.realized_pnl);
    }
}

/// Build the strategy instance named by the configuration.
pub fn build_strategy(config: &AgentConfig) -> Box<dyn Strategy + Send> {
    match config.strategy.kind {
        AgentKind::Momentum => Box::new(MomentumStrategy::new(
            config.strategy.base_size,
            config.adaptive.enabled,
        )),
        AgentKind::MeanReversion => {
            Box::new(MeanReversionStrategy::new(config.strategy.base_size))
        }
        AgentKind::Grid => Box::new(GridStrategy::new(
            config.strategy.grid.spacing_pct,
            config.strategy.grid.unit,
            config.strategy.grid.levels_per_side,
        )),
    }
}

/// One strategy plus its collaborators, driven tick by tick.
pub struct TradingAgent {
    config: AgentConfig,
    prices: PriceSeries,
    candles: CandleAggregator,
    strategy: Box<dyn Strategy + Send>,
    risk: RiskManager,
    regime_tracker: RegimeTracker,
    daily: DailyTracker,
    feed: Box<dyn PriceFeed>,
    account: Box<dyn AccountProvider>,
    executor: Box<dyn ExecutionClient>,
    audit: Box<dyn AuditSink>,
    running: Arc<AtomicBool>,
    last_execution_ms: Option<i64>,
    suspended_until_ms: Option<i64>,
    consecutive_failures: u32,
}

impl TradingAgent {
    pub fn new(
        config: AgentConfig,
        feed: Box<dyn PriceFeed>,
        account: Box<dyn AccountProvider>,
        executor: Box<dyn ExecutionClient>,
        audit: Box<dyn AuditSink>,
    ) -> Self {
        let strategy = build_strategy(&config);
        let risk = RiskManager::new(&config);
        let prices = PriceSeries::new(config.trading.price_window);
        let candles = CandleAggregator::new(config.trading.candle_interval_ms);
        Self {
            config,
            prices,
            candles,
            strategy,
            risk,
            regime_tracker: RegimeTracker::new(),
            daily: DailyTracker::default(),
            feed,
            account,
            executor,
            audit,
            running: Arc::new(AtomicBool::new(true)),
            last_execution_ms: None,
            suspended_until_ms: None,
            consecutive_failures: 0,
        }
    }

    /// Handle for cooperative shutdown from a signal handler.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    fn cooldown_ms(&self) -> i64 {
        (self.config.trading.loop_interval_ms * COOLDOWN_INTERVALS) as i64
    }

    fn in_cooldown(&self, now_ms: i64) -> bool {
        self.last_execution_ms
            .is_some_and(|last| now_ms - last < self.cooldown_ms())
    }

    fn suspended(&self, now_ms: i64) -> bool {
        self.suspended_until_ms.is_some_and(|until| now_ms < until)
    }

    /// Run one full decision cycle and return its audit record.
    pub async fn tick(&mut self) -> Result<TickRecord> {
        let update = self
            .feed
            .next_price()
            .await
            .context("price feed failure")?;
        let price = update.price;
        let now_ms = update.timestamp;

        self.prices.push(price);
        if let Some(candle) = self.candles.push(price, now_ms) {
            debug!(
                open = candle.open,
                close = candle.close,
                "candle completed"
            );
        }
        self.daily.roll(now_ms);

        let account = self
            .account
            .snapshot(price)
            .await
            .context("account snapshot failure")?;

        let prices = self.prices.as_slice().to_vec();
        // One R/S pass per tick: regime detection and the change tracker
        // both reuse the snapshot's Hurst read.
        let snapshot = calculate_indicators(&prices);
        let regime = detect_regime_from(&snapshot);

        let change = self.regime_tracker.check_regime(regime.primary);
        if change.changed {
            info!(
                from = change.from.map(|r| r.to_string()).unwrap_or_default(),
                to = %change.to,
                count = change.change_count,
                "regime change"
            );
        }

        let ctx = StrategyContext::new(price, &prices, &account).with_snapshot(&snapshot);
        let raw = self.strategy.evaluate(&ctx);

        // Regime gate on fresh exposure; closes always pass
        let mut gated = raw.clone();
        if self.config.adaptive.regime_filter
            && matches!(gated.direction, TradeDirection::Long | TradeDirection::Short)
        {
            let gate = should_agent_trade(self.strategy.kind(), &regime);
            if !gate.should_trade {
                gated = TradeSignal::none(gate.reason);
            } else {
                gated.size *= gate.size_multiplier;
            }
        }

        // Kelly size cap on fresh exposure
        if self.config.adaptive.kelly_sizing
            && matches!(gated.direction, TradeDirection::Long | TradeDirection::Short)
        {
            let avg_vol = indicators::realized_volatility(&prices, 50);
            let cap = indicators::kelly_position_size(
                self.config.trading.budget,
                price,
                self.config.adaptive.kelly_win_rate,
                self.config.adaptive.kelly_avg_win_loss_ratio,
                snapshot.realized_vol,
                avg_vol,
            ) * self.config.adaptive.kelly_fraction_multiplier;
            if cap > 0.0 && gated.size > cap {
                debug!(size = gated.size, cap, "kelly cap applied");
                gated.size = cap;
            }
        }

        let final_signal = self.risk.apply(gated.clone(), &ctx);
        let risk_note = (final_signal != gated).then(|| final_signal.reason.clone());
        // The context's memo cells are not Send; release it before awaiting
        // the executor.
        drop(ctx);

        // Circuit breaker on daily realized loss
        let loss_limit = self.config.trading.budget * self.config.risk.daily_loss_limit_pct / 100.0;
        if !self.suspended(now_ms) && self.daily.realized_pnl <= -loss_limit {
            let until = now_ms
                + (self.config.trading.loop_interval_ms * CIRCUIT_BREAKER_INTERVALS) as i64;
            warn!(
                daily_pnl = self.daily.realized_pnl,
                loss_limit, until, "daily loss limit hit: trading suspended"
            );
            self.suspended_until_ms = Some(until);
        }

        let mut executed = false;
        if final_signal.is_actionable() {
            if self.suspended(now_ms) {
                debug!("suspended: skipping execution");
            } else if self.in_cooldown(now_ms) {
                debug!("cooldown active: skipping execution");
            } else {
                let report = self
                    .executor
                    .execute(&final_signal, price)
                    .await
                    .context("execution failure")?;
                executed = true;
                self.last_execution_ms = Some(now_ms);
                if report.realized_pnl != 0.0 {
                    self.daily.record(report.realized_pnl);
                }
            }
        }

        let record = TickRecord {
            timestamp: now_ms,
            price,
            regime: regime.primary,
            volatility: regime.volatility,
            hurst: snapshot.hurst,
            adx: snapshot.adx14,
            raw_signal: raw,
            final_signal,
            risk_note,
            executed,
        };
        self.audit.record(&record);
        Ok(record)
    }

    /// Main loop: tick at the configured interval until the feed runs dry
    /// or the run flag clears, backing off exponentially on failures.
    pub async fn run(&mut self) -> Result<()> {
        let interval = Duration::from_millis(self.config.trading.loop_interval_ms);
        info!(
            strategy = self.strategy.name(),
            interval_ms = self.config.trading.loop_interval_ms,
            "agent loop starting"
        );

        while self.running.load(Ordering::SeqCst) {
            match self.tick().await {
                Ok(_) => {
                    self.consecutive_failures = 0;
                    tokio::time::sleep(interval).await;
                }
                Err(err) => {
                    if let Some(FeedError::Exhausted(served)) = err.downcast_ref::<FeedError>() {
                        info!(ticks = served, "feed exhausted: stopping");
                        break;
                    }
                    self.consecutive_failures += 1;
                    let backoff = interval
                        .saturating_mul(1u32 << (self.consecutive_failures - 1).min(16))
                        .min(MAX_BACKOFF);
                    error!(
                        failures = self.consecutive_failures,
                        backoff_ms = backoff.as_millis() as u64,
                        "tick failed: {err:#}"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        info!("agent loop stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::PaperExecutor;
    use crate::feeds::ReplayFeed;
    use crate::telemetry::TracingAuditSink;

    fn agent_with_prices(mut config: AgentConfig, prices: &[f64]) -> TradingAgent {
        config.trading.loop_interval_ms = 1_000;
        let executor = PaperExecutor::new(config.trading.budget);
        TradingAgent::new(
            config,
            Box::new(ReplayFeed::from_prices(prices)),
            Box::new(executor.clone()),
            Box::new(executor),
            Box::new(TracingAuditSink),
        )
    }

    #[tokio::test]
    async fn test_tick_emits_record_for_every_cycle() {
        let prices: Vec<f64> = (0..10).map(|i| 100.0 + i as f64 * 0.1).collect();
        let mut agent = agent_with_prices(AgentConfig::default(), &prices);
        for (i, &price) in prices.iter().enumerate() {
            let record = agent.tick().await.unwrap();
            assert_eq!(record.price, price, "tick {i}");
        }
        // Exhausted feed surfaces as an error
        assert!(agent.tick().await.is_err());
    }

    #[tokio::test]
    async fn test_short_history_never_executes() {
        let prices = [100.0, 100.5, 99.8];
        let mut agent = agent_with_prices(AgentConfig::default(), &prices);
        for _ in 0..3 {
            let record = agent.tick().await.unwrap();
            assert!(!record.executed);
            assert_eq!(record.raw_signal.direction, TradeDirection::None);
        }
    }

    #[test]
    fn test_daily_tracker_rolls_over_at_utc_midnight() {
        let mut daily = DailyTracker::default();
        let day1 = Utc
            .with_ymd_and_hms(2026, 3, 1, 23, 0, 0)
            .unwrap()
            .timestamp_millis();
        daily.roll(day1);
        daily.record(5.0);
        daily.record(-42.0);
        assert_eq!(daily.realized_pnl, -37.0);
        assert_eq!(daily.peak_pnl, 5.0);

        // Same day: accumulates, peak holds
        daily.roll(day1 + 30 * 60 * 1_000);
        daily.record(-8.0);
        assert_eq!(daily.realized_pnl, -45.0);
        assert_eq!(daily.peak_pnl, 5.0);

        // Next UTC day: both reset
        daily.roll(day1 + 2 * 60 * 60 * 1_000);
        assert_eq!(daily.realized_pnl, 0.0);
        assert_eq!(daily.peak_pnl, 0.0);
    }

    #[test]
    fn test_build_strategy_matches_config() {
        let mut config = AgentConfig::default();
        config.strategy.kind = AgentKind::Grid;
        assert_eq!(build_strategy(&config).kind(), AgentKind::Grid);
        config.strategy.kind = AgentKind::MeanReversion;
        assert_eq!(build_strategy(&config).kind(), AgentKind::MeanReversion);
    }
}
