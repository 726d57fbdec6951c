//! Shared types and small helpers

pub mod types;

pub use types::{
    AccountSnapshot, AgentKind, Candle, CandleAggregator, MarketRegime, PriceSeries, PriceUpdate,
    TickRecord, TradeDirection, TradeSignal, TrendStrength, VolatilityRegime,
};

use std::time::{SystemTime, UNIX_EPOCH};

pub fn current_timestamp_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
