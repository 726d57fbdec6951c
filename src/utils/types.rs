//! Common types used throughout the decision engine

use serde::{Deserialize, Serialize};
use std::fmt;

/// Trade direction emitted by strategies and consumed by execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeDirection {
    Long,
    Short,
    Close,
    None,
}

impl fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeDirection::Long => write!(f, "long"),
            TradeDirection::Short => write!(f, "short"),
            TradeDirection::Close => write!(f, "close"),
            TradeDirection::None => write!(f, "none"),
        }
    }
}

/// Primary market regime from long-memory analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketRegime {
    Trending,
    MeanReverting,
    Random,
}

impl fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketRegime::Trending => write!(f, "trending"),
            MarketRegime::MeanReverting => write!(f, "mean_reverting"),
            MarketRegime::Random => write!(f, "random"),
        }
    }
}

/// Volatility bucket from percentile ranking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolatilityRegime {
    Low,
    Medium,
    High,
    Extreme,
}

impl fmt::Display for VolatilityRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolatilityRegime::Low => write!(f, "low"),
            VolatilityRegime::Medium => write!(f, "medium"),
            VolatilityRegime::High => write!(f, "high"),
            VolatilityRegime::Extreme => write!(f, "extreme"),
        }
    }
}

/// ADX-derived trend strength bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendStrength {
    None,
    Weak,
    Moderate,
    Strong,
}

impl fmt::Display for TrendStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendStrength::None => write!(f, "none"),
            TrendStrength::Weak => write!(f, "weak"),
            TrendStrength::Moderate => write!(f, "moderate"),
            TrendStrength::Strong => write!(f, "strong"),
        }
    }
}

/// Strategy agent identifiers, used for regime-based gating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Momentum,
    MeanReversion,
    Grid,
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentKind::Momentum => write!(f, "momentum"),
            AgentKind::MeanReversion => write!(f, "mean_reversion"),
            AgentKind::Grid => write!(f, "grid"),
        }
    }
}

/// A finalized trading decision. Size is in base-asset units and every
/// signal carries a human-readable reason, including "do nothing".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub direction: TradeDirection,
    pub size: f64,
    pub confidence: f64,
    pub reason: String,
}

impl TradeSignal {
    pub fn none(reason: impl Into<String>) -> Self {
        Self {
            direction: TradeDirection::None,
            size: 0.0,
            confidence: 0.0,
            reason: reason.into(),
        }
    }

    pub fn long(size: f64, confidence: f64, reason: impl Into<String>) -> Self {
        Self {
            direction: TradeDirection::Long,
            size,
            confidence,
            reason: reason.into(),
        }
    }

    pub fn short(size: f64, confidence: f64, reason: impl Into<String>) -> Self {
        Self {
            direction: TradeDirection::Short,
            size,
            confidence,
            reason: reason.into(),
        }
    }

    pub fn close(size: f64, confidence: f64, reason: impl Into<String>) -> Self {
        Self {
            direction: TradeDirection::Close,
            size,
            confidence,
            reason: reason.into(),
        }
    }

    pub fn is_actionable(&self) -> bool {
        !matches!(self.direction, TradeDirection::None)
    }
}

/// Rolling price window, oldest first. Appended once per tick; the oldest
/// sample is evicted once the window is full.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    samples: Vec<f64>,
    capacity: usize,
}

impl PriceSeries {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, price: f64) {
        if self.samples.len() == self.capacity {
            self.samples.remove(0);
        }
        self.samples.push(price);
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn last(&self) -> Option<f64> {
        self.samples.last().copied()
    }
}

impl Default for PriceSeries {
    fn default() -> Self {
        Self::new(200)
    }
}

/// OHLC candle built from tick prices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub complete: bool,
}

/// Aggregates tick prices into fixed-duration candle buckets.
/// `complete` is false only for the in-progress bucket.
#[derive(Debug, Clone)]
pub struct CandleAggregator {
    bucket_ms: i64,
    current: Option<Candle>,
}

impl CandleAggregator {
    pub fn new(bucket_ms: i64) -> Self {
        Self {
            bucket_ms: bucket_ms.max(1),
            current: None,
        }
    }

    /// Feed one price sample. Returns the previous candle when the sample
    /// opens a new bucket.
    pub fn push(&mut self, price: f64, timestamp_ms: i64) -> Option<Candle> {
        let bucket_start = timestamp_ms - timestamp_ms.rem_euclid(self.bucket_ms);

        match self.current.as_mut() {
            Some(candle) if candle.open_time == bucket_start => {
                candle.high = candle.high.max(price);
                candle.low = candle.low.min(price);
                candle.close = price;
                None
            }
            _ => {
                let finished = self.current.take().map(|mut c| {
                    c.complete = true;
                    c
                });
                self.current = Some(Candle {
                    open_time: bucket_start,
                    open: price,
                    high: price,
                    low: price,
                    close: price,
                    complete: false,
                });
                finished
            }
        }
    }

    pub fn current(&self) -> Option<&Candle> {
        self.current.as_ref()
    }
}

/// Per-tick account state from the position/account collaborator
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// Signed position size (+long / -short), base-asset units
    pub position_size: f64,
    /// Average entry price of the open position
    pub entry_price: f64,
    /// Unrealized PnL in USD
    pub unrealized_pnl: f64,
    /// Collateral available for new positions, USD
    pub available_collateral: f64,
}

/// Price sample from the feed collaborator
#[derive(Debug, Clone, Copy)]
pub struct PriceUpdate {
    pub price: f64,
    pub confidence: Option<f64>,
    pub timestamp: i64,
}

/// Structured per-tick record handed to the audit/telemetry collaborator
#[derive(Debug, Clone, Serialize)]
pub struct TickRecord {
    pub timestamp: i64,
    pub price: f64,
    pub regime: MarketRegime,
    pub volatility: VolatilityRegime,
    pub hurst: f64,
    pub adx: f64,
    pub raw_signal: TradeSignal,
    pub final_signal: TradeSignal,
    pub risk_note: Option<String>,
    pub executed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_series_eviction() {
        let mut series = PriceSeries::new(3);
        for p in [1.0, 2.0, 3.0, 4.0] {
            series.push(p);
        }
        assert_eq!(series.as_slice(), &[2.0, 3.0, 4.0]);
        assert_eq!(series.last(), Some(4.0));
    }

    #[test]
    fn test_candle_invariant() {
        let mut agg = CandleAggregator::new(60_000);
        assert!(agg.push(100.0, 0).is_none());
        assert!(agg.push(103.0, 10_000).is_none());
        assert!(agg.push(99.0, 20_000).is_none());

        let current = agg.current().unwrap();
        assert!(!current.complete);
        assert!(current.low <= current.open.min(current.close));
        assert!(current.high >= current.open.max(current.close));
        assert_eq!(current.open, 100.0);
        assert_eq!(current.high, 103.0);
        assert_eq!(current.low, 99.0);
        assert_eq!(current.close, 99.0);

        // Next bucket closes the previous candle
        let finished = agg.push(101.0, 61_000).unwrap();
        assert!(finished.complete);
        assert_eq!(finished.close, 99.0);
        assert!(!agg.current().unwrap().complete);
    }

    #[test]
    fn test_signal_constructors() {
        let signal = TradeSignal::none("waiting");
        assert!(!signal.is_actionable());
        assert_eq!(signal.size, 0.0);

        let signal = TradeSignal::long(0.5, 0.8, "breakout");
        assert!(signal.is_actionable());
        assert_eq!(signal.direction, TradeDirection::Long);
    }
}
