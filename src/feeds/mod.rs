//! Market data and account feeds
//!
//! Abstracts where prices and account snapshots come from so the agent
//! loop can run against live data, a replay file, or a synthetic walk
//! without changes.

use std::collections::VecDeque;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::utils::types::{AccountSnapshot, PriceUpdate};
use crate::utils::current_timestamp_millis;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed disconnected: {0}")]
    Disconnected(String),
    #[error("feed exhausted after {0} updates")]
    Exhausted(usize),
}

/// Source of mark-price updates, one per decision cycle.
#[async_trait]
pub trait PriceFeed: Send {
    async fn next_price(&mut self) -> Result<PriceUpdate, FeedError>;
}

/// Source of account state. Takes the current mark price so paper
/// implementations can value open positions without a stale quote.
#[async_trait]
pub trait AccountProvider: Send {
    async fn snapshot(&self, mark_price: f64) -> Result<AccountSnapshot, FeedError>;
}

/// Replays a recorded price sequence, then reports exhaustion.
pub struct ReplayFeed {
    updates: VecDeque<PriceUpdate>,
    served: usize,
}

impl ReplayFeed {
    pub fn new(updates: impl IntoIterator<Item = PriceUpdate>) -> Self {
        Self {
            updates: updates.into_iter().collect(),
            served: 0,
        }
    }

    /// Convenience constructor from bare prices, with synthetic timestamps
    /// one second apart.
    pub fn from_prices(prices: &[f64]) -> Self {
        let base = current_timestamp_millis();
        Self::new(prices.iter().enumerate().map(|(i, &price)| PriceUpdate {
            price,
            confidence: None,
            timestamp: base + i as i64 * 1_000,
        }))
    }
}

#[async_trait]
impl PriceFeed for ReplayFeed {
    async fn next_price(&mut self) -> Result<PriceUpdate, FeedError> {
        match self.updates.pop_front() {
            Some(update) => {
                self.served += 1;
                Ok(update)
            }
            None => Err(FeedError::Exhausted(self.served)),
        }
    }
}

/// Bounded random walk for demos and soak runs. Deterministic for a given
/// seed.
pub struct SyntheticFeed {
    price: f64,
    step_pct: f64,
    state: u64,
}

impl SyntheticFeed {
    pub fn new(start_price: f64, step_pct: f64, seed: u64) -> Self {
        Self {
            price: start_price,
            step_pct,
            state: seed.max(1),
        }
    }

    fn next_unit(&mut self) -> f64 {
        // xorshift64
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        (self.state % 10_000) as f64 / 10_000.0
    }
}

#[async_trait]
impl PriceFeed for SyntheticFeed {
    async fn next_price(&mut self) -> Result<PriceUpdate, FeedError> {
        let step = (self.next_unit() - 0.5) * 2.0 * self.step_pct;
        self.price *= 1.0 + step;
        debug!(price = self.price, "synthetic tick");
        Ok(PriceUpdate {
            price: self.price,
            confidence: Some(self.price * 0.0005),
            timestamp: current_timestamp_millis(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replay_feed_in_order_then_exhausted() {
        let mut feed = ReplayFeed::from_prices(&[100.0, 101.0, 102.0]);
        assert_eq!(feed.next_price().await.unwrap().price, 100.0);
        assert_eq!(feed.next_price().await.unwrap().price, 101.0);
        assert_eq!(feed.next_price().await.unwrap().price, 102.0);
        match feed.next_price().await {
            Err(FeedError::Exhausted(3)) => {}
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_synthetic_feed_is_deterministic_and_bounded() {
        let mut a = SyntheticFeed::new(100.0, 0.01, 42);
        let mut b = SyntheticFeed::new(100.0, 0.01, 42);
        for _ in 0..50 {
            let pa = a.next_price().await.unwrap().price;
            let pb = b.next_price().await.unwrap().price;
            assert_eq!(pa, pb);
            assert!(pa > 0.0);
        }
    }
}
