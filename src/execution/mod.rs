//! Order execution
//!
//! `ExecutionClient` is the seam between the decision cycle and whatever
//! actually moves money. The paper implementation keeps a simple book
//! (position, weighted entry, realized PnL) and doubles as the
//! `AccountProvider` for paper runs.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::feeds::{AccountProvider, FeedError};
use crate::utils::types::{AccountSnapshot, TradeDirection, TradeSignal};

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("order rejected: {0}")]
    Rejected(String),
    #[error("execution transport failure: {0}")]
    Transport(String),
}

/// Fill report returned by an executor.
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    pub filled_size: f64,
    pub fill_price: f64,
    /// Non-zero only when the fill reduced or closed a position.
    pub realized_pnl: f64,
}

#[async_trait]
pub trait ExecutionClient: Send {
    async fn execute(
        &mut self,
        signal: &TradeSignal,
        price: f64,
    ) -> Result<ExecutionReport, ExecutionError>;
}

#[derive(Debug, Default)]
struct PaperBook {
    /// Signed position in base-asset units, long positive.
    position: f64,
    entry_price: f64,
    realized_pnl: f64,
    collateral: f64,
}

impl PaperBook {
    fn unrealized(&self, mark_price: f64) -> f64 {
        if self.position == 0.0 {
            return 0.0;
        }
        (mark_price - self.entry_price) * self.position
    }

    /// Reduce the position by `size` units at `price`, realizing PnL on
    /// the closed portion.
    fn close(&mut self, size: f64, price: f64) -> f64 {
        let closed = size.min(self.position.abs());
        if closed <= 0.0 {
            return 0.0;
        }
        let sign = self.position.signum();
        let pnl = (price - self.entry_price) * closed * sign;
        self.realized_pnl += pnl;
        self.collateral += pnl;
        self.position -= closed * sign;
        if self.position == 0.0 {
            self.entry_price = 0.0;
        }
        pnl
    }

    /// Add `size` signed units at `price`, netting against an opposite
    /// position first.
    fn open(&mut self, size: f64, price: f64) -> f64 {
        let mut realized = 0.0;
        let mut remaining = size;
        if self.position != 0.0 && self.position.signum() != size.signum() {
            let offset = remaining.abs().min(self.position.abs());
            realized = self.close(offset, price);
            remaining = size - offset * size.signum();
        }
        if remaining != 0.0 {
            let new_position = self.position + remaining;
            // Weighted-average entry across adds
            self.entry_price = if self.position == 0.0 {
                price
            } else {
                (self.entry_price * self.position.abs() + price * remaining.abs())
                    / new_position.abs()
            };
            self.position = new_position;
        }
        realized
    }
}

/// Simulated executor for paper trading. Fills everything at the mark
/// price with no slippage.
#[derive(Clone)]
pub struct PaperExecutor {
    book: Arc<Mutex<PaperBook>>,
}

impl PaperExecutor {
    pub fn new(starting_collateral: f64) -> Self {
        Self {
            book: Arc::new(Mutex::new(PaperBook {
                collateral: starting_collateral,
                ..Default::default()
            })),
        }
    }

    pub fn position(&self) -> f64 {
        self.book.lock().map(|b| b.position).unwrap_or(0.0)
    }

    pub fn realized_pnl(&self) -> f64 {
        self.book.lock().map(|b| b.realized_pnl).unwrap_or(0.0)
    }
}

#[async_trait]
impl ExecutionClient for PaperExecutor {
    async fn execute(
        &mut self,
        signal: &TradeSignal,
        price: f64,
    ) -> Result<ExecutionReport, ExecutionError> {
        if !signal.size.is_finite() || signal.size < 0.0 {
            return Err(ExecutionError::Rejected(format!(
                "invalid size {}",
                signal.size
            )));
        }
        let mut book = self
            .book
            .lock()
            .map_err(|_| ExecutionError::Transport("paper book poisoned".to_string()))?;

        let realized = match signal.direction {
            TradeDirection::None => return Ok(ExecutionReport::default()),
            TradeDirection::Long => book.open(signal.size, price),
            TradeDirection::Short => book.open(-signal.size, price),
            TradeDirection::Close => book.close(signal.size, price),
        };

        info!(
            direction = %signal.direction,
            size = signal.size,
            price,
            realized,
            position = book.position,
            "paper fill"
        );
        Ok(ExecutionReport {
            filled_size: signal.size,
            fill_price: price,
            realized_pnl: realized,
        })
    }
}

#[async_trait]
impl AccountProvider for PaperExecutor {
    async fn snapshot(&self, mark_price: f64) -> Result<AccountSnapshot, FeedError> {
        let book = self
            .book
            .lock()
            .map_err(|_| FeedError::Disconnected("paper book poisoned".to_string()))?;
        Ok(AccountSnapshot {
            position_size: book.position,
            entry_price: book.entry_price,
            unrealized_pnl: book.unrealized(mark_price),
            available_collateral: book.collateral,
        })
    }
}
