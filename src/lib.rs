//! Adaptive Perp Trading Engine Library
//!
//! Decision engine for leveraged perpetual-futures agents: indicator
//! analytics, regime classification, regime-gated strategies, risk
//! management, and the tick-driven agent loop that ties them together.

pub mod agent;
pub mod config;
pub mod execution;
pub mod feeds;
pub mod indicators;
pub mod regime;
pub mod risk;
pub mod strategies;
pub mod telemetry;
pub mod utils;

// Re-export main types
pub use agent::{build_strategy, TradingAgent};
pub use config::AgentConfig;
pub use execution::{ExecutionClient, ExecutionReport, PaperExecutor};
pub use feeds::{AccountProvider, PriceFeed, ReplayFeed, SyntheticFeed};
pub use regime::{detect_regime, detect_regime_from, should_agent_trade, RegimeState, RegimeTracker};
pub use risk::RiskManager;
pub use strategies::{Strategy, StrategyContext};
pub use telemetry::{init_logging, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use utils::types::{TradeDirection, TradeSignal};
