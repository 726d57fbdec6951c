//! Telemetry Module
//!
//! Logging initialization plus the per-tick audit trail. Every decision
//! cycle emits a `TickRecord` regardless of whether a trade fired, so a
//! run can be reconstructed after the fact.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use tracing::{info, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::TelemetryConfig;
use crate::utils::types::TickRecord;

pub fn init_logging(config: &TelemetryConfig) -> Result<()> {
    let log_level = parse_log_level(&config.log_level);

    let env_filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    if config.json_logs {
        let fmt_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();
    } else {
        let fmt_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact();

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();
    }

    Ok(())
}

fn parse_log_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Destination for per-tick audit records.
pub trait AuditSink: Send {
    fn record(&mut self, tick: &TickRecord);
}

/// Emits each tick as a structured log line.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&mut self, tick: &TickRecord) {
        info!(
            timestamp = tick.timestamp,
            price = tick.price,
            regime = %tick.regime,
            volatility = %tick.volatility,
            hurst = tick.hurst,
            adx = tick.adx,
            raw_direction = %tick.raw_signal.direction,
            final_direction = %tick.final_signal.direction,
            risk = tick.risk_note.as_deref().unwrap_or(""),
            executed = tick.executed,
            "tick"
        );
    }
}

/// In-memory sink for tests and replay analysis. Clones share the same
/// record buffer, so a caller can keep one handle while the agent owns
/// the other.
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditSink {
    records: Arc<Mutex<Vec<TickRecord>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<TickRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&mut self, tick: &TickRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(tick.clone());
        }
    }
}
