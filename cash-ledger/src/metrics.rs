//! Metrics collection for observability
//!
//! Each ledger owns a private [`Registry`], so several ledgers can live in
//! one process (tests, embedded nodes) without name collisions.
//!
//! # Metrics
//!
//! - `cash_ledger_transactions_total{instruction}` - Committed transactions
//! - `cash_ledger_rejected_total{kind}` - Rejected transactions by error kind
//! - `cash_ledger_lock_conflicts_total` - Transactions failed with `AccountInUse`
//! - `cash_ledger_escrow_sweeps_total` - Escrows released by the sweeper
//! - `cash_ledger_commit_duration_seconds` - Submit latency histogram

use crate::error::ErrorKind;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Committed transactions by instruction
    pub transactions_total: IntCounterVec,

    /// Rejected transactions by error kind
    pub rejected_total: IntCounterVec,

    /// Lock conflicts
    pub lock_conflicts_total: IntCounter,

    /// Escrows released by the sweeper
    pub escrow_sweeps_total: IntCounter,

    /// Submit duration histogram
    pub commit_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let transactions_total = IntCounterVec::new(
            Opts::new("cash_ledger_transactions_total", "Committed transactions"),
            &["instruction"],
        )?;
        registry.register(Box::new(transactions_total.clone()))?;

        let rejected_total = IntCounterVec::new(
            Opts::new("cash_ledger_rejected_total", "Rejected transactions"),
            &["kind"],
        )?;
        registry.register(Box::new(rejected_total.clone()))?;

        let lock_conflicts_total = IntCounter::new(
            "cash_ledger_lock_conflicts_total",
            "Transactions rejected because an account was in use",
        )?;
        registry.register(Box::new(lock_conflicts_total.clone()))?;

        let escrow_sweeps_total = IntCounter::new(
            "cash_ledger_escrow_sweeps_total",
            "Escrows released by the sweeper",
        )?;
        registry.register(Box::new(escrow_sweeps_total.clone()))?;

        let commit_duration = Histogram::with_opts(
            HistogramOpts::new(
                "cash_ledger_commit_duration_seconds",
                "Histogram of submit latencies",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 1.0]),
        )?;
        registry.register(Box::new(commit_duration.clone()))?;

        Ok(Self {
            transactions_total,
            rejected_total,
            lock_conflicts_total,
            escrow_sweeps_total,
            commit_duration,
            registry,
        })
    }

    /// Record committed transaction
    pub fn record_commit(&self, instruction: &str, duration_seconds: f64) {
        self.transactions_total
            .with_label_values(&[instruction])
            .inc();
        self.commit_duration.observe(duration_seconds);
    }

    /// Record rejected transaction
    pub fn record_rejection(&self, kind: ErrorKind) {
        self.rejected_total
            .with_label_values(&[kind.as_str()])
            .inc();
        if kind == ErrorKind::AccountInUse {
            self.lock_conflicts_total.inc();
        }
    }

    /// Record sweeper release
    pub fn record_sweep(&self) {
        self.escrow_sweeps_total.inc();
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Export all metrics in Prometheus text format
    pub fn export(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("lock_conflicts_total", &self.lock_conflicts_total.get())
            .field("escrow_sweeps_total", &self.escrow_sweeps_total.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.lock_conflicts_total.get(), 0);
        assert_eq!(metrics.escrow_sweeps_total.get(), 0);
    }

    #[test]
    fn test_independent_registries() {
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();
        a.record_sweep();
        assert_eq!(a.escrow_sweeps_total.get(), 1);
        assert_eq!(b.escrow_sweeps_total.get(), 0);
    }

    #[test]
    fn test_record_commit_and_rejection() {
        let metrics = Metrics::new().unwrap();
        metrics.record_commit("deposit", 0.002);
        metrics.record_commit("deposit", 0.003);
        metrics.record_rejection(ErrorKind::AccountInUse);
        metrics.record_rejection(ErrorKind::InsufficientFunds);

        assert_eq!(
            metrics
                .transactions_total
                .with_label_values(&["deposit"])
                .get(),
            2
        );
        assert_eq!(
            metrics
                .rejected_total
                .with_label_values(&["account_in_use"])
                .get(),
            1
        );
        assert_eq!(metrics.lock_conflicts_total.get(), 1);

        let text = metrics.export().unwrap();
        assert!(text.contains("cash_ledger_transactions_total{instruction=\"deposit\"} 2"));
    }
}
