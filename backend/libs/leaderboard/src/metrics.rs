//! Store round-trip metrics for observability

use crate::store::Batch;
use prometheus::{CounterVec, Histogram, HistogramOpts, HistogramTimer, IntCounter, Opts, Registry};
use std::sync::OnceLock;

static METRICS: OnceLock<LeaderboardMetricsInner> = OnceLock::new();

struct LeaderboardMetricsInner {
    batches: IntCounter,
    commands: CounterVec,
    errors: IntCounter,
    batch_seconds: Histogram,
}

impl LeaderboardMetricsInner {
    fn new() -> Self {
        Self {
            batches: IntCounter::new(
                "leaderboard_store_batches_total",
                "Total store batches executed",
            )
            .expect("valid metric definition"),
            commands: CounterVec::new(
                Opts::new(
                    "leaderboard_store_commands_total",
                    "Total store commands sent, by command",
                ),
                &["command"],
            )
            .expect("valid metric definition"),
            errors: IntCounter::new(
                "leaderboard_store_errors_total",
                "Total store batches that failed",
            )
            .expect("valid metric definition"),
            batch_seconds: Histogram::with_opts(
                HistogramOpts::new(
                    "leaderboard_store_batch_seconds",
                    "Store batch round-trip latency",
                )
                .buckets(vec![0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 1.0]),
            )
            .expect("valid metric definition"),
        }
    }

    fn register(&self, registry: &Registry) -> Result<(), prometheus::Error> {
        registry.register(Box::new(self.batches.clone()))?;
        registry.register(Box::new(self.commands.clone()))?;
        registry.register(Box::new(self.errors.clone()))?;
        registry.register(Box::new(self.batch_seconds.clone()))?;
        Ok(())
    }
}

fn get_metrics() -> &'static LeaderboardMetricsInner {
    METRICS.get_or_init(LeaderboardMetricsInner::new)
}

/// Leaderboard store metrics wrapper
#[derive(Debug, Clone, Default)]
pub struct LeaderboardMetrics;

impl LeaderboardMetrics {
    pub fn new() -> Self {
        Self
    }

    /// Register metrics with a Prometheus registry
    pub fn register(registry: &Registry) -> Result<(), prometheus::Error> {
        get_metrics().register(registry)
    }

    pub fn record_batch(&self, batch: &Batch) {
        let metrics = get_metrics();
        metrics.batches.inc();
        for command in batch.commands() {
            metrics.commands.with_label_values(&[command.name()]).inc();
        }
    }

    pub fn record_error(&self) {
        get_metrics().errors.inc();
    }

    /// Observes batch latency when the returned timer drops
    pub fn start_timer(&self) -> HistogramTimer {
        get_metrics().batch_seconds.start_timer()
    }
}
