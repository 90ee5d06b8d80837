//! # Prometheus Metrics
//!
//! Operational counters for a RaSe node: how many operations ran and how
//! they ended, how many fragments were destroyed and rebuilt, and which
//! state the store is in. Rendered in the Prometheus text format by the
//! `metrics` command of the interactive session.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use rase_protocol::store::{CorruptionReport, RepairReport, StoreResult};
use rase_protocol::{ErrorClass, SystemState};

/// Holds all Prometheus metric handles for the node.
#[derive(Clone)]
pub struct StoreMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Operations by name and outcome.
    pub operations_total: IntCounterVec,
    /// Shards destroyed or tampered by injected corruption.
    pub shards_lost_total: IntCounter,
    /// Key-shares destroyed by injected corruption.
    pub shares_lost_total: IntCounter,
    /// Shards rebuilt by repair.
    pub shards_rebuilt_total: IntCounter,
    /// Current system state: 0 normal, 1 under attack, 2 recovery.
    pub system_state: IntGauge,
    /// Wall-clock latency of retrieve calls, successful or not.
    pub retrieve_latency_seconds: Histogram,
}

impl StoreMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("rase".into()), None)?;

        let operations_total = IntCounterVec::new(
            Opts::new("operations_total", "Store operations by name and outcome"),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(operations_total.clone()))?;

        let shards_lost_total = IntCounter::new(
            "shards_lost_total",
            "Shards destroyed or tampered by injected corruption",
        )?;
        registry.register(Box::new(shards_lost_total.clone()))?;

        let shares_lost_total = IntCounter::new(
            "shares_lost_total",
            "Key-shares destroyed by injected corruption",
        )?;
        registry.register(Box::new(shares_lost_total.clone()))?;

        let shards_rebuilt_total =
            IntCounter::new("shards_rebuilt_total", "Shards rebuilt by repair")?;
        registry.register(Box::new(shards_rebuilt_total.clone()))?;

        let system_state = IntGauge::new(
            "system_state",
            "Current system state (0 normal, 1 under attack, 2 recovery)",
        )?;
        registry.register(Box::new(system_state.clone()))?;

        let retrieve_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "retrieve_latency_seconds",
                "Latency of retrieve calls in seconds",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
        )?;
        registry.register(Box::new(retrieve_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            operations_total,
            shards_lost_total,
            shares_lost_total,
            shards_rebuilt_total,
            system_state,
            retrieve_latency_seconds,
        })
    }

    /// Count one finished operation under its outcome label.
    pub fn observe<T>(&self, operation: &str, result: &StoreResult<T>) {
        let outcome = match result {
            Ok(_) => "success",
            Err(e) => match e.class() {
                ErrorClass::InsufficientRedundancy => "insufficient_redundancy",
                ErrorClass::Rejected => "rejected",
                ErrorClass::Fatal => "fatal",
            },
        };
        self.operations_total
            .with_label_values(&[operation, outcome])
            .inc();
    }

    pub fn record_corruption(&self, report: &CorruptionReport) {
        self.shards_lost_total
            .inc_by((report.removed_shards.len() + report.tampered_shards.len()) as u64);
        self.shares_lost_total.inc_by(report.removed_shares.len() as u64);
    }

    pub fn record_repair(&self, report: &RepairReport) {
        self.shards_rebuilt_total
            .inc_by(report.rebuilt_shards.len() as u64);
    }

    pub fn set_state(&self, state: SystemState) {
        let value = match state {
            SystemState::Normal => 0,
            SystemState::UnderAttack => 1,
            SystemState::Recovery => 2,
        };
        self.system_state.set(value);
    }

    /// Encodes all registered metrics in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
