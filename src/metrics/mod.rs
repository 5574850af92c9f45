use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

// ============================================================================
// Metrics Module - Prometheus metrics for the persistence provider
// ============================================================================
//
// Persist failures never reach the caller, so they are counted here in
// addition to being logged:
// - Rows written per table
// - Failed writes per table and error kind
// - Aborted reads per operation and error kind
// - Events replayed and envelopes that failed to decode
// - Snapshot lookups (hit/miss)
// - Store round-trip latency per operation
//
// The registry is owned by the caller; expose it however the host exposes
// metrics.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    pub persist_total: IntCounterVec,
    pub persist_failures: IntCounterVec,
    pub read_failures: IntCounterVec,

    pub events_replayed: IntCounter,
    pub decode_failures: IntCounterVec,
    pub snapshot_lookups: IntCounterVec,

    pub store_operation_duration: HistogramVec,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        Self::with_registry(Registry::new())
    }

    /// Register the provider metrics in an existing registry.
    pub fn with_registry(registry: Registry) -> prometheus::Result<Self> {
        let persist_total = IntCounterVec::new(
            Opts::new("persistence_rows_written_total", "Rows written to the journal or snapshot table"),
            &["table"],
        )?;
        registry.register(Box::new(persist_total.clone()))?;

        let persist_failures = IntCounterVec::new(
            Opts::new("persistence_write_failures_total", "Persist calls that failed and were dropped"),
            &["table", "reason"],
        )?;
        registry.register(Box::new(persist_failures.clone()))?;

        let read_failures = IntCounterVec::new(
            Opts::new("persistence_read_failures_total", "Replays and snapshot lookups that failed"),
            &["operation", "reason"],
        )?;
        registry.register(Box::new(read_failures.clone()))?;

        let events_replayed = IntCounter::new(
            "persistence_events_replayed_total",
            "Events delivered to replay callbacks",
        )?;
        registry.register(Box::new(events_replayed.clone()))?;

        let decode_failures = IntCounterVec::new(
            Opts::new("persistence_decode_failures_total", "Stored envelopes that could not be decoded"),
            &["reason"],
        )?;
        registry.register(Box::new(decode_failures.clone()))?;

        let snapshot_lookups = IntCounterVec::new(
            Opts::new("persistence_snapshot_lookups_total", "Snapshot lookups by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(snapshot_lookups.clone()))?;

        let store_operation_duration = HistogramVec::new(
            HistogramOpts::new("persistence_store_operation_duration_seconds", "Store round-trip duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["operation"],
        )?;
        registry.register(Box::new(store_operation_duration.clone()))?;

        Ok(Self {
            registry,
            persist_total,
            persist_failures,
            read_failures,
            events_replayed,
            decode_failures,
            snapshot_lookups,
            store_operation_duration,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_persist(&self, table: &str, duration_secs: f64) {
        self.persist_total.with_label_values(&[table]).inc();
        self.store_operation_duration
            .with_label_values(&["persist"])
            .observe(duration_secs);
    }

    pub fn record_persist_failure(&self, table: &str, reason: &str) {
        self.persist_failures.with_label_values(&[table, reason]).inc();
    }

    pub fn record_read_failure(&self, operation: &str, reason: &str) {
        self.read_failures.with_label_values(&[operation, reason]).inc();
    }

    pub fn record_replay(&self, delivered: u64, duration_secs: f64) {
        self.events_replayed.inc_by(delivered);
        self.store_operation_duration
            .with_label_values(&["get_events"])
            .observe(duration_secs);
    }

    pub fn record_decode_failure(&self, reason: &str) {
        self.decode_failures.with_label_values(&[reason]).inc();
    }

    pub fn record_snapshot_lookup(&self, found: bool, duration_secs: f64) {
        let outcome = if found { "hit" } else { "miss" };
        self.snapshot_lookups.with_label_values(&[outcome]).inc();
        self.store_operation_duration
            .with_label_values(&["get_snapshot"])
            .observe(duration_secs);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        metrics.record_persist("journals", 0.01);
        assert!(!metrics.registry().gather().is_empty());
    }

    #[test]
    fn test_record_persist() {
        let metrics = Metrics::new().unwrap();
        metrics.record_persist("journals", 0.002);
        metrics.record_persist("journals", 0.003);
        metrics.record_persist("snapshots", 0.004);

        assert_eq!(metrics.persist_total.with_label_values(&["journals"]).get(), 2);
        assert_eq!(metrics.persist_total.with_label_values(&["snapshots"]).get(), 1);
    }

    #[test]
    fn test_record_persist_failure() {
        let metrics = Metrics::new().unwrap();
        metrics.record_persist_failure("journals", "duplicate_sequence");

        let gathered = metrics.registry.gather();
        assert!(gathered
            .iter()
            .any(|m| m.name() == "persistence_write_failures_total"));
        assert_eq!(
            metrics
                .persist_failures
                .with_label_values(&["journals", "duplicate_sequence"])
                .get(),
            1
        );
    }

    #[test]
    fn test_record_read_failure() {
        let metrics = Metrics::new().unwrap();
        metrics.record_read_failure("get_events", "store");
        metrics.record_read_failure("get_events", "store");
        metrics.record_read_failure("get_snapshot", "unknown_type");

        assert_eq!(metrics.read_failures.with_label_values(&["get_events", "store"]).get(), 2);
        assert_eq!(
            metrics
                .read_failures
                .with_label_values(&["get_snapshot", "unknown_type"])
                .get(),
            1
        );
    }

    #[test]
    fn test_record_replay_and_lookups() {
        let metrics = Metrics::new().unwrap();
        metrics.record_replay(3, 0.01);
        metrics.record_snapshot_lookup(true, 0.01);
        metrics.record_snapshot_lookup(false, 0.01);
        metrics.record_snapshot_lookup(false, 0.01);

        assert_eq!(metrics.events_replayed.get(), 3);
        assert_eq!(metrics.snapshot_lookups.with_label_values(&["hit"]).get(), 1);
        assert_eq!(metrics.snapshot_lookups.with_label_values(&["miss"]).get(), 2);
    }

    #[test]
    fn test_registering_twice_in_one_registry_fails() {
        let registry = Registry::new();
        assert!(Metrics::with_registry(registry.clone()).is_ok());
        assert!(Metrics::with_registry(registry).is_err());
    }
}
