//! Prometheus metrics, directly grounded on `operator/src/metrics.rs`'s
//! `register_*_vec!` + `OnceLock` global pattern, renamed from
//! "reconcile"/"resources" to the rebuild-centric vocabulary of the event
//! loop (spec.md §4.5).

use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge_vec, HistogramVec,
    IntCounterVec, IntGaugeVec,
};
use std::sync::OnceLock;

pub struct Metrics {
    pub rebuild_total: IntCounterVec,
    pub rebuild_errors: IntCounterVec,
    pub rebuild_duration: HistogramVec,
    pub entity_errors: IntCounterVec,
    pub topology_size: IntGaugeVec,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

impl Metrics {
    fn new() -> Self {
        Self {
            rebuild_total: register_int_counter_vec!(
                "mesh_controller_rebuild_total",
                "Total number of topology rebuilds",
                &["result"]
            )
            .unwrap(),

            rebuild_errors: register_int_counter_vec!(
                "mesh_controller_rebuild_errors_total",
                "Total number of rebuild failures by cause",
                &["reason"]
            )
            .unwrap(),

            rebuild_duration: register_histogram_vec!(
                "mesh_controller_rebuild_duration_seconds",
                "Duration of a full rebuild: snapshot, build, provide, publish, shadow reconcile",
                &["stage"],
                vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]
            )
            .unwrap(),

            entity_errors: register_int_counter_vec!(
                "mesh_controller_entity_errors_total",
                "Per-entity faults recorded on the topology, by error variant",
                &["kind"]
            )
            .unwrap(),

            topology_size: register_int_gauge_vec!(
                "mesh_controller_topology_size",
                "Number of live entities in the last published topology",
                &["kind"]
            )
            .unwrap(),
        }
    }

    pub fn global() -> &'static Metrics {
        METRICS.get_or_init(Metrics::new)
    }

    pub fn record_rebuild_success(&self, duration_secs: f64) {
        self.rebuild_total.with_label_values(&["success"]).inc();
        self.rebuild_duration.with_label_values(&["total"]).observe(duration_secs);
    }

    pub fn record_rebuild_error(&self, reason: &str) {
        self.rebuild_total.with_label_values(&["error"]).inc();
        self.rebuild_errors.with_label_values(&[reason]).inc();
    }

    pub fn observe_stage(&self, stage: &str, duration_secs: f64) {
        self.rebuild_duration.with_label_values(&[stage]).observe(duration_secs);
    }

    pub fn record_entity_error(&self, kind: &str) {
        self.entity_errors.with_label_values(&[kind]).inc();
    }

    pub fn set_topology_size(&self, kind: &str, count: i64) {
        self.topology_size.with_label_values(&[kind]).set(count);
    }
}
