//! Prometheus metrics for pipeline and product observability.

use prometheus::{
    HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};

pub struct Metrics {
    registry: Registry,

    pub fetch_attempts_total: IntCounterVec,
    pub fetch_latency_seconds: HistogramVec,
    pub extract_items_total: IntCounterVec,
    pub organizer_docs_total: IntCounterVec,
    pub organizer_failures_total: IntCounterVec,
    pub anchor_yield_total: IntCounterVec,
    pub evidence_score: HistogramVec,
    pub event_state_transitions_total: IntCounterVec,
    pub event_score: HistogramVec,
    pub unverified_viral_events_total: IntCounterVec,
    pub merges_total: IntCounterVec,
    pub queue_backlog: IntGaugeVec,
    pub data_starvation_incidents_total: IntCounterVec,
    pub sse_events_sent_total: IntCounterVec,
}

fn counter(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> IntCounterVec {
    let vec = IntCounterVec::new(Opts::new(name, help), labels).expect("valid metric");
    registry.register(Box::new(vec.clone())).expect("unique metric");
    vec
}

fn gauge(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> IntGaugeVec {
    let vec = IntGaugeVec::new(Opts::new(name, help), labels).expect("valid metric");
    registry.register(Box::new(vec.clone())).expect("unique metric");
    vec
}

fn histogram(
    registry: &Registry,
    name: &str,
    help: &str,
    labels: &[&str],
    buckets: Vec<f64>,
) -> HistogramVec {
    let vec = HistogramVec::new(HistogramOpts::new(name, help).buckets(buckets), labels)
        .expect("valid metric");
    registry.register(Box::new(vec.clone())).expect("unique metric");
    vec
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();
        Self {
            fetch_attempts_total: counter(
                &registry,
                "radar_fetch_attempts_total",
                "Total fetch attempts by outcome",
                &["source_id", "strategy", "pool", "status_class", "error_class"],
            ),
            fetch_latency_seconds: histogram(
                &registry,
                "radar_fetch_latency_seconds",
                "Fetch latency by strategy/pool",
                &["strategy", "pool"],
                vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 40.0, 60.0],
            ),
            extract_items_total: counter(
                &registry,
                "radar_extract_items_total",
                "Items produced by extraction",
                &["source_id", "strategy"],
            ),
            organizer_docs_total: counter(
                &registry,
                "radar_organizer_docs_total",
                "Documents organized into events",
                &["source_id", "lane", "matched_existing"],
            ),
            organizer_failures_total: counter(
                &registry,
                "radar_organizer_failures_total",
                "Organize transactions rolled back",
                &["source_id"],
            ),
            anchor_yield_total: counter(
                &registry,
                "radar_anchor_yield_total",
                "Total anchors extracted by source",
                &["source_id"],
            ),
            evidence_score: histogram(
                &registry,
                "radar_evidence_score",
                "Evidence score distribution",
                &["source_id"],
                vec![0.0, 0.5, 1.0, 2.0, 3.0, 5.0, 8.0, 12.0, 15.0],
            ),
            event_state_transitions_total: counter(
                &registry,
                "radar_event_state_transitions_total",
                "Event state transitions",
                &["from_status", "to_status", "reason"],
            ),
            event_score: histogram(
                &registry,
                "radar_event_score",
                "Event scores by lane",
                &["score_type", "lane"],
                vec![0.0, 5.0, 10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0],
            ),
            unverified_viral_events_total: counter(
                &registry,
                "radar_unverified_viral_events_total",
                "Events flagged as UNVERIFIED_VIRAL",
                &["lane"],
            ),
            merges_total: counter(
                &registry,
                "radar_event_merges_total",
                "Merged events (tombstones)",
                &["reason_code"],
            ),
            queue_backlog: gauge(
                &registry,
                "radar_queue_backlog_estimate",
                "Queue backlog estimate",
                &["queue_name"],
            ),
            data_starvation_incidents_total: counter(
                &registry,
                "radar_data_starvation_incidents_total",
                "DATA_STARVATION incidents",
                &["source_domain"],
            ),
            sse_events_sent_total: counter(
                &registry,
                "radar_sse_events_sent_total",
                "SSE events sent by type",
                &["event_type"],
            ),
            registry,
        }
    }

    /// Prometheus text exposition of every registered metric.
    pub fn render(&self) -> String {
        TextEncoder::new()
            .encode_to_string(&self.registry.gather())
            .unwrap_or_default()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_register_and_render() {
        let metrics = Metrics::new();
        metrics
            .fetch_attempts_total
            .with_label_values(&["src", "FEED", "FAST", "2xx", "none"])
            .inc();
        metrics.queue_backlog.with_label_values(&["organize"]).set(3);
        let text = metrics.render();
        assert!(text.contains("radar_fetch_attempts_total"));
        assert!(text.contains("radar_queue_backlog_estimate"));
    }
}
