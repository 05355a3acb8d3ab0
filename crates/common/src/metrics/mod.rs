//! Metrics and observability utilities
//!
//! Prometheus metrics with standardized naming conventions. Every
//! metric is prefixed with [`METRICS_PREFIX`].

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Instant;

/// Metrics prefix for all catman metrics
pub const METRICS_PREFIX: &str = "catman";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.075, 0.100, 0.150, 0.250, 0.500, 1.000, 2.500, 5.000,
    10.00,
];

/// Buckets for search-engine submissions (slower, network bound)
pub const INDEX_BUCKETS: &[f64] = &[
    0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.000, 5.000, 10.00, 30.00,
];

/// Install the Prometheus exporter on `port`; 0 disables it
pub fn install_exporter(port: u16) -> crate::Result<()> {
    if port == 0 {
        tracing::info!("Metrics exporter disabled");
        return Ok(());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_request_duration_seconds", METRICS_PREFIX)),
            LATENCY_BUCKETS,
        )
        .and_then(|builder| {
            builder.set_buckets_for_metric(
                Matcher::Full(format!("{}_index_duration_seconds", METRICS_PREFIX)),
                INDEX_BUCKETS,
            )
        })
        .and_then(|builder| builder.install())
        .map_err(|e| crate::AppError::Configuration {
            message: format!("Failed to install metrics exporter: {}", e),
        })?;

    tracing::info!(%addr, "Metrics exporter listening");
    Ok(())
}

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Intake metrics
    describe_counter!(
        format!("{}_articles_created_total", METRICS_PREFIX),
        Unit::Count,
        "Articles accepted and stored"
    );

    describe_counter!(
        format!("{}_articles_rejected_total", METRICS_PREFIX),
        Unit::Count,
        "Article submissions rejected, by reason"
    );

    describe_counter!(
        format!("{}_article_saves_total", METRICS_PREFIX),
        Unit::Count,
        "Article saves seen by the audit trail"
    );

    // Pipeline metrics
    describe_counter!(
        format!("{}_link_attempts_total", METRICS_PREFIX),
        Unit::Count,
        "Linker runs, by kind and outcome"
    );

    describe_counter!(
        format!("{}_index_submissions_total", METRICS_PREFIX),
        Unit::Count,
        "Indexer runs, by outcome"
    );

    describe_histogram!(
        format!("{}_index_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Search engine submission latency in seconds"
    );

    describe_counter!(
        format!("{}_sweep_enqueued_total", METRICS_PREFIX),
        Unit::Count,
        "Jobs enqueued by sweeps, by sweep"
    );

    // Queue metrics
    describe_counter!(
        format!("{}_queue_messages_processed_total", METRICS_PREFIX),
        Unit::Count,
        "Total queue messages processed, by task and outcome"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

pub fn record_article_created() {
    counter!(format!("{}_articles_created_total", METRICS_PREFIX)).increment(1);
}

pub fn record_article_rejected(reason: &'static str) {
    counter!(
        format!("{}_articles_rejected_total", METRICS_PREFIX),
        "reason" => reason
    )
    .increment(1);
}

pub fn record_article_saved(created: bool) {
    counter!(
        format!("{}_article_saves_total", METRICS_PREFIX),
        "kind" => if created { "create" } else { "update" }
    )
    .increment(1);
}

pub fn record_link(kind: &'static str, outcome: &'static str) {
    counter!(
        format!("{}_link_attempts_total", METRICS_PREFIX),
        "kind" => kind,
        "outcome" => outcome
    )
    .increment(1);
}

/// Record an indexer run; `duration_secs` is the submission latency when
/// a submission was made
pub fn record_index(outcome: &'static str, duration_secs: Option<f64>) {
    counter!(
        format!("{}_index_submissions_total", METRICS_PREFIX),
        "outcome" => outcome
    )
    .increment(1);

    if let Some(duration) = duration_secs {
        histogram!(format!("{}_index_duration_seconds", METRICS_PREFIX)).record(duration);
    }
}

pub fn record_sweep(sweep: &'static str, enqueued: usize) {
    counter!(
        format!("{}_sweep_enqueued_total", METRICS_PREFIX),
        "sweep" => sweep
    )
    .increment(enqueued as u64);
}

pub fn record_queue_message(task: &'static str, outcome: &'static str) {
    counter!(
        format!("{}_queue_messages_processed_total", METRICS_PREFIX),
        "task" => task,
        "outcome" => outcome
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_are_sorted() {
        for buckets in [LATENCY_BUCKETS, INDEX_BUCKETS] {
            assert!(buckets.windows(2).all(|pair| pair[0] < pair[1]));
        }
    }

    #[test]
    fn test_recording_without_recorder() {
        // no global recorder installed: every helper is a no-op
        let metrics = RequestMetrics::start("POST", "/v1/articles");
        metrics.finish(201);
        record_index("indexed", Some(0.02));
        record_sweep("dirty", 3);
        assert!(install_exporter(0).is_ok());
    }
}
