//! Prometheus metrics for the relayer.
//!
//! All metrics are aggregated in the [`Metrics`] struct for easy tracking and management.

use crate::relay_loop::BatchReport;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Duration;

/// Aggregated metrics for the relay loop.
///
/// Metrics are registered with the global metrics registry on creation.
#[derive(Debug, Clone)]
pub struct Metrics {
    _private: (),
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics instance and register all metric descriptions.
    pub fn new() -> Self {
        Self::register_descriptions();
        Self { _private: () }
    }

    /// Register metric descriptions with the global registry.
    fn register_descriptions() {
        // Loop metrics
        describe_gauge!(
            "relayer_cursor_batch_index",
            "Next state root batch index the relay loop will process"
        );
        describe_histogram!(
            "relayer_tick_duration_seconds",
            "Duration of each relay loop tick in seconds"
        );
        describe_counter!(
            "relayer_loop_errors_total",
            "Total number of relay loop ticks that failed"
        );

        // Batch metrics
        describe_counter!(
            "relayer_batches_processed_total",
            "Total number of batches fully attempted"
        );
        describe_counter!(
            "relayer_batches_deferred_total",
            "Total number of batch attempts deferred for retry"
        );

        // Message metrics
        describe_counter!(
            "relayer_messages_total",
            "Total messages handled by outcome"
        );
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Loop metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Set the current cursor position.
    pub fn set_cursor(&self, batch_index: u64) {
        gauge!("relayer_cursor_batch_index").set(batch_index as f64);
    }

    /// Record the duration of one tick.
    pub fn record_tick(&self, duration: Duration) {
        histogram!("relayer_tick_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a failed tick.
    pub fn record_loop_error(&self) {
        counter!("relayer_loop_errors_total").increment(1);
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Batch metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Record a fully attempted batch and its message outcomes.
    pub fn record_batch(&self, report: &BatchReport) {
        counter!("relayer_batches_processed_total").increment(1);

        for (outcome, count) in [
            ("relayed", report.relayed),
            ("already_relayed", report.already_relayed),
            ("simulated", report.simulated),
            ("failed", report.failed),
        ] {
            counter!("relayer_messages_total", "outcome" => outcome).increment(count as u64);
        }
    }

    /// Record a deferred batch.
    pub fn record_deferred(&self) {
        counter!("relayer_batches_deferred_total").increment(1);
    }
}

/// Install the Prometheus metrics exporter and start the HTTP server.
///
/// Returns an error if the server fails to bind to the specified port.
pub fn install_prometheus_exporter(port: u16) -> eyre::Result<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::net::SocketAddr;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| eyre::eyre!("Failed to install Prometheus exporter: {}", e))?;

    Ok(())
}
