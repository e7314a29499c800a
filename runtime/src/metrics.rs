//! Prometheus metrics for the ledger.
//!
//! Operations record through the `metrics` facade; nothing is exported until a recorder is
//! installed, so tests and embedders that do not care pay only a no-op call.
//!
//! # Example
//!
//! ```rust,no_run
//! use campus_points_runtime::metrics::PrometheusRecorder;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut recorder = PrometheusRecorder::new();
//! recorder.install()?;
//!
//! // ... run ledger operations ...
//!
//! if let Some(text) = recorder.render() {
//!     println!("{text}");
//! }
//! # Ok(())
//! # }
//! ```

use campus_points_core::{LedgerError, TransactionKind};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Installs the Prometheus recorder and renders the exposition text.
#[derive(Default)]
pub struct PrometheusRecorder {
    handle: Option<PrometheusHandle>,
}

impl PrometheusRecorder {
    /// Create an uninstalled recorder.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Register metric descriptions and install the global recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a recorder is already installed (e.g., by another test), this logs a warning and
    /// succeeds without a handle.
    pub fn install(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Prometheus metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this instance did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!(
        "ledger_transactions_recorded_total",
        "Total number of transactions committed to the ledger"
    );
    describe_counter!(
        "ledger_points_issued_total",
        "Total number of positive points credited to accounts"
    );
    describe_counter!(
        "ledger_operations_rejected_total",
        "Total number of ledger operations rejected, by reason"
    );
    describe_counter!(
        "ledger_commit_conflicts_total",
        "Total number of commits that lost an optimistic concurrency race"
    );
    describe_histogram!(
        "ledger_operation_duration_seconds",
        "Time taken by a ledger operation, including retries"
    );
}

/// Ledger metrics recorder.
pub struct LedgerMetrics;

impl LedgerMetrics {
    /// Record a committed record.
    pub fn record_committed(kind: TransactionKind, points: i64) {
        counter!("ledger_transactions_recorded_total", "kind" => kind.as_str()).increment(1);
        if let Ok(issued) = u64::try_from(points) {
            counter!("ledger_points_issued_total", "kind" => kind.as_str()).increment(issued);
        }
    }

    /// Record a rejected operation.
    pub fn record_rejected(kind: TransactionKind, err: &LedgerError) {
        counter!(
            "ledger_operations_rejected_total",
            "kind" => kind.as_str(),
            "reason" => err.reason()
        )
        .increment(1);
    }

    /// Record a lost commit race.
    pub fn record_conflict(kind: TransactionKind) {
        counter!("ledger_commit_conflicts_total", "kind" => kind.as_str()).increment(1);
    }

    /// Record operation latency.
    pub fn record_duration(kind: TransactionKind, duration: Duration) {
        histogram!("ledger_operation_duration_seconds", "kind" => kind.as_str())
            .record(duration.as_secs_f64());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_starts_uninstalled() {
        let recorder = PrometheusRecorder::new();
        assert!(recorder.render().is_none());
    }

    #[test]
    fn test_ledger_metrics_render() {
        let mut recorder = PrometheusRecorder::new();
        recorder.install().unwrap();

        LedgerMetrics::record_committed(TransactionKind::Purchase, 255);
        LedgerMetrics::record_rejected(
            TransactionKind::Redemption,
            &LedgerError::InvalidAmount("zero".to_string()),
        );
        LedgerMetrics::record_conflict(TransactionKind::Transfer);
        LedgerMetrics::record_duration(TransactionKind::Purchase, Duration::from_millis(2));

        // If another test installed the recorder first, this instance has no handle.
        if let Some(rendered) = recorder.render() {
            assert!(rendered.contains("ledger_transactions_recorded_total"));
            assert!(rendered.contains("ledger_operations_rejected_total"));
            assert!(rendered.contains("ledger_commit_conflicts_total"));
        }
    }
}
