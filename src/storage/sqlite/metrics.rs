//! Operation metrics shared by the collection backends.
//!
//! Every store operation reports `storage_operations_total` and
//! `storage_operation_duration_ms`, labelled by backend, operation and
//! outcome. Nothing is exported unless the binary installs a recorder.

use std::time::{Duration, Instant};

/// Outcome label of a store operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    /// The operation returned `Ok`.
    Success,
    /// The operation returned `Err`.
    Error,
}

impl OperationStatus {
    /// Returns the metric label value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    const fn of<T>(result: &crate::Result<T>) -> Self {
        if result.is_ok() {
            Self::Success
        } else {
            Self::Error
        }
    }
}

/// Records one finished operation.
pub fn record_operation_metrics(
    backend: &'static str,
    operation: &'static str,
    status: OperationStatus,
    elapsed: Duration,
) {
    let labels = [
        ("backend", backend),
        ("operation", operation),
        ("status", status.as_str()),
    ];
    metrics::counter!("storage_operations_total", &labels).increment(1);
    metrics::histogram!("storage_operation_duration_ms", &labels)
        .record(elapsed.as_secs_f64() * 1000.0);
}

/// Runs `op` and records its outcome and latency.
///
/// The result of `op` is returned untouched.
pub fn timed<T>(
    backend: &'static str,
    operation: &'static str,
    op: impl FnOnce() -> crate::Result<T>,
) -> crate::Result<T> {
    let started = Instant::now();
    let result = op();
    record_operation_metrics(
        backend,
        operation,
        OperationStatus::of(&result),
        started.elapsed(),
    );
    if let Err(e) = &result {
        tracing::debug!(backend, operation, error = %e, "Store operation failed");
    }
    result
}
