//! Request Logger Port
//!
//! Sink receiving one record per request handled by the HTTP app. Injected
//! per app instance, with [`TracingRequestLogger`] as the default.

use std::time::Duration;

/// Outcome of one handled request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRecord {
    pub method: String,
    pub path: String,
    pub status: u16,
    pub elapsed: Duration,
    /// Metric name of the handler that served the request, if any
    pub metric_name: Option<String>,
    /// Error message for failed requests
    pub error: Option<String>,
}

/// Receives request records (logging, metrics...).
pub trait RequestLogger: Send + Sync {
    fn log_request(&self, record: &RequestRecord);
}

/// Logs every request through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingRequestLogger;

impl RequestLogger for TracingRequestLogger {
    fn log_request(&self, record: &RequestRecord) {
        tracing::info!(
            "Request(Status={}, Method={}, Path={}, Time={:?}, Error={})",
            record.status,
            record.method,
            record.path,
            record.elapsed,
            record.error.as_deref().unwrap_or("none")
        );
    }
}
