//! MonitoringClient trait for mocking
//!
//! Abstracts the ServiceMonitor operations so controllers can be unit
//! tested without a running cluster. The concrete `ServiceMonitorClient`
//! implements this trait; tests use `MockMonitoringClient`.

use crate::error::MonitoringError;

/// Trait for monitoring-resource operations
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait MonitoringClient: Send + Sync {
    /// Ensure a ServiceMonitor exists for the named function, scraping the
    /// given named service port. Idempotent: an existing monitor with the
    /// same name is left in place.
    async fn ensure(
        &self,
        namespace: &str,
        function_name: &str,
        port: &str,
    ) -> Result<(), MonitoringError>;

    /// Delete the function's ServiceMonitor if present. Absence is not an error.
    async fn delete(&self, namespace: &str, function_name: &str) -> Result<(), MonitoringError>;
}
