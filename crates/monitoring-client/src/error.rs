//! Monitoring client errors

use thiserror::Error;

/// Errors that can occur when managing monitoring resources
#[derive(Debug, Error)]
pub enum MonitoringError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// The ServiceMonitor CRD is not installed in the cluster
    #[error("ServiceMonitor API unavailable: {0}")]
    ApiUnavailable(String),

    /// Invalid monitor definition (e.g. empty function name)
    #[error("Invalid monitor: {0}")]
    InvalidMonitor(String),
}
