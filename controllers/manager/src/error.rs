//! Controller-manager error types.
//!
//! Only conditions the orchestrator itself can hit live here; per-resource
//! reconciliation errors stay inside the controllers and are never
//! surfaced through this type.

use monitoring_client::MonitoringError;
use thiserror::Error;

/// Errors that can occur in the controller manager.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// In-cluster REST configuration could not be obtained
    #[error("cluster configuration error: {0}")]
    ClusterConfig(#[from] kube::config::InClusterError),

    /// Monitoring-resource client error
    #[error("monitoring client error: {0}")]
    Monitoring(#[from] MonitoringError),

    /// Resource watch failed
    #[error("resource watch failed: {0}")]
    Watch(String),

    /// Shared watch factory misuse (kind-name collision, erased-type mismatch)
    #[error("shared watch factory error: {0}")]
    Factory(String),

    /// A controller stopped before the termination signal fired
    #[error("controller {name} terminated unexpectedly: {reason}")]
    ControllerExited {
        /// Controller name as reported by `Controller::name`
        name: String,
        /// Why the controller stopped
        reason: String,
    },
}
