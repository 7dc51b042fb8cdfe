//! Function CRD
//!
//! A deployable serverless function: runtime, handler entrypoint and
//! inline source, reconciled into runnable workloads by the function
//! controller.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "funcop.dev",
    version = "v1alpha1",
    kind = "Function",
    namespaced,
    status = "FunctionStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct FunctionSpec {
    /// Language runtime identifier (e.g. "python3.11", "nodejs20")
    pub runtime: String,

    /// Entrypoint within the source, "module.function" form
    pub handler: String,

    /// Inline function source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,

    /// Dependency manifest for the runtime's package manager
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deps: Option<String>,

    /// Checksum of the source, "sha256:<hex>" form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,

    /// Invocation timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct FunctionStatus {
    /// Deployment phase of the function
    pub phase: FunctionPhase,

    /// Error message if the function failed to deploy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Last reconciliation timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reconciled: Option<chrono::DateTime<chrono::Utc>>,
}

/// Function deployment phase
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub enum FunctionPhase {
    /// Not yet reconciled
    #[default]
    Pending,

    /// Workload converged and serving
    Ready,

    /// Reconciliation failed
    Failed,
}
