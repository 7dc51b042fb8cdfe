//! HTTPTrigger CRD
//!
//! Exposes a Function over HTTP at a host/path.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "funcop.dev",
    version = "v1alpha1",
    kind = "HTTPTrigger",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct HTTPTriggerSpec {
    /// Name of the Function this trigger routes to (same namespace)
    pub function_name: String,

    /// Host name to serve the function under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_name: Option<String>,

    /// URL path prefix, defaults to "/"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// TLS secret name for serving over HTTPS
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_secret: Option<String>,
}
