//! CronJobTrigger CRD
//!
//! Invokes a Function on a cron schedule.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "funcop.dev",
    version = "v1alpha1",
    kind = "CronJobTrigger",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct CronJobTriggerSpec {
    /// Name of the Function this trigger invokes (same namespace)
    pub function_name: String,

    /// Cron schedule in standard five-field form (e.g. "*/5 * * * *")
    pub schedule: String,

    /// Payload passed to the function on each invocation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}
