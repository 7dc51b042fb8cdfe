//! Funcop CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the funcop controllers.

pub mod cron_job_trigger;
pub mod function;
pub mod http_trigger;

pub use cron_job_trigger::*;
pub use function::*;
pub use http_trigger::*;
