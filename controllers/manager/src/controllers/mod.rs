//! The supervised reconciliation controllers.
//!
//! Each controller is an independent sibling: constructed with its own
//! config, launched on its own task, coordinated with the others only
//! through the shared termination signal. Reconciliation errors for
//! individual resources are logged here and never escalate to the
//! manager.

pub mod cron_job_trigger;
pub mod function;
pub mod http_trigger;

pub use cron_job_trigger::CronJobTriggerController;
pub use function::FunctionController;
pub use http_trigger::HTTPTriggerController;
