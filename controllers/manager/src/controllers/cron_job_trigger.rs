//! Cron job trigger controller.
//!
//! Consumes CronJobTrigger and Function notifications from the shared
//! watch factory: validates each trigger's schedule shape and function
//! reference, and warns about triggers orphaned by a function deletion.

use crate::clients::CronJobTriggerConfig;
use crate::error::ManagerError;
use crate::factory::{SharedWatchFactory, Subscription};
use crate::manager::Controller;
use crate::signal::TerminationSignal;
use crds::{CronJobTrigger, Function};
use kube::api::ListParams;
use kube::{Api, ResourceExt};
use kube_runtime::watcher;
use tracing::{debug, error, info, warn};

/// Reconciles CronJobTrigger resources.
pub struct CronJobTriggerController {
    config: CronJobTriggerConfig,
    triggers: Subscription<CronJobTrigger>,
    functions: Subscription<Function>,
}

impl CronJobTriggerController {
    /// Creates the controller, registering its interests with the shared
    /// factory. No background work starts here.
    pub fn new(
        config: CronJobTriggerConfig,
        factory: &SharedWatchFactory,
    ) -> Result<Self, ManagerError> {
        Ok(Self {
            config,
            triggers: factory.subscribe::<CronJobTrigger>()?,
            functions: factory.subscribe::<Function>()?,
        })
    }

    async fn reconcile(&self, trigger: &CronJobTrigger) {
        let namespace = trigger.metadata.namespace.as_deref().unwrap_or("default");
        let Some(name) = trigger.metadata.name.as_deref() else {
            warn!("Skipping CronJobTrigger without a name");
            return;
        };
        debug!("Reconciling CronJobTrigger {}/{}", namespace, name);

        if !schedule_looks_valid(&trigger.spec.schedule) {
            warn!(
                "CronJobTrigger {}/{} has a malformed schedule {:?}",
                namespace, name, trigger.spec.schedule
            );
            return;
        }

        let function_name = &trigger.spec.function_name;
        let functions: Api<Function> =
            Api::namespaced(self.config.domain_client.clone(), namespace);
        match functions.get(function_name).await {
            Ok(_) => {
                info!(
                    "CronJobTrigger {}/{} invokes function {} on {:?}",
                    namespace, name, function_name, trigger.spec.schedule
                );
            }
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                warn!(
                    "CronJobTrigger {}/{} references missing function {}",
                    namespace, name, function_name
                );
            }
            Err(e) => {
                error!(
                    "Failed to look up function {} for CronJobTrigger {}/{}: {}",
                    function_name, namespace, name, e
                );
            }
        }
    }

    /// Warns about triggers left dangling by a function deletion.
    async fn function_deleted(&self, function: &Function) {
        let namespace = function.metadata.namespace.as_deref().unwrap_or("default");
        let Some(name) = function.metadata.name.as_deref() else {
            return;
        };

        match self.config.triggers.list(&ListParams::default()).await {
            Ok(triggers) => {
                for trigger in triggers
                    .items
                    .iter()
                    .filter(|t| references_function(t, namespace, name))
                {
                    warn!(
                        "CronJobTrigger {}/{} orphaned by deletion of function {}",
                        namespace,
                        trigger.name_any(),
                        name
                    );
                }
            }
            Err(e) => error!("Failed to list CronJobTriggers after function deletion: {}", e),
        }
    }
}

/// True if the trigger targets the named function in the same namespace.
fn references_function(trigger: &CronJobTrigger, namespace: &str, function_name: &str) -> bool {
    trigger.spec.function_name == function_name
        && trigger.metadata.namespace.as_deref().unwrap_or("default") == namespace
}

/// Shallow shape check: five whitespace-separated, non-empty fields.
/// Full cron parsing is the trigger workload's concern, not the manager's.
fn schedule_looks_valid(schedule: &str) -> bool {
    schedule.split_whitespace().count() == 5
}

#[async_trait::async_trait]
impl Controller for CronJobTriggerController {
    fn name(&self) -> &str {
        "cronjob-trigger"
    }

    async fn run(mut self: Box<Self>, signal: TerminationSignal) -> Result<(), ManagerError> {
        info!("Cron job trigger controller running");

        loop {
            tokio::select! {
                _ = signal.fired() => {
                    info!("Cron job trigger controller draining");
                    break;
                }
                event = self.triggers.recv() => match event {
                    Some(watcher::Event::Apply(trigger) | watcher::Event::InitApply(trigger)) => {
                        self.reconcile(&trigger).await;
                    }
                    Some(watcher::Event::Delete(trigger)) => {
                        info!(
                            "CronJobTrigger {}/{} deleted",
                            trigger.metadata.namespace.as_deref().unwrap_or("default"),
                            trigger.name_any()
                        );
                    }
                    Some(watcher::Event::Init | watcher::Event::InitDone) => {}
                    None => {
                        warn!("CronJobTrigger stream closed");
                        break;
                    }
                },
                event = self.functions.recv() => match event {
                    Some(watcher::Event::Delete(function)) => {
                        self.function_deleted(&function).await;
                    }
                    Some(_) => {}
                    None => {
                        warn!("Function stream closed");
                        break;
                    }
                },
            }
        }
        Ok(())
    }
}
