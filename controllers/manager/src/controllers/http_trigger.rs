//! HTTP trigger controller.
//!
//! Consumes HTTPTrigger and Function notifications from the shared watch
//! factory: validates that each trigger routes to an existing function and
//! warns about triggers orphaned by a function deletion.

use crate::clients::HTTPTriggerConfig;
use crate::error::ManagerError;
use crate::factory::{SharedWatchFactory, Subscription};
use crate::manager::Controller;
use crate::signal::TerminationSignal;
use crds::{Function, HTTPTrigger};
use kube::api::ListParams;
use kube::{Api, ResourceExt};
use kube_runtime::watcher;
use tracing::{debug, error, info, warn};

/// Reconciles HTTPTrigger resources.
pub struct HTTPTriggerController {
    config: HTTPTriggerConfig,
    triggers: Subscription<HTTPTrigger>,
    functions: Subscription<Function>,
}

impl HTTPTriggerController {
    /// Creates the controller, registering its interests with the shared
    /// factory. No background work starts here; the factory dispatches
    /// nothing until it is started.
    pub fn new(
        config: HTTPTriggerConfig,
        factory: &SharedWatchFactory,
    ) -> Result<Self, ManagerError> {
        Ok(Self {
            config,
            triggers: factory.subscribe::<HTTPTrigger>()?,
            functions: factory.subscribe::<Function>()?,
        })
    }

    async fn reconcile(&self, trigger: &HTTPTrigger) {
        let namespace = trigger.metadata.namespace.as_deref().unwrap_or("default");
        let Some(name) = trigger.metadata.name.as_deref() else {
            warn!("Skipping HTTPTrigger without a name");
            return;
        };
        let function_name = &trigger.spec.function_name;
        debug!("Reconciling HTTPTrigger {}/{}", namespace, name);

        let functions: Api<Function> =
            Api::namespaced(self.config.domain_client.clone(), namespace);
        match functions.get(function_name).await {
            Ok(_) => {
                info!(
                    "HTTPTrigger {}/{} routes {} to function {}",
                    namespace,
                    name,
                    trigger.spec.path.as_deref().unwrap_or("/"),
                    function_name
                );
            }
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                warn!(
                    "HTTPTrigger {}/{} references missing function {}",
                    namespace, name, function_name
                );
            }
            Err(e) => {
                error!(
                    "Failed to look up function {} for HTTPTrigger {}/{}: {}",
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
                        "HTTPTrigger {}/{} orphaned by deletion of function {}",
                        namespace,
                        trigger.name_any(),
                        name
                    );
                }
            }
            Err(e) => error!("Failed to list HTTPTriggers after function deletion: {}", e),
        }
    }
}

/// True if the trigger targets the named function in the same namespace.
fn references_function(trigger: &HTTPTrigger, namespace: &str, function_name: &str) -> bool {
    trigger.spec.function_name == function_name
        && trigger.metadata.namespace.as_deref().unwrap_or("default") == namespace
}

#[async_trait::async_trait]
impl Controller for HTTPTriggerController {
    fn name(&self) -> &str {
        "http-trigger"
    }

    async fn run(mut self: Box<Self>, signal: TerminationSignal) -> Result<(), ManagerError> {
        info!("HTTP trigger controller running");

        loop {
            tokio::select! {
                _ = signal.fired() => {
                    info!("HTTP trigger controller draining");
                    break;
                }
                event = self.triggers.recv() => match event {
                    Some(watcher::Event::Apply(trigger) | watcher::Event::InitApply(trigger)) => {
                        self.reconcile(&trigger).await;
                    }
                    Some(watcher::Event::Delete(trigger)) => {
                        info!(
                            "HTTPTrigger {}/{} deleted",
                            trigger.metadata.namespace.as_deref().unwrap_or("default"),
                            trigger.name_any()
                        );
                    }
                    Some(watcher::Event::Init | watcher::Event::InitDone) => {}
                    None => {
                        warn!("HTTPTrigger stream closed");
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

#[cfg(test)]
mod tests {
    use super::*;

    fn test_trigger(namespace: &str, name: &str, function_name: &str) -> HTTPTrigger {
        let mut trigger = HTTPTrigger::new(
            name,
            crds::HTTPTriggerSpec {
                function_name: function_name.to_string(),
                host_name: None,
                path: None,
                tls_secret: None,
            },
        );
        trigger.metadata.namespace = Some(namespace.to_string());
        trigger
    }

    #[test]
    fn trigger_references_function_in_same_namespace() {
        let trigger = test_trigger("default", "web", "hello");
        assert!(references_function(&trigger, "default", "hello"));
    }

    #[test]
    fn namespace_mismatch_is_not_a_reference() {
        let trigger = test_trigger("other", "web", "hello");
        assert!(!references_function(&trigger, "default", "hello"));
    }

    #[test]
    fn function_name_mismatch_is_not_a_reference() {
        let trigger = test_trigger("default", "web", "goodbye");
        assert!(!references_function(&trigger, "default", "hello"));
    }
}
