//! Function controller.
//!
//! Watches Function resources with its own watcher (the primary kind is
//! not shared through the factory) and keeps one ServiceMonitor per
//! function so deployed functions are scraped.

use crate::clients::FunctionConfig;
use crate::error::ManagerError;
use crate::manager::Controller;
use crate::signal::TerminationSignal;
use crds::Function;
use futures::StreamExt;
use kube_runtime::watcher;
use monitoring_client::MonitoringClient;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Named service port every function workload exposes metrics on.
const METRICS_PORT: &str = "http-function";

/// Flat delay before re-polling a watch stream that yielded an error.
const WATCH_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Reconciles Function resources and their monitoring resources.
pub struct FunctionController {
    config: FunctionConfig,
    monitoring: Arc<dyn MonitoringClient>,
}

impl FunctionController {
    /// Creates the controller. No background work starts here.
    pub fn new(config: FunctionConfig, monitoring: Arc<dyn MonitoringClient>) -> Self {
        Self { config, monitoring }
    }

    async fn reconcile(&self, function: &Function) {
        let namespace = function.metadata.namespace.as_deref().unwrap_or("default");
        let Some(name) = function.metadata.name.as_deref() else {
            warn!("Skipping Function without a name");
            return;
        };
        debug!("Reconciling Function {}/{}", namespace, name);

        if let Err(e) = self.monitoring.ensure(namespace, name, METRICS_PORT).await {
            error!("Failed to ensure monitor for Function {}/{}: {}", namespace, name, e);
        }
    }

    async fn cleanup(&self, function: &Function) {
        let namespace = function.metadata.namespace.as_deref().unwrap_or("default");
        let Some(name) = function.metadata.name.as_deref() else {
            return;
        };
        info!("Function {}/{} deleted", namespace, name);

        if let Err(e) = self.monitoring.delete(namespace, name).await {
            error!("Failed to delete monitor for Function {}/{}: {}", namespace, name, e);
        }
    }
}

#[async_trait::async_trait]
impl Controller for FunctionController {
    fn name(&self) -> &str {
        "function"
    }

    async fn run(self: Box<Self>, signal: TerminationSignal) -> Result<(), ManagerError> {
        info!("Function controller running");
        let mut stream = Box::pin(watcher(
            self.config.functions.clone(),
            watcher::Config::default(),
        ));

        loop {
            tokio::select! {
                _ = signal.fired() => {
                    info!("Function controller draining");
                    break;
                }
                event = stream.next() => match event {
                    Some(Ok(watcher::Event::Apply(function) | watcher::Event::InitApply(function))) => {
                        self.reconcile(&function).await;
                    }
                    Some(Ok(watcher::Event::Delete(function))) => {
                        self.cleanup(&function).await;
                    }
                    Some(Ok(watcher::Event::Init)) => {
                        debug!("Function watch initializing");
                    }
                    Some(Ok(watcher::Event::InitDone)) => {
                        info!("Function watch initialized");
                    }
                    Some(Err(e)) => {
                        error!("Function watch stream error: {}", e);
                        tokio::select! {
                            _ = signal.fired() => break,
                            () = tokio::time::sleep(WATCH_RETRY_DELAY) => {}
                        }
                    }
                    None => {
                        warn!("Function watch stream ended");
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
    use crate::clients::FunctionConfig;
    use crate::test_utils::mock_kube_client;
    use kube::Api;
    use monitoring_client::MockMonitoringClient;

    fn test_function(namespace: &str, name: &str) -> Function {
        let mut function = Function::new(
            name,
            crds::FunctionSpec {
                runtime: "python3.11".to_string(),
                handler: "handler.main".to_string(),
                function: None,
                deps: None,
                checksum: None,
                timeout: None,
            },
        );
        function.metadata.namespace = Some(namespace.to_string());
        function
    }

    fn test_controller(monitoring: Arc<MockMonitoringClient>) -> FunctionController {
        FunctionController::new(
            FunctionConfig {
                functions: Api::all(mock_kube_client()),
            },
            monitoring,
        )
    }

    #[tokio::test]
    async fn reconcile_ensures_a_monitor() {
        let monitoring = Arc::new(MockMonitoringClient::new());
        let controller = test_controller(Arc::clone(&monitoring));

        controller.reconcile(&test_function("default", "hello")).await;

        assert!(monitoring.has_monitor("default", "hello"));
    }

    #[tokio::test]
    async fn cleanup_deletes_the_monitor() {
        let monitoring = Arc::new(MockMonitoringClient::new());
        let controller = test_controller(Arc::clone(&monitoring));

        controller.reconcile(&test_function("default", "hello")).await;
        controller.cleanup(&test_function("default", "hello")).await;

        assert!(!monitoring.has_monitor("default", "hello"));
    }

    #[tokio::test]
    async fn monitoring_errors_do_not_escalate() {
        let monitoring = Arc::new(MockMonitoringClient::new());
        monitoring.set_fail(true);
        let controller = test_controller(Arc::clone(&monitoring));

        // Must not panic or propagate; the failure is logged internally.
        controller.reconcile(&test_function("default", "hello")).await;

        assert_eq!(monitoring.ensure_calls().len(), 1);
        assert!(!monitoring.has_monitor("default", "hello"));
    }
}
