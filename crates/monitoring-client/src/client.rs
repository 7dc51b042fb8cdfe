//! Kube-backed ServiceMonitor client implementation.

use crate::error::MonitoringError;
use crate::monitoring_trait::MonitoringClient;
use crate::service_monitor::{Endpoint, MonitorSelector, ServiceMonitor, ServiceMonitorSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{DeleteParams, PostParams};
use kube::{Api, Client};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Label applied to every monitor this client creates.
const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
/// Value of the managed-by label.
const MANAGER_NAME: &str = "funcop-controller-manager";
/// Label carrying the owning function's name.
const FUNCTION_LABEL: &str = "funcop.dev/function";

/// Client for ServiceMonitor resources, one monitor per function.
#[derive(Clone)]
pub struct ServiceMonitorClient {
    client: Client,
}

impl std::fmt::Debug for ServiceMonitorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceMonitorClient").finish_non_exhaustive()
    }
}

impl ServiceMonitorClient {
    /// Creates a client from an already-built kube client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Creates a client from a REST configuration (the in-cluster config in
    /// production).
    pub fn from_config(config: kube::Config) -> Result<Self, MonitoringError> {
        let client = Client::try_from(config)?;
        Ok(Self { client })
    }

    fn api(&self, namespace: &str) -> Api<ServiceMonitor> {
        Api::namespaced(self.client.clone(), namespace)
    }

    /// Builds the monitor object for a function.
    fn monitor_for(namespace: &str, function_name: &str, port: &str) -> ServiceMonitor {
        let mut labels = BTreeMap::new();
        labels.insert(MANAGED_BY_LABEL.to_string(), MANAGER_NAME.to_string());
        labels.insert(FUNCTION_LABEL.to_string(), function_name.to_string());

        let mut match_labels = BTreeMap::new();
        match_labels.insert(FUNCTION_LABEL.to_string(), function_name.to_string());

        ServiceMonitor {
            metadata: ObjectMeta {
                name: Some(function_name.to_string()),
                namespace: Some(namespace.to_string()),
                labels: Some(labels),
                ..Default::default()
            },
            spec: ServiceMonitorSpec {
                selector: MonitorSelector { match_labels },
                endpoints: vec![Endpoint {
                    port: port.to_string(),
                    path: Some("/metrics".to_string()),
                    interval: None,
                }],
            },
        }
    }
}

#[async_trait::async_trait]
impl MonitoringClient for ServiceMonitorClient {
    async fn ensure(
        &self,
        namespace: &str,
        function_name: &str,
        port: &str,
    ) -> Result<(), MonitoringError> {
        if function_name.is_empty() {
            return Err(MonitoringError::InvalidMonitor(
                "function name must not be empty".to_string(),
            ));
        }

        let api = self.api(namespace);
        match api.get(function_name).await {
            Ok(_) => {
                debug!("ServiceMonitor {}/{} already exists", namespace, function_name);
                Ok(())
            }
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                let monitor = Self::monitor_for(namespace, function_name, port);
                api.create(&PostParams::default(), &monitor).await?;
                info!("Created ServiceMonitor {}/{}", namespace, function_name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, namespace: &str, function_name: &str) -> Result<(), MonitoringError> {
        let api = self.api(namespace);
        match api.delete(function_name, &DeleteParams::default()).await {
            Ok(_) => {
                info!("Deleted ServiceMonitor {}/{}", namespace, function_name);
                Ok(())
            }
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                debug!("ServiceMonitor {}/{} already gone", namespace, function_name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
