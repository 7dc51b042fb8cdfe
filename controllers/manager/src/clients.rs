//! Client bootstrapping and per-controller configuration.
//!
//! The four bootstrap operations run sequentially on the main task before
//! any concurrent work starts. Any failure is fatal to the process: a
//! manager with a partially-initialized client set cannot safely reconcile
//! anything, so there is no retry and no degraded-mode startup.
//!
//! The `ClientBootstrapper` trait exists so the bootstrap sequence can be
//! exercised in unit tests with doubles; `InClusterBootstrapper` is the
//! production implementation.

use crate::error::ManagerError;
use crds::{CronJobTrigger, Function, HTTPTrigger};
use kube::{Api, Client, Config};
use monitoring_client::{MonitoringClient, ServiceMonitorClient};
use std::sync::Arc;
use tracing::info;

/// Produces the clients the manager depends on.
#[async_trait::async_trait]
pub trait ClientBootstrapper: Send + Sync {
    /// Client for built-in cluster APIs.
    async fn primary_client(&self) -> Result<Client, ManagerError>;

    /// Client for the funcop CRD APIs.
    async fn domain_client(&self) -> Result<Client, ManagerError>;

    /// In-cluster REST configuration.
    fn incluster_config(&self) -> Result<Config, ManagerError>;

    /// Monitoring-resource client built from the REST configuration.
    async fn monitoring_client(
        &self,
        config: Config,
    ) -> Result<Arc<dyn MonitoringClient>, ManagerError>;
}

/// Production bootstrapper: everything from the pod's in-cluster environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct InClusterBootstrapper;

#[async_trait::async_trait]
impl ClientBootstrapper for InClusterBootstrapper {
    async fn primary_client(&self) -> Result<Client, ManagerError> {
        Ok(Client::try_default().await?)
    }

    async fn domain_client(&self) -> Result<Client, ManagerError> {
        let config = Config::incluster()?;
        Ok(Client::try_from(config)?)
    }

    fn incluster_config(&self) -> Result<Config, ManagerError> {
        Ok(Config::incluster()?)
    }

    async fn monitoring_client(
        &self,
        config: Config,
    ) -> Result<Arc<dyn MonitoringClient>, ManagerError> {
        Ok(Arc::new(ServiceMonitorClient::from_config(config)?))
    }
}

/// The shared client handles, constructed exactly once at startup and
/// never reassigned. Cloning is cheap: kube clients are internally
/// reference-counted.
#[derive(Clone)]
pub struct ClientSet {
    /// Client for built-in cluster APIs
    pub kube: Client,
    /// Client for the funcop CRD APIs
    pub domain: Client,
    /// Monitoring-resource client
    pub monitoring: Arc<dyn MonitoringClient>,
}

impl std::fmt::Debug for ClientSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSet").finish_non_exhaustive()
    }
}

impl ClientSet {
    /// Runs the four bootstrap operations in order, stopping at the first
    /// failure.
    pub async fn bootstrap(bootstrapper: &dyn ClientBootstrapper) -> Result<Self, ManagerError> {
        let kube = bootstrapper.primary_client().await?;
        let domain = bootstrapper.domain_client().await?;
        let config = bootstrapper.incluster_config()?;
        let monitoring = bootstrapper.monitoring_client(config).await?;
        info!("Cluster clients initialized");
        Ok(Self {
            kube,
            domain,
            monitoring,
        })
    }
}

/// Configuration for the function controller.
#[derive(Clone)]
pub struct FunctionConfig {
    /// Function API across all namespaces
    pub functions: Api<Function>,
}

impl FunctionConfig {
    /// Builds the config from the shared client set.
    pub fn from_clients(clients: &ClientSet) -> Self {
        Self {
            functions: Api::all(clients.domain.clone()),
        }
    }
}

/// Configuration for the HTTP trigger controller.
#[derive(Clone)]
pub struct HTTPTriggerConfig {
    /// CRD API client, for per-namespace Function lookups
    pub domain_client: Client,
    /// HTTPTrigger API across all namespaces
    pub triggers: Api<HTTPTrigger>,
}

impl HTTPTriggerConfig {
    /// Builds the config from the shared client set.
    pub fn from_clients(clients: &ClientSet) -> Self {
        Self {
            domain_client: clients.domain.clone(),
            triggers: Api::all(clients.domain.clone()),
        }
    }
}

/// Configuration for the cron job trigger controller.
#[derive(Clone)]
pub struct CronJobTriggerConfig {
    /// CRD API client, for per-namespace Function lookups
    pub domain_client: Client,
    /// CronJobTrigger API across all namespaces
    pub triggers: Api<CronJobTrigger>,
}

impl CronJobTriggerConfig {
    /// Builds the config from the shared client set.
    pub fn from_clients(clients: &ClientSet) -> Self {
        Self {
            domain_client: clients.domain.clone(),
            triggers: Api::all(clients.domain.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::mock_kube_client;
    use monitoring_client::MockMonitoringClient;
    use std::sync::Mutex;

    /// Bootstrapper double that records call order and can fail at a
    /// configured step.
    struct RecordingBootstrapper {
        calls: Mutex<Vec<&'static str>>,
        fail_at: Option<&'static str>,
    }

    impl RecordingBootstrapper {
        fn succeeding() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_at: None,
            }
        }

        fn failing_at(step: &'static str) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_at: Some(step),
            }
        }

        fn record(&self, step: &'static str) -> Result<(), ManagerError> {
            self.calls.lock().expect("calls lock").push(step);
            if self.fail_at == Some(step) {
                return Err(ManagerError::Watch(format!("injected failure at {step}")));
            }
            Ok(())
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    #[async_trait::async_trait]
    impl ClientBootstrapper for RecordingBootstrapper {
        async fn primary_client(&self) -> Result<Client, ManagerError> {
            self.record("primary_client")?;
            Ok(mock_kube_client())
        }

        async fn domain_client(&self) -> Result<Client, ManagerError> {
            self.record("domain_client")?;
            Ok(mock_kube_client())
        }

        fn incluster_config(&self) -> Result<Config, ManagerError> {
            self.record("incluster_config")?;
            Ok(Config::new(http::Uri::from_static("http://localhost:8080")))
        }

        async fn monitoring_client(
            &self,
            _config: Config,
        ) -> Result<Arc<dyn MonitoringClient>, ManagerError> {
            self.record("monitoring_client")?;
            Ok(Arc::new(MockMonitoringClient::new()))
        }
    }

    #[tokio::test]
    async fn bootstrap_runs_all_steps_in_order() {
        let bootstrapper = RecordingBootstrapper::succeeding();

        let clients = ClientSet::bootstrap(&bootstrapper).await;

        assert!(clients.is_ok());
        assert_eq!(
            bootstrapper.calls(),
            vec![
                "primary_client",
                "domain_client",
                "incluster_config",
                "monitoring_client"
            ]
        );
    }

    #[tokio::test]
    async fn bootstrap_stops_at_first_failure() {
        let bootstrapper = RecordingBootstrapper::failing_at("domain_client");

        let result = ClientSet::bootstrap(&bootstrapper).await;

        // The failure reason survives to the startup log line.
        let err = result.expect_err("bootstrap must fail");
        assert!(err.to_string().contains("injected failure at domain_client"));
        // Later steps are never attempted.
        assert_eq!(bootstrapper.calls(), vec!["primary_client", "domain_client"]);
    }

    #[tokio::test]
    async fn monitoring_failure_is_fatal() {
        let bootstrapper = RecordingBootstrapper::failing_at("monitoring_client");

        let result = ClientSet::bootstrap(&bootstrapper).await;

        assert!(result.is_err());
        assert_eq!(bootstrapper.calls().len(), 4);
    }

    #[tokio::test]
    async fn configs_share_the_client_set() {
        let bootstrapper = RecordingBootstrapper::succeeding();
        let clients = ClientSet::bootstrap(&bootstrapper).await.expect("bootstrap");

        // Each controller config is derivable without touching the cluster.
        let _function = FunctionConfig::from_clients(&clients);
        let _http = HTTPTriggerConfig::from_clients(&clients);
        let _cron = CronJobTriggerConfig::from_clients(&clients);
    }
}
