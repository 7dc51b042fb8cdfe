//! ServiceMonitor Client
//!
//! A thin client for the Prometheus Operator's `ServiceMonitor` resource
//! (`monitoring.coreos.com/v1`), used by the function controller to keep
//! one monitor per deployed function.
//!
//! # Example
//!
//! ```no_run
//! use monitoring_client::{MonitoringClient, ServiceMonitorClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = kube::Config::incluster()?;
//! let client = ServiceMonitorClient::from_config(config)?;
//! client.ensure("default", "hello", "http-function").await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
#[path = "trait.rs"]
pub mod monitoring_trait;
pub mod service_monitor;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::ServiceMonitorClient;
pub use error::MonitoringError;
#[cfg(feature = "test-util")]
pub use mock::MockMonitoringClient;
pub use monitoring_trait::MonitoringClient;
pub use service_monitor::{Endpoint, MonitorSelector, ServiceMonitor, ServiceMonitorSpec};
