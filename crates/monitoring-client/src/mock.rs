//! Mock MonitoringClient for unit testing
//!
//! In-memory implementation of `MonitoringClient` so controllers can be
//! tested without a running cluster. Records every call for assertions.

use crate::error::MonitoringError;
use crate::monitoring_trait::MonitoringClient;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Mock monitoring client for testing
///
/// Stores monitors in memory keyed by `namespace/function`. Can be
/// configured to fail every call to exercise error paths.
#[derive(Clone, Default, Debug)]
pub struct MockMonitoringClient {
    monitors: Arc<Mutex<HashMap<String, String>>>,
    ensure_calls: Arc<Mutex<Vec<String>>>,
    delete_calls: Arc<Mutex<Vec<String>>>,
    fail: Arc<Mutex<bool>>,
}

impl MockMonitoringClient {
    /// Create a new mock client
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with an API-unavailable error
    pub fn set_fail(&self, fail: bool) {
        *self.fail.lock().expect("mock lock") = fail;
    }

    /// True if a monitor exists for `namespace/function`
    pub fn has_monitor(&self, namespace: &str, function_name: &str) -> bool {
        self.monitors
            .lock()
            .expect("mock lock")
            .contains_key(&key(namespace, function_name))
    }

    /// Keys passed to `ensure`, in call order
    pub fn ensure_calls(&self) -> Vec<String> {
        self.ensure_calls.lock().expect("mock lock").clone()
    }

    /// Keys passed to `delete`, in call order
    pub fn delete_calls(&self) -> Vec<String> {
        self.delete_calls.lock().expect("mock lock").clone()
    }

    fn check_fail(&self) -> Result<(), MonitoringError> {
        if *self.fail.lock().expect("mock lock") {
            return Err(MonitoringError::ApiUnavailable(
                "mock configured to fail".to_string(),
            ));
        }
        Ok(())
    }
}

fn key(namespace: &str, function_name: &str) -> String {
    format!("{namespace}/{function_name}")
}

#[async_trait::async_trait]
impl MonitoringClient for MockMonitoringClient {
    async fn ensure(
        &self,
        namespace: &str,
        function_name: &str,
        port: &str,
    ) -> Result<(), MonitoringError> {
        self.ensure_calls
            .lock()
            .expect("mock lock")
            .push(key(namespace, function_name));
        self.check_fail()?;
        self.monitors
            .lock()
            .expect("mock lock")
            .insert(key(namespace, function_name), port.to_string());
        Ok(())
    }

    async fn delete(&self, namespace: &str, function_name: &str) -> Result<(), MonitoringError> {
        self.delete_calls
            .lock()
            .expect("mock lock")
            .push(key(namespace, function_name));
        self.check_fail()?;
        self.monitors
            .lock()
            .expect("mock lock")
            .remove(&key(namespace, function_name));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ensure_is_idempotent_and_recorded() {
        let mock = MockMonitoringClient::new();

        mock.ensure("default", "hello", "http-function")
            .await
            .expect("ensure");
        mock.ensure("default", "hello", "http-function")
            .await
            .expect("ensure again");

        assert!(mock.has_monitor("default", "hello"));
        assert_eq!(mock.ensure_calls().len(), 2);
    }

    #[tokio::test]
    async fn delete_removes_monitor() {
        let mock = MockMonitoringClient::new();
        mock.ensure("default", "hello", "http-function")
            .await
            .expect("ensure");

        mock.delete("default", "hello").await.expect("delete");

        assert!(!mock.has_monitor("default", "hello"));
        assert_eq!(mock.delete_calls(), vec!["default/hello".to_string()]);
    }

    #[tokio::test]
    async fn configured_failure_surfaces() {
        let mock = MockMonitoringClient::new();
        mock.set_fail(true);

        let err = mock.ensure("default", "hello", "http-function").await;
        assert!(matches!(err, Err(MonitoringError::ApiUnavailable(_))));
    }
}
