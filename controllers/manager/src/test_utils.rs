//! Test utilities for unit testing the orchestrator
//!
//! Provides offline kube clients and controller doubles shared by the
//! module tests.

#[cfg(test)]
use crate::error::ManagerError;
#[cfg(test)]
use crate::manager::Controller;
#[cfg(test)]
use crate::signal::TerminationSignal;
#[cfg(test)]
use kube::Client;
#[cfg(test)]
use std::sync::Arc;
#[cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};

/// Kube client backed by a mock service; never connects anywhere.
#[cfg(test)]
pub fn mock_kube_client() -> Client {
    let (mock_service, _handle) = tower_test::mock::pair::<
        http::Request<kube::client::Body>,
        http::Response<kube::client::Body>,
    >();
    Client::new(mock_service, "default")
}

/// How a test controller behaves after its `run` is invoked.
#[cfg(test)]
#[derive(Clone, Copy, Debug)]
pub enum TestBehavior {
    /// Wait for the termination signal, then return Ok
    RunUntilSignalled,
    /// Never return, not even on the signal
    IgnoreSignal,
    /// Return an error immediately
    FailImmediately,
    /// Panic immediately
    PanicImmediately,
}

/// Controller double that counts `run` invocations.
#[cfg(test)]
pub struct TestController {
    name: String,
    behavior: TestBehavior,
    launches: Arc<AtomicUsize>,
}

#[cfg(test)]
impl TestController {
    pub fn new(name: &str, behavior: TestBehavior) -> (Self, Arc<AtomicUsize>) {
        let launches = Arc::new(AtomicUsize::new(0));
        (
            Self {
                name: name.to_string(),
                behavior,
                launches: Arc::clone(&launches),
            },
            launches,
        )
    }
}

#[cfg(test)]
#[async_trait::async_trait]
impl Controller for TestController {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(self: Box<Self>, signal: TerminationSignal) -> Result<(), ManagerError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            TestBehavior::RunUntilSignalled => {
                signal.fired().await;
                Ok(())
            }
            TestBehavior::IgnoreSignal => {
                futures::future::pending::<()>().await;
                Ok(())
            }
            TestBehavior::FailImmediately => Err(ManagerError::Watch(format!(
                "{} failed on launch",
                self.name
            ))),
            TestBehavior::PanicImmediately => panic!("{} panicked on launch", self.name),
        }
    }
}
