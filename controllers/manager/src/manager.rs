//! Controller-manager orchestration.
//!
//! The manager owns the registered controllers and the termination signal.
//! `run` launches every controller on its own task without any startup
//! barrier, then blocks until the signal fires or a controller stops
//! early. An early stop is escalated: the signal is fired so the siblings
//! drain, and the run reports an error. After the signal fires the manager
//! waits a bounded time for controllers to finish, then gives up and logs
//! the stragglers.

use crate::error::ManagerError;
use crate::signal::TerminationSignal;
use futures::FutureExt;
use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Default window controllers get to drain after the signal fires.
const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// What a supervised controller task produced: the controller's clean or
/// failed return, or its caught panic payload. Panics are caught inside
/// the task so every exit still carries the controller's name.
type RunOutcome = Result<Result<(), ManagerError>, Box<dyn Any + Send>>;

/// A supervised reconciliation unit.
///
/// Construction must not start background work; `run` is the only entry
/// point and is invoked once, on the controller's own task. It must return
/// once the signal has fired. Per-resource reconciliation errors are the
/// controller's own concern and must not surface here.
#[async_trait::async_trait]
pub trait Controller: Send {
    /// Controller name used in logs and supervision messages.
    fn name(&self) -> &str;

    /// Runs the controller until the termination signal fires.
    async fn run(self: Box<Self>, signal: TerminationSignal) -> Result<(), ManagerError>;
}

/// Manager tunables.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// How long to wait for controllers after the signal fires.
    pub drain_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

/// Supervises a fixed set of controllers sharing one termination signal.
pub struct ControllerManager {
    controllers: Vec<Box<dyn Controller>>,
    signal: TerminationSignal,
    config: ManagerConfig,
}

impl std::fmt::Debug for ControllerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerManager")
            .field("controllers", &self.controllers.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ControllerManager {
    /// Creates a manager owning the given signal.
    pub fn new(signal: TerminationSignal) -> Self {
        Self::with_config(signal, ManagerConfig::default())
    }

    /// Creates a manager with explicit tunables.
    pub fn with_config(signal: TerminationSignal, config: ManagerConfig) -> Self {
        Self {
            controllers: Vec::new(),
            signal,
            config,
        }
    }

    /// Registers a controller. All registrations happen before `run`;
    /// order between controllers carries no meaning.
    pub fn register(&mut self, controller: Box<dyn Controller>) {
        self.controllers.push(controller);
    }

    /// Number of registered controllers.
    pub fn controller_count(&self) -> usize {
        self.controllers.len()
    }

    /// Launches every controller and supervises them until shutdown.
    ///
    /// Returns `Ok(())` when shutdown was signal-triggered, or the first
    /// unexpected-exit error when a controller stopped on its own.
    pub async fn run(mut self) -> Result<(), ManagerError> {
        let mut tasks = JoinSet::new();
        let mut running: HashSet<String> = HashSet::new();

        // Launching: fire-and-forget, no readiness barrier.
        for controller in self.controllers.drain(..) {
            let name = controller.name().to_string();
            let signal = self.signal.clone();
            info!("Launching {} controller", name);
            running.insert(name.clone());
            tasks.spawn(async move {
                let outcome = AssertUnwindSafe(controller.run(signal)).catch_unwind().await;
                (name, outcome)
            });
        }
        info!("{} controller(s) running", running.len());

        // Running: block until the signal fires or a controller stops early.
        let mut failure = None;
        loop {
            tokio::select! {
                // Signal wins when a clean post-signal exit races it.
                biased;
                _ = self.signal.fired() => {
                    info!("Termination signal fired, draining controllers");
                    break;
                }
                joined = tasks.join_next() => match joined {
                    Some(exit) => {
                        let err = early_exit_error(exit);
                        if let ManagerError::ControllerExited { name, .. } = &err {
                            running.remove(name.as_str());
                        }
                        error!("{}", err);
                        // Escalate: one sibling down means the whole
                        // process shuts down.
                        self.signal.fire();
                        failure = Some(err);
                        break;
                    }
                    None => break,
                },
            }
        }

        // Draining: bounded wait for the remaining controllers.
        let deadline = tokio::time::Instant::now() + self.config.drain_timeout;
        while !tasks.is_empty() {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                warn!(
                    "Drain timeout reached, still running: {:?}",
                    running.iter().collect::<Vec<_>>()
                );
                tasks.abort_all();
                break;
            }
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    Some(Ok((name, Ok(Ok(()))))) => {
                        running.remove(name.as_str());
                        info!("{} controller stopped", name);
                    }
                    Some(Ok((name, Ok(Err(e))))) => {
                        running.remove(name.as_str());
                        warn!("{} controller stopped with error: {}", name, e);
                    }
                    Some(Ok((name, Err(_)))) => {
                        running.remove(name.as_str());
                        warn!("{} controller panicked during drain", name);
                    }
                    Some(Err(e)) => {
                        warn!("controller task failed during drain: {}", e);
                    }
                    None => break,
                },
                () = tokio::time::sleep(remaining) => {}
            }
        }

        info!("Controller manager stopped");
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Maps a pre-signal task exit to the escalation error.
fn early_exit_error(
    exit: Result<(String, RunOutcome), tokio::task::JoinError>,
) -> ManagerError {
    match exit {
        Ok((name, Ok(Ok(())))) => ManagerError::ControllerExited {
            name,
            reason: "returned before the termination signal fired".to_string(),
        },
        Ok((name, Ok(Err(e)))) => ManagerError::ControllerExited {
            name,
            reason: e.to_string(),
        },
        Ok((name, Err(_))) => ManagerError::ControllerExited {
            name,
            reason: "controller task panicked".to_string(),
        },
        // Only cancellation can reach here; panics are caught in the task.
        Err(join_err) => ManagerError::ControllerExited {
            name: "unknown".to_string(),
            reason: join_err.to_string(),
        },
    }
}
