//! Funcop Controller Manager
//!
//! Hosts the Function, HTTPTrigger and CronJobTrigger controllers in a
//! single process: bootstraps the shared Kubernetes clients, wires the
//! controllers to a shared watch factory, and supervises them until an
//! OS signal or an unexpected controller exit triggers shutdown.

mod clients;
mod controllers;
mod error;
mod factory;
mod manager;
mod signal;
#[cfg(test)]
mod test_utils;

use std::time::Duration;

use anyhow::Context;
use clients::{
    ClientSet, CronJobTriggerConfig, FunctionConfig, HTTPTriggerConfig, InClusterBootstrapper,
};
use controllers::{CronJobTriggerController, FunctionController, HTTPTriggerController};
use factory::SharedWatchFactory;
use manager::ControllerManager;
use signal::TerminationSignal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Shared informer resync period. Zero disables periodic re-listing,
/// matching the behavior the trigger controllers expect.
const RESYNC_PERIOD: Duration = Duration::ZERO;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    info!("Starting funcop controller manager");

    // Any client failure here aborts startup before controllers launch.
    let clients = ClientSet::bootstrap(&InClusterBootstrapper)
        .await
        .inspect_err(|e| error!("Failed to bootstrap cluster clients: {}", e))
        .context("bootstrapping cluster clients")?;
    let version = clients
        .kube
        .apiserver_version()
        .await
        .context("querying the apiserver version")?;
    info!("Connected to Kubernetes {}.{}", version.major, version.minor);

    let signal = TerminationSignal::new();
    let factory = SharedWatchFactory::new(clients.domain.clone(), RESYNC_PERIOD);

    let function = FunctionController::new(
        FunctionConfig::from_clients(&clients),
        clients.monitoring.clone(),
    );
    let http_trigger =
        HTTPTriggerController::new(HTTPTriggerConfig::from_clients(&clients), &factory)?;
    let cron_job_trigger =
        CronJobTriggerController::new(CronJobTriggerConfig::from_clients(&clients), &factory)?;

    // All interests are registered; start exactly one watch per kind.
    factory.start(&signal);

    spawn_signal_listener(signal.clone());

    let mut mgr = ControllerManager::new(signal);
    mgr.register(Box::new(function));
    mgr.register(Box::new(http_trigger));
    mgr.register(Box::new(cron_job_trigger));

    mgr.run().await?;

    info!("Controller manager stopped");
    Ok(())
}

/// Translates SIGINT/SIGTERM into the shared termination signal.
fn spawn_signal_listener(signal: TerminationSignal) {
    tokio::spawn(async move {
        use tokio::signal::unix::{SignalKind, signal as unix_signal};

        let mut sigterm = match unix_signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                signal.fire();
                return;
            }
        };
        let mut sigint = match unix_signal(SignalKind::interrupt()) {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to install SIGINT handler: {}", e);
                signal.fire();
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
            _ = sigint.recv() => info!("Received SIGINT, shutting down"),
        }
        signal.fire();
    });
}
