//! Shared watch factory.
//!
//! Watches each resource kind once and fans change notifications out to
//! every subscribed controller, so two controllers interested in the same
//! kind share one underlying watch connection instead of opening two.
//!
//! `subscribe` is bookkeeping only; nothing is dispatched until `start` is
//! invoked, after every controller has been constructed. The watcher tasks
//! observe the shared termination signal and stop when it fires.

use crate::error::ManagerError;
use crate::signal::TerminationSignal;
use futures::StreamExt;
use kube::api::ListParams;
use kube::{Api, Client};
use kube_runtime::watcher;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Per-kind fan-out channel capacity. Slow subscribers past this depth
/// miss events and are told how many they lost.
const CHANNEL_CAPACITY: usize = 128;

/// Flat delay before re-polling a watch stream that yielded an error.
const WATCH_RETRY_DELAY: Duration = Duration::from_secs(5);

type Starter = Box<dyn FnOnce(Client, Duration, TerminationSignal) -> JoinHandle<()> + Send>;

struct Registration {
    /// Erased `broadcast::Sender<watcher::Event<K>>` for the kind.
    sender: Box<dyn Any + Send>,
    /// Spawns the kind's watcher task; consumed by `start`.
    starter: Option<Starter>,
    /// Number of subscriptions taken for this kind.
    registrations: usize,
}

struct Inner {
    watches: HashMap<String, Registration>,
    tasks: Vec<JoinHandle<()>>,
    started: bool,
}

/// De-duplicating watch fan-out, one instance shared by all controllers.
pub struct SharedWatchFactory {
    client: Client,
    resync_period: Duration,
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for SharedWatchFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedWatchFactory")
            .field("resync_period", &self.resync_period)
            .finish_non_exhaustive()
    }
}

impl SharedWatchFactory {
    /// Creates a factory over the domain client. A zero `resync_period`
    /// means no periodic forced re-list; rely purely on change
    /// notifications.
    pub fn new(client: Client, resync_period: Duration) -> Self {
        Self {
            client,
            resync_period,
            inner: Mutex::new(Inner {
                watches: HashMap::new(),
                tasks: Vec::new(),
                started: false,
            }),
        }
    }

    /// Registers interest in kind `K` and returns the event stream for it.
    ///
    /// Idempotent per kind: the first subscription creates the fan-out
    /// channel, later ones attach to it. No watch connection is opened
    /// until `start`.
    pub fn subscribe<K>(&self) -> Result<Subscription<K>, ManagerError>
    where
        K: kube::Resource<DynamicType = ()>
            + Clone
            + serde::de::DeserializeOwned
            + std::fmt::Debug
            + Send
            + Sync
            + 'static,
    {
        let kind = K::kind(&()).into_owned();
        let mut inner = self.inner.lock().map_err(|_| {
            ManagerError::Factory("factory state poisoned by a panicked subscriber".to_string())
        })?;

        if inner.started {
            return Err(ManagerError::Factory(format!(
                "cannot register {kind} interest after the factory has started"
            )));
        }

        let registration = inner.watches.entry(kind.clone()).or_insert_with(|| {
            let (sender, _) = broadcast::channel::<watcher::Event<K>>(CHANNEL_CAPACITY);
            let task_sender = sender.clone();
            let task_kind = kind.clone();
            let starter: Starter = Box::new(move |client, resync, signal| {
                tokio::spawn(watch_kind::<K>(
                    Api::all(client),
                    resync,
                    task_sender,
                    signal,
                    task_kind,
                ))
            });
            Registration {
                sender: Box::new(sender),
                starter: Some(starter),
                registrations: 0,
            }
        });
        registration.registrations += 1;

        let sender = registration
            .sender
            .downcast_ref::<broadcast::Sender<watcher::Event<K>>>()
            .ok_or_else(|| {
                ManagerError::Factory(format!("conflicting resource types registered as {kind}"))
            })?;

        debug!(
            "Registered {} interest ({} subscription(s))",
            kind, registration.registrations
        );
        Ok(Subscription {
            kind,
            receiver: sender.subscribe(),
        })
    }

    /// Spawns one watcher task per registered kind. Idempotent: a second
    /// call is a no-op.
    pub fn start(&self, signal: &TerminationSignal) {
        let mut inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };
        if inner.started {
            return;
        }
        inner.started = true;

        let starters: Vec<Starter> = inner
            .watches
            .values_mut()
            .filter_map(|registration| registration.starter.take())
            .collect();
        info!("Starting {} shared watch(es)", starters.len());
        for starter in starters {
            let task = starter(self.client.clone(), self.resync_period, signal.clone());
            inner.tasks.push(task);
        }
    }

    /// Number of distinct kinds under watch (one underlying watch each).
    pub fn watch_count(&self) -> usize {
        match self.inner.lock() {
            Ok(inner) => inner.watches.len(),
            Err(poisoned) => poisoned.into_inner().watches.len(),
        }
    }

    /// Number of subscriptions taken for a kind.
    pub fn registration_count(&self, kind: &str) -> usize {
        match self.inner.lock() {
            Ok(inner) => inner.watches.get(kind).map_or(0, |r| r.registrations),
            Err(poisoned) => poisoned
                .into_inner()
                .watches
                .get(kind)
                .map_or(0, |r| r.registrations),
        }
    }

    /// Number of watcher tasks actually spawned.
    pub fn started_watch_count(&self) -> usize {
        match self.inner.lock() {
            Ok(inner) => inner.tasks.len(),
            Err(poisoned) => poisoned.into_inner().tasks.len(),
        }
    }
}

/// A controller's handle on one kind's shared event stream.
#[derive(Debug)]
pub struct Subscription<K> {
    kind: String,
    receiver: broadcast::Receiver<watcher::Event<K>>,
}

impl<K: Clone> Subscription<K> {
    /// Receives the next event, skipping over any the subscriber was too
    /// slow to see. Returns `None` once the stream is closed.
    pub async fn recv(&mut self) -> Option<watcher::Event<K>> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("{} subscriber lagged, missed {} event(s)", self.kind, missed);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Drives one kind's watch stream until the signal fires.
async fn watch_kind<K>(
    api: Api<K>,
    resync_period: Duration,
    sender: broadcast::Sender<watcher::Event<K>>,
    signal: TerminationSignal,
    kind: String,
) where
    K: kube::Resource<DynamicType = ()>
        + Clone
        + serde::de::DeserializeOwned
        + std::fmt::Debug
        + Send
        + Sync
        + 'static,
{
    info!("Starting shared {} watch", kind);
    let mut stream = Box::pin(watcher(api.clone(), watcher::Config::default()));
    let mut resync = resync_interval(resync_period);

    loop {
        tokio::select! {
            _ = signal.fired() => {
                info!("Stopping shared {} watch", kind);
                break;
            }
            event = stream.next() => match event {
                Some(Ok(event)) => {
                    let _ = sender.send(event);
                }
                Some(Err(e)) => {
                    error!("{} watch stream error: {}", kind, e);
                    tokio::select! {
                        _ = signal.fired() => break,
                        () = tokio::time::sleep(WATCH_RETRY_DELAY) => {}
                    }
                }
                None => {
                    warn!("{} watch stream ended", kind);
                    break;
                }
            },
            () = tick(&mut resync) => {
                resync_kind(&api, &sender, &kind).await;
            }
        }
    }
}

/// Broadcasts the full current state as `Apply` events (periodic resync).
async fn resync_kind<K>(api: &Api<K>, sender: &broadcast::Sender<watcher::Event<K>>, kind: &str)
where
    K: kube::Resource<DynamicType = ()> + Clone + serde::de::DeserializeOwned + std::fmt::Debug,
{
    match api.list(&ListParams::default()).await {
        Ok(list) => {
            debug!("Resyncing {} {} object(s)", list.items.len(), kind);
            for item in list.items {
                let _ = sender.send(watcher::Event::Apply(item));
            }
        }
        Err(e) => error!("{} resync list failed: {}", kind, e),
    }
}

fn resync_interval(period: Duration) -> Option<tokio::time::Interval> {
    (!period.is_zero()).then(|| {
        // Skip the immediate first tick an interval would otherwise fire.
        tokio::time::interval_at(tokio::time::Instant::now() + period, period)
    })
}

async fn tick(interval: &mut Option<tokio::time::Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::mock_kube_client;
    use crds::{Function, HTTPTrigger};

    #[tokio::test]
    async fn same_kind_shares_one_watch() {
        let factory = SharedWatchFactory::new(mock_kube_client(), Duration::ZERO);

        let _first = factory.subscribe::<Function>().expect("subscribe");
        let _second = factory.subscribe::<Function>().expect("subscribe again");
        let _other = factory.subscribe::<HTTPTrigger>().expect("subscribe trigger");

        assert_eq!(factory.watch_count(), 2);
        assert_eq!(factory.registration_count("Function"), 2);
        assert_eq!(factory.registration_count("HTTPTrigger"), 1);
    }

    #[tokio::test]
    async fn start_spawns_one_task_per_kind_and_is_idempotent() {
        let factory = SharedWatchFactory::new(mock_kube_client(), Duration::ZERO);
        let _function = factory.subscribe::<Function>().expect("subscribe");
        let _trigger = factory.subscribe::<HTTPTrigger>().expect("subscribe");

        let signal = TerminationSignal::new();
        factory.start(&signal);
        factory.start(&signal);

        assert_eq!(factory.started_watch_count(), 2);
        signal.fire();
    }

    #[tokio::test]
    async fn subscribe_after_start_is_rejected() {
        let factory = SharedWatchFactory::new(mock_kube_client(), Duration::ZERO);
        let _function = factory.subscribe::<Function>().expect("subscribe");

        let signal = TerminationSignal::new();
        factory.start(&signal);

        let late = factory.subscribe::<HTTPTrigger>();
        assert!(late.is_err());
        signal.fire();
    }

    #[tokio::test(start_paused = true)]
    async fn zero_resync_period_disables_periodic_relist() {
        assert!(resync_interval(Duration::ZERO).is_none());

        // A disabled resync never ticks, no matter how long we wait.
        let mut disabled = resync_interval(Duration::ZERO);
        let ticked =
            tokio::time::timeout(Duration::from_secs(3600), tick(&mut disabled)).await;
        assert!(ticked.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn first_resync_tick_comes_after_one_full_period() {
        let period = Duration::from_secs(60);
        let mut resync = resync_interval(period);
        assert!(resync.is_some());

        // No immediate tick on creation.
        let early = tokio::time::timeout(period - Duration::from_secs(1), tick(&mut resync)).await;
        assert!(early.is_err());

        // The tick becomes due once the remainder of the period elapses.
        let due = tokio::time::timeout(Duration::from_secs(2), tick(&mut resync)).await;
        assert!(due.is_ok());
    }

    #[tokio::test]
    async fn events_fan_out_to_every_subscriber() {
        let factory = SharedWatchFactory::new(mock_kube_client(), Duration::ZERO);
        let mut first = factory.subscribe::<Function>().expect("subscribe");
        let mut second = factory.subscribe::<Function>().expect("subscribe");

        // Push an event through the shared channel directly; the watcher
        // task is not needed for fan-out semantics.
        let function = Function::new(
            "hello",
            crds::FunctionSpec {
                runtime: "python3.11".to_string(),
                handler: "handler.main".to_string(),
                function: None,
                deps: None,
                checksum: None,
                timeout: None,
            },
        );
        {
            let inner = factory.inner.lock().expect("factory lock");
            let registration = inner.watches.get("Function").expect("registered");
            let sender = registration
                .sender
                .downcast_ref::<broadcast::Sender<watcher::Event<Function>>>()
                .expect("sender type");
            sender
                .send(watcher::Event::Apply(function))
                .expect("send event");
        }

        assert!(matches!(first.recv().await, Some(watcher::Event::Apply(_))));
        assert!(matches!(second.recv().await, Some(watcher::Event::Apply(_))));
    }
}
