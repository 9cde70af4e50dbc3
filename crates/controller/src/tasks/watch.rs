//! Watch subscription for `HealthCheck` resources
//!
//! The kube-rs watcher reports every object state it sees, including
//! modifications and full re-lists. The reconciler only reacts to add and
//! delete transitions, so [`EventTracker`] keeps the set of identities that
//! are currently known and turns raw watcher events into [`WatchEvent`]s.

use super::types::ResourceKey;
use futures::{Stream, StreamExt};
use kube::api::{Api, ApiResource, DynamicObject};
use kube::runtime::watcher::{self, Event};
use kube::runtime::WatchStreamExt;
use kube::Client;
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument, warn};

/// Add/delete notification for one declared resource
#[derive(Debug, Clone)]
pub enum WatchEvent {
    Added(DynamicObject),
    Deleted(DynamicObject),
}

/// A [`WatchEvent`] handed to the reconciler.
///
/// The watch does not pull the next transition until the paired receiver
/// resolves, which happens when the consumer signals completion or drops
/// the handle.
#[derive(Debug)]
pub struct Delivery {
    event: WatchEvent,
    handled: oneshot::Sender<()>,
}

impl Delivery {
    #[must_use]
    pub fn new(event: WatchEvent) -> (Self, oneshot::Receiver<()>) {
        let (handled, done) = oneshot::channel();
        (Self { event, handled }, done)
    }

    #[must_use]
    pub fn event(&self) -> &WatchEvent {
        &self.event
    }

    /// Split into the event and the completion handle.
    pub fn into_parts(self) -> (WatchEvent, oneshot::Sender<()>) {
        (self.event, self.handled)
    }
}

/// Tracks known identities across watcher events and re-lists
#[derive(Debug, Default)]
pub struct EventTracker {
    known: BTreeMap<ResourceKey, DynamicObject>,
    relist: Option<BTreeSet<ResourceKey>>,
}

impl EventTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of identities currently considered live
    #[must_use]
    pub fn len(&self) -> usize {
        self.known.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Fold one watcher event into the tracker, returning the add/delete
    /// transitions it implies.
    pub fn observe(&mut self, event: Event<DynamicObject>) -> Vec<WatchEvent> {
        match event {
            Event::Init => {
                debug!("Watch (re)list started");
                self.relist = Some(BTreeSet::new());
                Vec::new()
            }
            Event::InitApply(obj) => {
                let Some(key) = Self::key(&obj) else {
                    return Vec::new();
                };
                if let Some(seen) = self.relist.as_mut() {
                    seen.insert(key.clone());
                }
                self.apply(key, obj).into_iter().collect()
            }
            Event::InitDone => {
                let Some(seen) = self.relist.take() else {
                    return Vec::new();
                };
                let vanished: Vec<ResourceKey> = self
                    .known
                    .keys()
                    .filter(|key| !seen.contains(*key))
                    .cloned()
                    .collect();
                debug!(live = seen.len(), vanished = vanished.len(), "Watch (re)list complete");
                vanished
                    .into_iter()
                    .filter_map(|key| self.known.remove(&key))
                    .map(WatchEvent::Deleted)
                    .collect()
            }
            Event::Apply(obj) => match Self::key(&obj) {
                Some(key) => self.apply(key, obj).into_iter().collect(),
                None => Vec::new(),
            },
            Event::Delete(obj) => {
                if let Some(key) = Self::key(&obj) {
                    self.known.remove(&key);
                }
                vec![WatchEvent::Deleted(obj)]
            }
        }
    }

    fn apply(&mut self, key: ResourceKey, obj: DynamicObject) -> Option<WatchEvent> {
        match self.known.insert(key.clone(), obj.clone()) {
            None => Some(WatchEvent::Added(obj)),
            Some(_) => {
                debug!(resource = %key, "Ignoring modification of known HealthCheck");
                None
            }
        }
    }

    fn key(obj: &DynamicObject) -> Option<ResourceKey> {
        match ResourceKey::from_object(obj) {
            Ok(key) => Some(key),
            Err(e) => {
                warn!(error = %e, "Skipping watched object without identity");
                None
            }
        }
    }
}

/// Raw watcher stream over the configured `HealthCheck` resource.
///
/// No resync period is configured; errors are retried with the default
/// watcher backoff.
pub fn health_check_stream(
    client: Client,
    api_resource: &ApiResource,
    namespace: Option<&str>,
) -> impl Stream<Item = Result<Event<DynamicObject>, watcher::Error>> + Send {
    let api: Api<DynamicObject> = match namespace {
        Some(ns) => Api::namespaced_with(client, ns, api_resource),
        None => Api::all_with(client, api_resource),
    };
    watcher::watcher(api, watcher::Config::default()).default_backoff()
}

/// Feed add/delete transitions from `stream` into `sender` until the stream
/// ends, `shutdown` resolves, or the receiver goes away.
///
/// At most one transition is outstanding at a time: each one is handed over
/// and then awaited until the reconciler has finished with it. Shutdown is
/// raced against every wait, so transitions not yet handed over are dropped.
#[instrument(skip_all)]
pub async fn forward_events<S, F>(stream: S, sender: mpsc::Sender<Delivery>, shutdown: F)
where
    S: Stream<Item = Result<Event<DynamicObject>, watcher::Error>>,
    F: Future<Output = ()>,
{
    let mut stream = std::pin::pin!(stream);
    let mut shutdown = std::pin::pin!(shutdown);
    let mut tracker = EventTracker::new();

    info!("HealthCheck watch subscription started");

    loop {
        let next = tokio::select! {
            () = &mut shutdown => {
                info!("Shutdown requested, closing HealthCheck watch");
                return;
            }
            next = stream.next() => next,
        };

        let event = match next {
            Some(Ok(event)) => event,
            Some(Err(e)) => {
                warn!(error = %e, "HealthCheck watch error, retrying");
                continue;
            }
            None => {
                info!("HealthCheck watch stream ended");
                return;
            }
        };

        let transitions = tracker.observe(event);
        let pending = transitions.len();
        for (sent, transition) in transitions.into_iter().enumerate() {
            let (delivery, done) = Delivery::new(transition);

            tokio::select! {
                () = &mut shutdown => {
                    info!(dropped = pending - sent, "Shutdown requested, closing HealthCheck watch");
                    return;
                }
                result = sender.send(delivery) => {
                    if result.is_err() {
                        warn!("Reconciler stopped receiving events, closing watch");
                        return;
                    }
                }
            }

            tokio::select! {
                () = &mut shutdown => {
                    info!(
                        dropped = pending - sent - 1,
                        "Shutdown requested while an event is in flight, closing HealthCheck watch"
                    );
                    return;
                }
                // Err only means the handle was dropped, which also ends the event
                _ = done => {}
            }
        }
    }
}
