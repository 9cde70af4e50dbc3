//! HealthCheck reconciler
//!
//! Consumes add/delete notifications one at a time, in delivery order, and
//! issues exactly one control-plane call per actionable event. Per-event
//! failures are logged and never stop the loop.

use super::extract::extract;
use super::gateway::{GatewayError, WorkloadGateway};
use super::types::{Error, ResourceKey};
use super::watch::{Delivery, WatchEvent};
use super::workload::WorkloadSynthesizer;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

/// What happened to a single event
#[derive(Debug)]
pub enum ReconcileOutcome {
    /// Workload created for the declared resource
    Created(ResourceKey),
    /// The document could not be turned into a workload; nothing was sent
    Rejected { key: Option<ResourceKey>, error: Error },
    /// The create call failed
    CreateFailed { key: ResourceKey, error: GatewayError },
    /// Workload deleted
    Deleted(ResourceKey),
    /// The delete call failed
    DeleteFailed { key: ResourceKey, error: GatewayError },
}

impl ReconcileOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Created(_) | Self::Deleted(_))
    }
}

/// Drives one workload per declared `HealthCheck`
pub struct Reconciler<G> {
    gateway: G,
    synthesizer: WorkloadSynthesizer,
}

impl<G: WorkloadGateway> Reconciler<G> {
    pub fn new(gateway: G, synthesizer: WorkloadSynthesizer) -> Self {
        Self {
            gateway,
            synthesizer,
        }
    }

    /// Process events until the sending side of the channel is dropped.
    ///
    /// Each delivery is marked complete only after its gateway call returns.
    /// Returns the number of events handled.
    #[instrument(skip_all)]
    pub async fn run(&self, mut events: mpsc::Receiver<Delivery>) -> usize {
        info!("HealthCheck reconciler started");
        let mut handled = 0;

        while let Some(delivery) = events.recv().await {
            let (event, done) = delivery.into_parts();
            let outcome = self.handle(event).await;
            debug!(?outcome, "Event handled");
            handled += 1;
            // The watch may already be gone after a shutdown
            let _ = done.send(());
        }

        info!(handled, "Event channel closed, reconciler stopping");
        handled
    }

    /// Handle a single event.
    pub async fn handle(&self, event: WatchEvent) -> ReconcileOutcome {
        match event {
            WatchEvent::Added(obj) => {
                let key = match ResourceKey::from_object(&obj) {
                    Ok(key) => key,
                    Err(error) => {
                        error!(error = %error, "Dropping added HealthCheck without identity");
                        return ReconcileOutcome::Rejected { key: None, error };
                    }
                };
                info!(resource = %key, "HealthCheck added");
                self.on_added(key, &obj.data).await
            }
            WatchEvent::Deleted(obj) => match ResourceKey::from_object(&obj) {
                Ok(key) => {
                    info!(resource = %key, "HealthCheck deleted");
                    self.on_deleted(key).await
                }
                Err(error) => {
                    error!(error = %error, "Dropping deleted HealthCheck without identity");
                    ReconcileOutcome::Rejected { key: None, error }
                }
            },
        }
    }

    #[instrument(skip_all, fields(namespace = %key.namespace, name = %key.name))]
    async fn on_added(&self, key: ResourceKey, document: &serde_json::Value) -> ReconcileOutcome {
        let spec = match extract(document) {
            Ok(spec) => spec,
            Err(e) => {
                error!(error = %e, "Failed to parse HealthCheck spec, no workload will be created");
                return ReconcileOutcome::Rejected {
                    key: Some(key),
                    error: e.into(),
                };
            }
        };

        debug!(
            endpoint = %spec.endpoint,
            interval_seconds = spec.interval_seconds,
            expected_status = spec.expected_status,
            mtls = spec.mtls().is_some(),
            oauth = spec.oauth().is_some(),
            "Extracted HealthCheck spec"
        );

        let workload = self.synthesizer.synthesize(&spec, &key.namespace, &key.name);

        info!("Creating monitor Deployment");
        match self
            .gateway
            .create_workload(&key.namespace, &key.name, &workload)
            .await
        {
            Ok(()) => {
                info!("Deployment created successfully");
                ReconcileOutcome::Created(key)
            }
            Err(error @ GatewayError::AlreadyExists { .. }) => {
                warn!(error = %error, "Deployment already exists, leaving it untouched");
                ReconcileOutcome::CreateFailed { key, error }
            }
            Err(error) => {
                error!(error = %error, "Error creating Deployment");
                ReconcileOutcome::CreateFailed { key, error }
            }
        }
    }

    #[instrument(skip_all, fields(namespace = %key.namespace, name = %key.name))]
    async fn on_deleted(&self, key: ResourceKey) -> ReconcileOutcome {
        info!("Deleting monitor Deployment");
        match self.gateway.delete_workload(&key.namespace, &key.name).await {
            Ok(()) => {
                info!("Deployment deleted successfully");
                ReconcileOutcome::Deleted(key)
            }
            Err(error @ GatewayError::NotFound { .. }) => {
                warn!(error = %error, "Deployment was already gone");
                ReconcileOutcome::DeleteFailed { key, error }
            }
            Err(error) => {
                error!(error = %error, "Error deleting Deployment");
                ReconcileOutcome::DeleteFailed { key, error }
            }
        }
    }
}
