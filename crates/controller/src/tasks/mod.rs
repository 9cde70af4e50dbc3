use kube::{Client, ResourceExt};
use std::future::Future;
use tokio::sync::mpsc;
use tracing::{error, info, instrument};

pub mod config;
pub mod extract;
pub mod gateway;
pub mod reconciler;
pub mod types;
pub mod watch;
pub mod workload;

// Re-export commonly used items
pub use config::ControllerConfig;
pub use extract::{extract, ExtractionError};
pub use gateway::{GatewayError, KubeGateway, WorkloadGateway};
pub use reconciler::{ReconcileOutcome, Reconciler};
pub use types::{Error, ResourceKey, Result};
pub use watch::{Delivery, EventTracker, WatchEvent};
pub use workload::{synthesize, WorkloadSynthesizer};

/// Hand-off slot between the watch and the reconciler. The watch waits for
/// each delivery to be handled before sending the next, so the slot is only
/// occupied while the reconciler is idle.
const EVENT_CHANNEL_CAPACITY: usize = 1;

/// Main entry point for the `HealthCheck` controller.
///
/// Runs until `shutdown` resolves; the event being handled at that moment is
/// finished before returning.
#[instrument(skip_all, fields(kind = %config.resource.kind))]
pub async fn run_health_check_controller<F>(
    client: Client,
    config: ControllerConfig,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    config
        .validate()
        .map_err(|e| Error::ConfigError(e.to_string()))?;

    let api_resource = config.resource.api_resource();
    let namespace = config.resource.namespace.clone();
    let gateway = KubeGateway::new(client.clone());

    // Startup visibility: list existing HealthChecks so we can see what the watch will replay
    match gateway
        .list_health_checks(&api_resource, namespace.as_deref())
        .await
    {
        Ok(items) => {
            info!(
                "Controller startup: found {} {}(s) in {}",
                items.len(),
                api_resource.kind,
                namespace.as_deref().unwrap_or("all namespaces")
            );
            for hc in &items {
                info!(
                    "Existing {}: {}/{}",
                    api_resource.kind,
                    hc.namespace().unwrap_or_default(),
                    hc.name_any()
                );
            }
        }
        Err(e) => {
            error!("Failed to list {}s at startup: {}", api_resource.kind, e);
        }
    }

    let (sender, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let stream = watch::health_check_stream(client, &api_resource, namespace.as_deref());
    let watch_handle = tokio::spawn(watch::forward_events(stream, sender, shutdown));

    let reconciler = Reconciler::new(gateway, WorkloadSynthesizer::new(config.workload));
    let handled = reconciler.run(receiver).await;

    if let Err(e) = watch_handle.await {
        error!("Watch task join error: {:?}", e);
    }

    info!(handled, "HealthCheck controller shutting down");
    Ok(())
}
