//! Control-plane gateway
//!
//! The reconciler only needs to create and delete workloads, so that is all
//! the [`WorkloadGateway`] trait exposes. [`KubeGateway`] implements it on top
//! of a `kube::Client` and also offers the startup listing of declared
//! `HealthCheck` resources.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use kube::api::{Api, ApiResource, DeleteParams, DynamicObject, ListParams, PostParams};
use kube::{Client, Error as KubeError};
use thiserror::Error;
use tracing::debug;

/// Failures of a single create or delete call
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("workload {namespace}/{name} already exists")]
    AlreadyExists { namespace: String, name: String },

    #[error("workload {namespace}/{name} not found")]
    NotFound { namespace: String, name: String },

    #[error("Kubernetes API error: {0}")]
    Api(#[from] KubeError),
}

impl GatewayError {
    fn classify(err: KubeError, namespace: &str, name: &str) -> Self {
        match err {
            KubeError::Api(ae) if ae.code == 409 => Self::AlreadyExists {
                namespace: namespace.to_string(),
                name: name.to_string(),
            },
            KubeError::Api(ae) if ae.code == 404 => Self::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            },
            other => Self::Api(other),
        }
    }
}

/// Create and delete operations the reconciler issues per event
#[async_trait]
pub trait WorkloadGateway: Send + Sync {
    /// Create `workload` as `namespace/name`. The name is the identity used
    /// for error reporting and must match the workload's metadata.
    async fn create_workload(
        &self,
        namespace: &str,
        name: &str,
        workload: &Deployment,
    ) -> Result<(), GatewayError>;

    async fn delete_workload(&self, namespace: &str, name: &str) -> Result<(), GatewayError>;
}

/// Gateway backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeGateway {
    client: Client,
}

impl KubeGateway {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// List declared resources, across all namespaces unless one is given.
    pub async fn list_health_checks(
        &self,
        api_resource: &ApiResource,
        namespace: Option<&str>,
    ) -> Result<Vec<DynamicObject>, GatewayError> {
        let api: Api<DynamicObject> = match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, api_resource),
            None => Api::all_with(self.client.clone(), api_resource),
        };
        let list = api.list(&ListParams::default()).await?;
        Ok(list.items)
    }
}

#[async_trait]
impl WorkloadGateway for KubeGateway {
    async fn create_workload(
        &self,
        namespace: &str,
        name: &str,
        workload: &Deployment,
    ) -> Result<(), GatewayError> {
        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);

        debug!(%namespace, %name, "Posting Deployment");
        deployments
            .create(&PostParams::default(), workload)
            .await
            .map(|_| ())
            .map_err(|e| GatewayError::classify(e, namespace, name))
    }

    async fn delete_workload(&self, namespace: &str, name: &str) -> Result<(), GatewayError> {
        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);

        debug!(%namespace, %name, "Deleting Deployment");
        deployments
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| GatewayError::classify(e, namespace, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;

    fn api_error(code: u16, reason: &str) -> KubeError {
        KubeError::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: format!("deployments.apps \"svc-a\" {reason}"),
            reason: reason.to_string(),
            code,
        })
    }

    #[test]
    fn test_conflict_is_already_exists() {
        let err = GatewayError::classify(api_error(409, "AlreadyExists"), "default", "svc-a");
        assert!(matches!(
            err,
            GatewayError::AlreadyExists { ref namespace, ref name }
                if namespace == "default" && name == "svc-a"
        ));
        assert_eq!(err.to_string(), "workload default/svc-a already exists");
    }

    #[test]
    fn test_missing_is_not_found() {
        let err = GatewayError::classify(api_error(404, "NotFound"), "default", "svc-a");
        assert!(matches!(err, GatewayError::NotFound { .. }));
    }

    #[test]
    fn test_other_errors_pass_through() {
        let err = GatewayError::classify(api_error(403, "Forbidden"), "default", "svc-a");
        assert!(matches!(err, GatewayError::Api(KubeError::Api(ref ae)) if ae.code == 403));
    }
}
