//! Workload synthesis
//!
//! Maps a validated [`HealthCheckSpec`] onto the Deployment that runs the
//! monitor. Synthesis is pure: the same spec and identity always produce the
//! same object, with no timestamps, generated names or owner UIDs.

use crate::crds::HealthCheckSpec;
use crate::tasks::config::WorkloadConfig;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, EnvVar, PodSpec, PodTemplateSpec, SecretVolumeSource, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use std::collections::BTreeMap;

pub const ENV_ENDPOINT: &str = "HEALTH_ENDPOINT";
pub const ENV_INTERVAL: &str = "HEALTH_INTERVAL";
pub const ENV_EXPECTED_STATUS: &str = "HEALTH_EXPECTEDSTATUS";
pub const ENV_MTLS_CERTS_PATH: &str = "MTLS_CERTS_PATH";
pub const ENV_OAUTH_CLIENT_ID: &str = "OAUTH_CLIENT_ID";
pub const ENV_OAUTH_CLIENT_SECRET: &str = "OAUTH_CLIENT_SECRET";
pub const ENV_OAUTH_TOKEN_URL: &str = "OAUTH_TOKEN_URL";

pub const MTLS_VOLUME_NAME: &str = "mtls-certs";
pub const APP_LABEL: &str = "app";

/// Builds monitor Deployments from `HealthCheck` specs
#[derive(Debug, Clone, Default)]
pub struct WorkloadSynthesizer {
    config: WorkloadConfig,
}

impl WorkloadSynthesizer {
    #[must_use]
    pub fn new(config: WorkloadConfig) -> Self {
        Self { config }
    }

    /// Synthesize the Deployment for `namespace/name`.
    ///
    /// The identity always comes from the watched object, never from the spec.
    #[must_use]
    pub fn synthesize(&self, spec: &HealthCheckSpec, namespace: &str, name: &str) -> Deployment {
        let labels = BTreeMap::from([(APP_LABEL.to_string(), name.to_string())]);

        let mut env = vec![
            env_var(ENV_ENDPOINT, &spec.endpoint),
            env_var(ENV_INTERVAL, &spec.interval_seconds.to_string()),
            env_var(ENV_EXPECTED_STATUS, &spec.expected_status.to_string()),
        ];
        let mut volumes = Vec::new();
        let mut volume_mounts = Vec::new();

        if let Some(mtls) = spec.mtls() {
            volumes.push(Volume {
                name: MTLS_VOLUME_NAME.to_string(),
                secret: Some(SecretVolumeSource {
                    secret_name: Some(mtls.secret_name.clone()),
                    ..Default::default()
                }),
                ..Default::default()
            });
            volume_mounts.push(VolumeMount {
                name: MTLS_VOLUME_NAME.to_string(),
                mount_path: self.config.mtls_mount_path.clone(),
                read_only: Some(true),
                ..Default::default()
            });
            env.push(env_var(ENV_MTLS_CERTS_PATH, &self.config.mtls_mount_path));
        }

        // Plaintext on purpose: the monitor image reads these directly.
        if let Some(oauth) = spec.oauth() {
            env.extend([
                env_var(ENV_OAUTH_CLIENT_ID, &oauth.client_id),
                env_var(ENV_OAUTH_CLIENT_SECRET, &oauth.client_secret),
                env_var(ENV_OAUTH_TOKEN_URL, &oauth.token_url),
            ]);
        }

        let container = Container {
            name: self.config.container_name.clone(),
            image: Some(self.config.image.reference()),
            image_pull_policy: Some(self.config.image_pull_policy.clone()),
            env: Some(env),
            volume_mounts: non_empty(volume_mounts),
            ..Default::default()
        };

        Deployment {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                replicas: Some(1),
                selector: LabelSelector {
                    match_labels: Some(labels.clone()),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        containers: vec![container],
                        volumes: non_empty(volumes),
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

/// Synthesize with the stock image and mount path.
#[must_use]
pub fn synthesize(spec: &HealthCheckSpec, namespace: &str, name: &str) -> Deployment {
    WorkloadSynthesizer::default().synthesize(spec, namespace, name)
}

fn env_var(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        value_from: None,
    }
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    (!items.is_empty()).then_some(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crds::{AuthSpec, MtlsAuth, OAuthAuth};
    use crate::tasks::config::ImageConfig;

    fn base_spec() -> HealthCheckSpec {
        HealthCheckSpec {
            endpoint: "http://x/health".to_string(),
            interval_seconds: 30,
            expected_status: 200,
            auth: None,
        }
    }

    fn full_oauth() -> OAuthAuth {
        OAuthAuth {
            client_id: "client".to_string(),
            client_secret: "s3cr3t".to_string(),
            token_url: "https://idp.example.com/token".to_string(),
        }
    }

    fn container(deployment: &Deployment) -> &Container {
        &deployment.spec.as_ref().unwrap().template.spec.as_ref().unwrap().containers[0]
    }

    fn pod_spec(deployment: &Deployment) -> &PodSpec {
        deployment.spec.as_ref().unwrap().template.spec.as_ref().unwrap()
    }

    fn env_pairs(deployment: &Deployment) -> Vec<(String, String)> {
        container(deployment)
            .env
            .as_ref()
            .unwrap()
            .iter()
            .map(|e| (e.name.clone(), e.value.clone().unwrap_or_default()))
            .collect()
    }

    #[test]
    fn test_baseline_deployment() {
        let deployment = synthesize(&base_spec(), "default", "svc-a");

        assert_eq!(deployment.metadata.name.as_deref(), Some("svc-a"));
        assert_eq!(deployment.metadata.namespace.as_deref(), Some("default"));

        let spec = deployment.spec.as_ref().unwrap();
        assert_eq!(spec.replicas, Some(1));
        let expected = BTreeMap::from([("app".to_string(), "svc-a".to_string())]);
        assert_eq!(spec.selector.match_labels.as_ref(), Some(&expected));
        assert_eq!(
            spec.template.metadata.as_ref().unwrap().labels.as_ref(),
            Some(&expected)
        );

        let container = container(&deployment);
        assert_eq!(container.name, "healthcheck");
        assert_eq!(
            container.image.as_deref(),
            Some("docker.io/library/healthcheck-monitor:latest")
        );
        assert_eq!(container.image_pull_policy.as_deref(), Some("Never"));
        assert!(container.volume_mounts.is_none());
        assert!(pod_spec(&deployment).volumes.is_none());

        assert_eq!(
            env_pairs(&deployment),
            vec![
                ("HEALTH_ENDPOINT".to_string(), "http://x/health".to_string()),
                ("HEALTH_INTERVAL".to_string(), "30".to_string()),
                ("HEALTH_EXPECTEDSTATUS".to_string(), "200".to_string()),
            ]
        );
    }

    #[test]
    fn test_synthesis_is_deterministic() {
        let mut spec = base_spec();
        spec.auth = Some(AuthSpec {
            mtls: MtlsAuth {
                secret_name: "certs".to_string(),
            },
            oauth: full_oauth(),
        });

        let first = serde_json::to_vec(&synthesize(&spec, "ns", "svc")).unwrap();
        let second = serde_json::to_vec(&synthesize(&spec, "ns", "svc")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_mtls_mounts_secret_read_only() {
        let mut spec = base_spec();
        spec.auth = Some(AuthSpec {
            mtls: MtlsAuth {
                secret_name: "svc-a-certs".to_string(),
            },
            oauth: OAuthAuth::default(),
        });

        let deployment = synthesize(&spec, "default", "svc-a");

        let volumes = pod_spec(&deployment).volumes.as_ref().unwrap();
        assert_eq!(volumes.len(), 1);
        assert_eq!(volumes[0].name, "mtls-certs");
        assert_eq!(
            volumes[0].secret.as_ref().unwrap().secret_name.as_deref(),
            Some("svc-a-certs")
        );

        let mounts = container(&deployment).volume_mounts.as_ref().unwrap();
        assert_eq!(mounts.len(), 1);
        assert_eq!(mounts[0].name, "mtls-certs");
        assert_eq!(mounts[0].mount_path, "/etc/mtls");
        assert_eq!(mounts[0].read_only, Some(true));

        let env = env_pairs(&deployment);
        assert_eq!(env.len(), 4);
        assert_eq!(
            env[3],
            ("MTLS_CERTS_PATH".to_string(), "/etc/mtls".to_string())
        );
    }

    #[test]
    fn test_oauth_injects_three_variables() {
        let mut spec = base_spec();
        spec.auth = Some(AuthSpec {
            mtls: MtlsAuth::default(),
            oauth: full_oauth(),
        });

        let deployment = synthesize(&spec, "default", "svc-a");
        let env = env_pairs(&deployment);
        assert_eq!(env.len(), 6);
        assert_eq!(
            &env[3..],
            &[
                ("OAUTH_CLIENT_ID".to_string(), "client".to_string()),
                ("OAUTH_CLIENT_SECRET".to_string(), "s3cr3t".to_string()),
                (
                    "OAUTH_TOKEN_URL".to_string(),
                    "https://idp.example.com/token".to_string()
                ),
            ]
        );
        assert!(pod_spec(&deployment).volumes.is_none());
    }

    #[test]
    fn test_partial_oauth_injects_nothing() {
        for blank in 0..3 {
            let mut oauth = full_oauth();
            match blank {
                0 => oauth.client_id.clear(),
                1 => oauth.client_secret.clear(),
                _ => oauth.token_url.clear(),
            }
            let mut spec = base_spec();
            spec.auth = Some(AuthSpec {
                mtls: MtlsAuth::default(),
                oauth,
            });

            let env = env_pairs(&synthesize(&spec, "default", "svc-a"));
            assert_eq!(env.len(), 3);
            assert!(env.iter().all(|(name, _)| !name.starts_with("OAUTH_")));
        }
    }

    #[test]
    fn test_mtls_and_oauth_together() {
        let mut spec = base_spec();
        spec.auth = Some(AuthSpec {
            mtls: MtlsAuth {
                secret_name: "certs".to_string(),
            },
            oauth: full_oauth(),
        });

        let env = env_pairs(&synthesize(&spec, "default", "svc-a"));
        let names: Vec<&str> = env.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "HEALTH_ENDPOINT",
                "HEALTH_INTERVAL",
                "HEALTH_EXPECTEDSTATUS",
                "MTLS_CERTS_PATH",
                "OAUTH_CLIENT_ID",
                "OAUTH_CLIENT_SECRET",
                "OAUTH_TOKEN_URL",
            ]
        );
    }

    #[test]
    fn test_configured_image_and_mount_path() {
        let synthesizer = WorkloadSynthesizer::new(WorkloadConfig {
            image: ImageConfig {
                repository: "ghcr.io/acme/monitor".to_string(),
                tag: "v2".to_string(),
            },
            image_pull_policy: "IfNotPresent".to_string(),
            container_name: "monitor".to_string(),
            mtls_mount_path: "/var/run/mtls".to_string(),
        });
        let mut spec = base_spec();
        spec.auth = Some(AuthSpec {
            mtls: MtlsAuth {
                secret_name: "certs".to_string(),
            },
            oauth: OAuthAuth::default(),
        });

        let deployment = synthesizer.synthesize(&spec, "default", "svc-a");
        let container = container(&deployment);
        assert_eq!(container.name, "monitor");
        assert_eq!(container.image.as_deref(), Some("ghcr.io/acme/monitor:v2"));
        assert_eq!(
            container.volume_mounts.as_ref().unwrap()[0].mount_path,
            "/var/run/mtls"
        );
        assert!(env_pairs(&deployment)
            .contains(&("MTLS_CERTS_PATH".to_string(), "/var/run/mtls".to_string())));
    }
}
