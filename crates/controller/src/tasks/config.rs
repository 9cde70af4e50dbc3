//! Controller Configuration
//!
//! Optional YAML configuration mounted into the controller pod. Every section
//! has defaults, so an absent file yields the stock `HealthCheck` behaviour.

use kube::api::ApiResource;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main controller configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ControllerConfig {
    /// Watched custom resource
    #[serde(default)]
    pub resource: ResourceConfig,

    /// Synthesized workload settings
    #[serde(default)]
    pub workload: WorkloadConfig,
}

/// Coordinates of the watched custom resource
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ResourceConfig {
    #[serde(default = "default_group")]
    pub group: String,

    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default = "default_kind")]
    pub kind: String,

    #[serde(default = "default_plural")]
    pub plural: String,

    /// Restrict the watch to one namespace (all namespaces when unset)
    #[serde(default)]
    pub namespace: Option<String>,
}

impl ResourceConfig {
    /// Build the dynamic API resource used for list and watch.
    #[must_use]
    pub fn api_resource(&self) -> ApiResource {
        ApiResource {
            group: self.group.clone(),
            version: self.version.clone(),
            api_version: format!("{}/{}", self.group, self.version),
            kind: self.kind.clone(),
            plural: self.plural.clone(),
        }
    }
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            group: default_group(),
            version: default_version(),
            kind: default_kind(),
            plural: default_plural(),
            namespace: None,
        }
    }
}

fn default_group() -> String {
    "example.com".to_string()
}

fn default_version() -> String {
    "v1".to_string()
}

fn default_kind() -> String {
    "HealthCheck".to_string()
}

fn default_plural() -> String {
    "healthchecks".to_string()
}

/// Image configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ImageConfig {
    /// Image repository (e.g., "docker.io/library/healthcheck-monitor")
    pub repository: String,

    /// Image tag (e.g., "latest")
    pub tag: String,
}

impl ImageConfig {
    /// Full image reference
    #[must_use]
    pub fn reference(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }

    /// Returns `true` when both repository and tag are populated.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.repository.trim().is_empty() && !self.tag.trim().is_empty()
    }
}

/// Workload synthesis settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct WorkloadConfig {
    #[serde(default = "default_image")]
    pub image: ImageConfig,

    #[serde(default = "default_pull_policy", rename = "imagePullPolicy")]
    pub image_pull_policy: String,

    #[serde(default = "default_container_name", rename = "containerName")]
    pub container_name: String,

    /// Where the mTLS secret is mounted inside the monitor container
    #[serde(default = "default_mtls_mount_path", rename = "mtlsMountPath")]
    pub mtls_mount_path: String,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            image: default_image(),
            image_pull_policy: default_pull_policy(),
            container_name: default_container_name(),
            mtls_mount_path: default_mtls_mount_path(),
        }
    }
}

fn default_image() -> ImageConfig {
    ImageConfig {
        repository: "docker.io/library/healthcheck-monitor".to_string(),
        tag: "latest".to_string(),
    }
}

fn default_pull_policy() -> String {
    "Never".to_string()
}

fn default_container_name() -> String {
    "healthcheck".to_string()
}

fn default_mtls_mount_path() -> String {
    "/etc/mtls".to_string()
}

impl ControllerConfig {
    /// Validate that configuration has required fields
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        let resource = &self.resource;
        if [&resource.group, &resource.version, &resource.kind, &resource.plural]
            .iter()
            .any(|value| value.trim().is_empty())
        {
            return Err(anyhow::anyhow!(
                "resource.group, resource.version, resource.kind and resource.plural must all be set"
            ));
        }

        if !self.workload.image.is_configured() {
            return Err(anyhow::anyhow!(
                "workload.image must specify both repository and tag"
            ));
        }

        if self.workload.container_name.trim().is_empty() {
            return Err(anyhow::anyhow!("workload.containerName must not be empty"));
        }

        if !Path::new(&self.workload.mtls_mount_path).is_absolute() {
            return Err(anyhow::anyhow!(
                "workload.mtlsMountPath must be an absolute path, got '{}'",
                self.workload.mtls_mount_path
            ));
        }

        Ok(())
    }

    /// Load configuration from mounted ConfigMap file
    pub fn from_mounted_file(config_path: &str) -> Result<Self, anyhow::Error> {
        let config_str = std::fs::read_to_string(config_path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {config_path}: {e}"))?;

        Self::from_yaml(&config_str)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml(config_str: &str) -> Result<Self, anyhow::Error> {
        // An empty mounted file deserializes as null
        if config_str.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse config YAML: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let yaml = r#"
resource:
  group: "monitoring.example.com"
  version: "v1beta1"
  namespace: "observability"

workload:
  image:
    repository: "ghcr.io/acme/monitor"
    tag: "v2.1.0"
  imagePullPolicy: "IfNotPresent"
"#;

        let config = ControllerConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.resource.group, "monitoring.example.com");
        assert_eq!(config.resource.kind, "HealthCheck");
        assert_eq!(config.resource.plural, "healthchecks");
        assert_eq!(config.resource.namespace.as_deref(), Some("observability"));
        assert_eq!(config.workload.image.reference(), "ghcr.io/acme/monitor:v2.1.0");
        assert_eq!(config.workload.image_pull_policy, "IfNotPresent");
        assert_eq!(config.workload.container_name, "healthcheck");
        assert_eq!(config.workload.mtls_mount_path, "/etc/mtls");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_config() {
        let config = ControllerConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.resource.namespace.is_none());
        assert_eq!(
            config.workload.image.reference(),
            "docker.io/library/healthcheck-monitor:latest"
        );
        assert_eq!(config.workload.image_pull_policy, "Never");

        let ar = config.resource.api_resource();
        assert_eq!(ar.api_version, "example.com/v1");
        assert_eq!(ar.plural, "healthchecks");
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = ControllerConfig::from_yaml("\n").unwrap();
        assert_eq!(config.workload, WorkloadConfig::default());
        assert_eq!(config.resource, ResourceConfig::default());
    }

    #[test]
    fn test_validation_rejects_relative_mount_path() {
        let mut config = ControllerConfig::default();
        config.workload.mtls_mount_path = "etc/mtls".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_missing_image_tag() {
        let yaml = r#"
workload:
  image:
    repository: "ghcr.io/acme/monitor"
    tag: ""
"#;
        let config = ControllerConfig::from_yaml(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_yaml_is_reported() {
        assert!(ControllerConfig::from_yaml("workload: [unclosed").is_err());
    }
}
