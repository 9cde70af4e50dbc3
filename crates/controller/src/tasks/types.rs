//! Shared error and result types for the `HealthCheck` controller.

use super::extract::ExtractionError;
use thiserror::Error;

/// Controller-level errors
#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to connect to the Kubernetes API")]
    Connection(#[source] kube::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Watched object is missing a name or namespace")]
    MissingObjectKey,

    #[error("Invalid HealthCheck spec: {0}")]
    Extraction(#[from] ExtractionError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Identity of a watched `HealthCheck` and of the workload derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    pub namespace: String,
    pub name: String,
}

impl ResourceKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Read the key from an object's metadata.
    ///
    /// Both the name and the namespace must be set; cluster-scoped or
    /// unnamed objects cannot own a namespaced workload.
    pub fn from_object<K: kube::Resource>(obj: &K) -> Result<Self> {
        let meta = obj.meta();
        match (meta.namespace.as_deref(), meta.name.as_deref()) {
            (Some(namespace), Some(name)) if !namespace.is_empty() && !name.is_empty() => {
                Ok(Self::new(namespace, name))
            }
            _ => Err(Error::MissingObjectKey),
        }
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
