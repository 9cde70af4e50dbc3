//! `HealthCheck` Custom Resource Definition for declared endpoint monitors

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Mutual-TLS material mounted into the monitor
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct MtlsAuth {
    /// Name of the Secret holding the client certificate bundle
    #[serde(default, rename = "secretName")]
    pub secret_name: String,
}

impl MtlsAuth {
    /// mTLS is active whenever a secret name is given.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.secret_name.is_empty()
    }
}

/// OAuth client-credential material injected into the monitor
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct OAuthAuth {
    #[serde(default, rename = "clientId")]
    pub client_id: String,

    #[serde(default, rename = "clientSecret")]
    pub client_secret: String,

    #[serde(default, rename = "tokenUrl")]
    pub token_url: String,
}

impl OAuthAuth {
    /// OAuth is active only when all three fields are populated.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty() && !self.token_url.is_empty()
    }
}

/// Authentication modes for the monitored endpoint.
///
/// Both modes are independent and may be active at the same time.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct AuthSpec {
    #[serde(default)]
    pub mtls: MtlsAuth,

    #[serde(default)]
    pub oauth: OAuthAuth,
}

/// `HealthCheck` CRD describing an endpoint to poll
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[kube(group = "example.com", version = "v1", kind = "HealthCheck")]
#[kube(namespaced)]
#[kube(printcolumn = r#"{"name":"Endpoint","type":"string","jsonPath":".spec.endpoint"}"#)]
#[kube(printcolumn = r#"{"name":"Interval","type":"integer","jsonPath":".spec.intervalSeconds"}"#)]
#[kube(printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#)]
pub struct HealthCheckSpec {
    /// URL polled by the monitor
    pub endpoint: String,

    /// Polling period in seconds
    #[serde(rename = "intervalSeconds")]
    pub interval_seconds: i64,

    /// HTTP status code considered healthy
    #[serde(rename = "expectedStatus")]
    pub expected_status: i64,

    /// Optional authentication material
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthSpec>,
}

impl HealthCheckSpec {
    /// Active mTLS settings, if any.
    #[must_use]
    pub fn mtls(&self) -> Option<&MtlsAuth> {
        self.auth.as_ref().map(|a| &a.mtls).filter(|m| m.is_active())
    }

    /// Active OAuth settings, if any.
    #[must_use]
    pub fn oauth(&self) -> Option<&OAuthAuth> {
        self.auth.as_ref().map(|a| &a.oauth).filter(|o| o.is_active())
    }
}
