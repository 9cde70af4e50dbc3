//! Spec extraction
//!
//! Turns the schemaless body of a watched `HealthCheck` document into a
//! validated [`HealthCheckSpec`]. Top-level fields are mandatory and strictly
//! typed; the nested `auth` block is best-effort and never fails extraction.

use crate::crds::{AuthSpec, HealthCheckSpec, MtlsAuth, OAuthAuth};
use serde_json::{Map, Value};
use thiserror::Error;

/// Reasons a declared resource cannot be turned into a spec
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("spec field is missing or not a map")]
    MissingSpec,

    #[error("field '{0}' is missing or has the wrong type")]
    InvalidField(&'static str),
}

/// Extract a [`HealthCheckSpec`] from an untyped resource document.
///
/// Only JSON integers representable as `i64` are accepted for the numeric
/// fields; `30.0` and `"30"` are rejected rather than coerced.
pub fn extract(document: &Value) -> Result<HealthCheckSpec, ExtractionError> {
    let spec = document
        .get("spec")
        .and_then(Value::as_object)
        .ok_or(ExtractionError::MissingSpec)?;

    let endpoint = required_str(spec, "endpoint")?;
    let interval_seconds = required_i64(spec, "intervalSeconds")?;
    let expected_status = required_i64(spec, "expectedStatus")?;

    let auth = spec.get("auth").and_then(Value::as_object).map(extract_auth);

    Ok(HealthCheckSpec {
        endpoint,
        interval_seconds,
        expected_status,
        auth,
    })
}

fn required_str(spec: &Map<String, Value>, field: &'static str) -> Result<String, ExtractionError> {
    spec.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or(ExtractionError::InvalidField(field))
}

fn required_i64(spec: &Map<String, Value>, field: &'static str) -> Result<i64, ExtractionError> {
    spec.get(field)
        .and_then(Value::as_i64)
        .ok_or(ExtractionError::InvalidField(field))
}

fn extract_auth(auth: &Map<String, Value>) -> AuthSpec {
    let section = |name: &str| auth.get(name).and_then(Value::as_object);

    let mtls = section("mtls")
        .map(|m| MtlsAuth {
            secret_name: optional_str(m, "secretName"),
        })
        .unwrap_or_default();

    let oauth = section("oauth")
        .map(|o| OAuthAuth {
            client_id: optional_str(o, "clientId"),
            client_secret: optional_str(o, "clientSecret"),
            token_url: optional_str(o, "tokenUrl"),
        })
        .unwrap_or_default();

    AuthSpec { mtls, oauth }
}

fn optional_str(map: &Map<String, Value>, field: &str) -> String {
    map.get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
