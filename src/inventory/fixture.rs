//! Recorded-response client provider
//!
//! Replays API responses captured to a JSON file. Used by the
//! `inventory-replay` binary and as the client double in tests.
//!
//! ```json
//! {
//!   "services": {
//!     "ec2": {
//!       "responses": {
//!         "describe_instances": { "Reservations": [] },
//!         "describe_vpcs": { "$delay_ms": 30000 },
//!         "describe_volumes": { "$error": "permission_denied" }
//!       },
//!       "regions": { "eu-west-1": { "describe_instances": { "Reservations": [] } } }
//!     }
//!   }
//! }
//! ```
//!
//! A response keyed `operation:value` answers calls whose first parameter
//! equals `value` (e.g. `get_bucket_location:logs`).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::client::{ClientError, ClientProvider, ServiceClient};

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("Failed to read fixture file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse fixture file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failure a recorded call should produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureFailure {
    PermissionDenied,
    InvalidRequest,
    Throttled,
    Malformed,
    Transport,
}

/// Scripted behaviour: optional delay, then an error or a body
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptedResponse {
    #[serde(rename = "$delay_ms", default)]
    pub delay_ms: u64,
    #[serde(rename = "$error", default)]
    pub error: Option<FixtureFailure>,
    #[serde(rename = "$body", default)]
    pub body: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FixtureResponse {
    Scripted(ScriptedResponse),
    Body(Value),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FixtureService {
    /// Advertised operation names; defaults to the recorded operations
    #[serde(default)]
    pub operations: Option<Vec<String>>,
    #[serde(default)]
    pub responses: BTreeMap<String, FixtureResponse>,
    /// Per-region overrides of `responses`
    #[serde(default)]
    pub regions: BTreeMap<String, BTreeMap<String, FixtureResponse>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FixtureFile {
    #[serde(default)]
    services: HashMap<String, FixtureService>,
}

/// [`ClientProvider`] backed by recorded responses
#[derive(Debug, Clone, Default)]
pub struct FixtureClientProvider {
    services: Arc<HashMap<String, FixtureService>>,
}

impl FixtureClientProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, FixtureError> {
        let file: FixtureFile = serde_json::from_str(json)?;
        Ok(Self {
            services: Arc::new(file.services),
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Add or replace one service's recordings
    pub fn with_service(mut self, name: &str, service: FixtureService) -> Self {
        Arc::make_mut(&mut self.services).insert(name.to_string(), service);
        self
    }

    /// Services with recordings, sorted
    pub fn service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl ClientProvider for FixtureClientProvider {
    async fn client(
        &self,
        service_name: &str,
        region: &str,
    ) -> Result<Arc<dyn ServiceClient>, ClientError> {
        let service = self.services.get(service_name).ok_or_else(|| {
            ClientError::Transport(format!("no recorded client for {}", service_name))
        })?;

        let mut responses = service.responses.clone();
        if let Some(overrides) = service.regions.get(region) {
            responses.extend(overrides.clone());
        }

        let operations = match &service.operations {
            Some(ops) => ops.clone(),
            None => responses
                .keys()
                .filter(|k| !k.contains(':'))
                .cloned()
                .collect(),
        };

        Ok(Arc::new(FixtureClient {
            region: region.to_string(),
            operations,
            responses,
        }))
    }
}

struct FixtureClient {
    region: String,
    operations: Vec<String>,
    responses: BTreeMap<String, FixtureResponse>,
}

impl FixtureClient {
    fn recorded(&self, operation: &str, params: &Map<String, Value>) -> Option<&FixtureResponse> {
        let keyed = params
            .values()
            .next()
            .and_then(Value::as_str)
            .and_then(|v| self.responses.get(&format!("{}:{}", operation, v)));

        keyed.or_else(|| self.responses.get(operation))
    }
}

#[async_trait]
impl ServiceClient for FixtureClient {
    fn region(&self) -> &str {
        &self.region
    }

    async fn invoke(
        &self,
        operation: &str,
        params: &Map<String, Value>,
    ) -> Result<Value, ClientError> {
        let response = self.recorded(operation, params).ok_or_else(|| {
            ClientError::InvalidRequest {
                operation: operation.to_string(),
                message: "no recorded response".to_string(),
            }
        })?;

        let scripted = match response {
            FixtureResponse::Body(body) => return Ok(body.clone()),
            FixtureResponse::Scripted(s) => s,
        };

        if scripted.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(scripted.delay_ms)).await;
        }

        let op = operation.to_string();
        match scripted.error {
            Some(FixtureFailure::PermissionDenied) => Err(ClientError::PermissionDenied {
                operation: op,
                message: "AccessDenied (recorded)".to_string(),
            }),
            Some(FixtureFailure::InvalidRequest) => Err(ClientError::InvalidRequest {
                operation: op,
                message: "ValidationError (recorded)".to_string(),
            }),
            Some(FixtureFailure::Throttled) => Err(ClientError::Throttled { operation: op }),
            Some(FixtureFailure::Malformed) => Err(ClientError::Malformed {
                operation: op,
                message: "unparseable body (recorded)".to_string(),
            }),
            Some(FixtureFailure::Transport) => {
                Err(ClientError::Transport(format!("{} connection reset (recorded)", op)))
            }
            None => Ok(scripted
                .body
                .clone()
                .unwrap_or_else(|| Value::Object(Map::new()))),
        }
    }

    fn operation_names(&self) -> Vec<String> {
        self.operations.clone()
    }
}
