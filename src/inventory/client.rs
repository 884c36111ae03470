//! Service Client Contract
//!
//! The engine never authenticates, retries or pools connections; it only
//! asks a pre-authenticated [`ClientProvider`] for per-service clients.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by a service client call
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("Permission denied for {operation}: {message}")]
    PermissionDenied { operation: String, message: String },

    /// The operation needs parameters or does not apply; only that
    /// operation is skipped
    #[error("Invalid request for {operation}: {message}")]
    InvalidRequest { operation: String, message: String },

    #[error("Throttled on {operation}")]
    Throttled { operation: String },

    #[error("Malformed response from {operation}: {message}")]
    Malformed { operation: String, message: String },

    #[error("Transport error: {0}")]
    Transport(String),
}

impl ClientError {
    /// Whether the task may carry on with its other operations
    pub fn is_skippable(&self) -> bool {
        matches!(self, ClientError::InvalidRequest { .. })
    }
}

/// One service's API client, bound to a region
#[async_trait]
pub trait ServiceClient: Send + Sync {
    fn region(&self) -> &str;

    /// Invoke an operation; `params` is empty for listing calls
    async fn invoke(
        &self,
        operation: &str,
        params: &Map<String, Value>,
    ) -> Result<Value, ClientError>;

    /// Operation names this client exposes, empty if unknown
    fn operation_names(&self) -> Vec<String>;
}

/// Source of authenticated service clients
#[async_trait]
pub trait ClientProvider: Send + Sync {
    async fn client(
        &self,
        service_name: &str,
        region: &str,
    ) -> Result<Arc<dyn ServiceClient>, ClientError>;
}
