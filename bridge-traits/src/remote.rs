//! Remote Backend Abstraction
//!
//! The single contract the sync layer holds against the remote service:
//! apply one mutation. The concrete client (REST, RPC) is supplied by the
//! host application and stays out of the core.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Mutation kind carried by a queue item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    /// Wire/database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl std::str::FromStr for Operation {
    type Err = RemoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            _ => Err(RemoteError::InvalidOperation(s.to_string())),
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by the remote collaborator
#[derive(Error, Debug)]
pub enum RemoteError {
    /// The service was reached but rejected the mutation
    #[error("Remote rejected {operation} on {collection}: {message}")]
    Rejected {
        collection: String,
        operation: Operation,
        message: String,
    },

    /// The service could not be reached at all
    #[error("Remote transport error: {0}")]
    Transport(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

/// "Apply one mutation" contract of the remote service
///
/// Delivery is at-least-once; implementations are expected to treat `Create`
/// as an idempotent upsert so redelivery after a crash is harmless.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::remote::{Operation, RemoteBackend};
///
/// async fn push(remote: &dyn RemoteBackend) -> Result<(), bridge_traits::RemoteError> {
///     remote
///         .apply("sales", Operation::Create, &serde_json::json!({"id": "s1"}))
///         .await
/// }
/// ```
#[async_trait::async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Apply a single mutation to the remote service.
    ///
    /// `Create` maps to an insert/upsert, `Update` to an update-by-id,
    /// `Delete` to a delete-by-id.
    async fn apply(
        &self,
        collection: &str,
        operation: Operation,
        payload: &Value,
    ) -> Result<(), RemoteError>;
}
