//! Remote gateway contract.
//!
//! The remote store is an external collaborator: it exposes row-level CRUD
//! per entity kind plus a server-assigned monotonic revision stamp. Errors
//! bubble up as values with retry-free, fail-fast semantics; retry policy
//! belongs to the scheduler, not the gateway.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::EntityKind;

/// Result type alias for gateway operations.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Retry policy class for gateway failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    Retryable,
    Permanent,
    ReauthRequired,
}

/// Errors surfaced by a remote gateway implementation.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Network or remote-store failure; the affected data stays where it was
    /// and the operation is retried on the next scheduled pass.
    #[error("transport error: {0}")]
    Transport(String),

    /// No current user/session. Terminal for the running pass: surface and
    /// stop, never loop.
    #[error("authentication error: {0}")]
    Auth(String),

    /// The remote returned a payload this client cannot decode.
    #[error("decode error: {0}")]
    Decode(String),
}

impl GatewayError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// Classify the error for retry policy.
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::Transport(_) => RetryClass::Retryable,
            Self::Auth(_) => RetryClass::ReauthRequired,
            Self::Decode(_) => RetryClass::Permanent,
        }
    }
}

/// One row as stored remotely: an opaque JSON payload plus sync metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRow {
    pub id: String,
    pub payload: serde_json::Value,
    /// Logical update timestamp stamped by the writing client.
    pub client_timestamp: String,
    /// Server-assigned monotonic revision.
    pub revision: i64,
    /// Soft-delete marker; a non-null value removes the id everywhere.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tombstoned_at: Option<String>,
}

impl RemoteRow {
    pub fn is_tombstone(&self) -> bool {
        self.tombstoned_at.is_some()
    }
}

/// Row-level CRUD against the remote store, per entity kind.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Fetch rows with revision strictly greater than `since` (all rows when
    /// `since` is `None`), ordered by revision ascending.
    async fn fetch_since(
        &self,
        kind: EntityKind,
        since: Option<i64>,
    ) -> GatewayResult<Vec<RemoteRow>>;

    /// Idempotent upsert by id.
    async fn upsert(
        &self,
        kind: EntityKind,
        id: &str,
        payload: serde_json::Value,
        client_timestamp: &str,
    ) -> GatewayResult<()>;

    /// Soft-delete by id. Must succeed even when the id never existed
    /// remotely, so a local create-then-delete still produces a tombstone.
    async fn tombstone(
        &self,
        kind: EntityKind,
        id: &str,
        client_timestamp: &str,
    ) -> GatewayResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_class_per_error_kind() {
        assert_eq!(
            GatewayError::transport("timeout").retry_class(),
            RetryClass::Retryable
        );
        assert_eq!(
            GatewayError::auth("no session").retry_class(),
            RetryClass::ReauthRequired
        );
        assert_eq!(
            GatewayError::decode("bad payload").retry_class(),
            RetryClass::Permanent
        );
    }
}
