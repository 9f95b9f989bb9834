//! Request/response DTOs for the remote store REST API.

use rumbo_core::sync::RemoteRow;
use serde::{Deserialize, Serialize};

/// Error body returned by the API on non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Response of an incremental fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRowsResponse {
    #[serde(default)]
    pub rows: Vec<RemoteRow>,
}

/// Body of an upsert push.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertRequest {
    pub payload: serde_json::Value,
    pub client_timestamp: String,
}

/// Body of a tombstone push.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TombstoneRequest {
    pub client_timestamp: String,
}
