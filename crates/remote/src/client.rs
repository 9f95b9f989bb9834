//! REST client for the remote store.

use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;

use rumbo_core::sync::{EntityKind, GatewayResult, RemoteGateway, RemoteRow};

use crate::error::{RemoteError, Result};
use crate::types::{ApiErrorResponse, FetchRowsResponse, TombstoneRequest, UpsertRequest};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_LOG_BODY_CHARS: usize = 512;

/// HTTP gateway to the remote store.
///
/// One instance per authenticated session; the engine owns it behind the
/// `RemoteGateway` trait.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpGateway {
    /// Create a gateway against `base_url` with a bearer token.
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("API response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("API response error ({}): {}", status, preview);
    }

    /// Create headers for an API request.
    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let auth_value = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|_| RemoteError::auth("Invalid access token format"))?;
        headers.insert(AUTHORIZATION, auth_value);

        Ok(headers)
    }

    fn row_url(&self, kind: EntityKind, id: &str) -> String {
        format!(
            "{}/v1/rows/{}/{}",
            self.base_url,
            kind.as_str(),
            urlencoding::encode(id)
        )
    }

    fn kind_url(&self, kind: EntityKind) -> String {
        format!("{}/v1/rows/{}", self.base_url, kind.as_str())
    }

    /// Parse a JSON response body, mapping non-2xx statuses to API errors.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<ApiErrorResponse>(&body) {
                return Err(RemoteError::api(
                    status.as_u16(),
                    format!("{}: {}", error.code, error.message),
                ));
            }
            return Err(RemoteError::api(status.as_u16(), body));
        }

        Ok(serde_json::from_str(&body)?)
    }

    /// Check a response where the body carries no data of interest.
    async fn check_response(response: reqwest::Response) -> Result<()> {
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<ApiErrorResponse>(&body) {
                return Err(RemoteError::api(
                    status.as_u16(),
                    format!("{}: {}", error.code, error.message),
                ));
            }
            return Err(RemoteError::api(status.as_u16(), body));
        }
        Ok(())
    }

    async fn fetch_rows(
        &self,
        kind: EntityKind,
        since: Option<i64>,
    ) -> Result<Vec<RemoteRow>> {
        let mut request = self
            .client
            .get(self.kind_url(kind))
            .headers(self.headers()?);
        if let Some(since) = since {
            request = request.query(&[("since", since.to_string())]);
        }
        let response = request.send().await?;
        let body: FetchRowsResponse = Self::parse_response(response).await?;
        Ok(body.rows)
    }

    async fn put_row(
        &self,
        kind: EntityKind,
        id: &str,
        payload: serde_json::Value,
        client_timestamp: &str,
    ) -> Result<()> {
        let response = self
            .client
            .put(self.row_url(kind, id))
            .headers(self.headers()?)
            .json(&UpsertRequest {
                payload,
                client_timestamp: client_timestamp.to_string(),
            })
            .send()
            .await?;
        Self::check_response(response).await
    }

    async fn post_tombstone(
        &self,
        kind: EntityKind,
        id: &str,
        client_timestamp: &str,
    ) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/tombstone", self.row_url(kind, id)))
            .headers(self.headers()?)
            .json(&TombstoneRequest {
                client_timestamp: client_timestamp.to_string(),
            })
            .send()
            .await?;
        Self::check_response(response).await
    }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn fetch_since(
        &self,
        kind: EntityKind,
        since: Option<i64>,
    ) -> GatewayResult<Vec<RemoteRow>> {
        self.fetch_rows(kind, since).await.map_err(Into::into)
    }

    async fn upsert(
        &self,
        kind: EntityKind,
        id: &str,
        payload: serde_json::Value,
        client_timestamp: &str,
    ) -> GatewayResult<()> {
        self.put_row(kind, id, payload, client_timestamp)
            .await
            .map_err(Into::into)
    }

    async fn tombstone(
        &self,
        kind: EntityKind,
        id: &str,
        client_timestamp: &str,
    ) -> GatewayResult<()> {
        self.post_tombstone(kind, id, client_timestamp)
            .await
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_kind_scoped_and_ids_are_encoded() {
        let gateway = HttpGateway::new("https://sync.rumbo.app/", "token").unwrap();
        assert_eq!(
            gateway.kind_url(EntityKind::ForecastLine),
            "https://sync.rumbo.app/v1/rows/forecast_line"
        );
        assert_eq!(
            gateway.row_url(EntityKind::Task, "id with spaces"),
            "https://sync.rumbo.app/v1/rows/task/id%20with%20spaces"
        );
    }

    #[test]
    fn headers_carry_bearer_token() {
        let gateway = HttpGateway::new("https://sync.rumbo.app", "secreto").unwrap();
        let headers = gateway.headers().unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer secreto");
        assert_eq!(headers[CONTENT_TYPE], "application/json");
    }
}
