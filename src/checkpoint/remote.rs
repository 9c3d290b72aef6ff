//! Remote key-value checkpoint store.
//!
//! Speaks a REST key-value dialect: `POST {base}/set/{key}?EX={ttl}` with the
//! serialized payload as the request body, and `GET {base}/get/{key}` which
//! answers `{"result": "<payload json>"}` or `{"result": null}`. Requests carry
//! a bearer token when one is configured.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::store::{CheckpointPayload, CheckpointStore, validate_checkpoint_id};
use crate::config::CheckpointConfig;
use crate::error::{Result, StreamError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct GetResponse {
    result: Option<String>,
}

/// Checkpoint store backed by a remote key-value service with TTL.
#[derive(Debug, Clone)]
pub struct RemoteCheckpointStore {
    base_url: String,
    token: Option<String>,
    ttl_secs: u64,
    key_prefix: String,
    client: reqwest::Client,
}

impl RemoteCheckpointStore {
    pub fn new(base_url: impl Into<String>, token: Option<String>, ttl_secs: u64) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            token,
            ttl_secs,
            key_prefix: "checkpoint:".to_owned(),
            client: reqwest::Client::new(),
        }
    }

    /// Build from the `[checkpoint]` config section.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Config`] when no `remote_url` is set.
    pub fn from_config(config: &CheckpointConfig) -> Result<Self> {
        let url = config
            .remote_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| StreamError::Config("remote checkpoint store needs remote_url".into()))?;
        Ok(Self::new(url, config.remote_token.clone(), config.ttl_secs)
            .with_key_prefix(config.key_prefix.clone()))
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    fn key(&self, id: &str) -> String {
        format!("{}{id}", self.key_prefix)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

fn map_http_error(op: &str, status: reqwest::StatusCode, body: &str) -> StreamError {
    let detail: String = if body.is_empty() {
        "no response body".to_owned()
    } else {
        body.chars().take(200).collect()
    };
    StreamError::Checkpoint(format!("{op} failed with HTTP {status}: {detail}"))
}

#[async_trait]
impl CheckpointStore for RemoteCheckpointStore {
    async fn save(&self, id: &str, payload: &CheckpointPayload) -> Result<()> {
        validate_checkpoint_id(id)?;
        let body = serde_json::to_string(payload)
            .map_err(|e| StreamError::Checkpoint(format!("failed to serialize checkpoint: {e}")))?;
        let url = format!("{}/set/{}", self.base_url, self.key(id));

        let response = self
            .authorize(self.client.post(&url))
            .query(&[("EX", self.ttl_secs)])
            .timeout(REQUEST_TIMEOUT)
            .body(body)
            .send()
            .await
            .map_err(|e| StreamError::Checkpoint(format!("set request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(map_http_error("set", status, &text));
        }
        tracing::debug!(checkpoint_id = id, ttl_secs = self.ttl_secs, "checkpoint stored remotely");
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<CheckpointPayload>> {
        validate_checkpoint_id(id)?;
        let url = format!("{}/get/{}", self.base_url, self.key(id));

        let response = self
            .authorize(self.client.get(&url))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| StreamError::Checkpoint(format!("get request failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(map_http_error("get", status, &text));
        }

        let body: GetResponse = response
            .json()
            .await
            .map_err(|e| StreamError::Checkpoint(format!("malformed get response: {e}")))?;
        match body.result {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw).map(Some).map_err(|e| {
                StreamError::Checkpoint(format!("failed to parse checkpoint {id}: {e}"))
            }),
        }
    }
}
