//! HTTP Backend Implementation
//!
//! `ChatApi` and `ModelApi` over a model-serving REST backend.
//!
//! # Endpoints
//!
//! - `POST /api/chat/stream` - Incremental reply (NDJSON, or SSE `data:` lines)
//! - `POST /api/chat` - Complete reply as `{"message": "..."}`
//! - `GET /api/models` - Served models
//! - `GET /api/models/current` - Loaded model (404 when none)
//! - `GET /api/health` - Health report
//! - `POST /api/models/switch` - Load another model
//!
//! The stream body is read in a spawned task and forwarded over a bounded
//! channel. A line of `[DONE]` ends the stream; lines that do not parse as a
//! stream unit are skipped.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;

use super::traits::{
    ChatApi, ChatReply, ChatRequest, HealthStatus, ModelApi, ModelInfo, StreamingToken,
};
use crate::config::ConsoleConfig;
use crate::error::BackendError;
use crate::stream::StreamChunk;

/// Capacity of the channel between the body reader and the consumer
const STREAM_CHANNEL_CAPACITY: usize = 100;

/// HTTP backend client
#[derive(Clone)]
pub struct HttpBackend {
    /// Base URL without trailing slash
    base_url: String,
    /// HTTP client
    http_client: reqwest::Client,
}

impl HttpBackend {
    /// Create a new backend client
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            base_url,
            http_client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    /// Create from console configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &ConsoleConfig) -> Result<Self, BackendError> {
        Self::new(config.base_url.clone(), config.request_timeout)
    }

    /// Get the base URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Turn a non-success response into an error
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(BackendError::NotFound(body));
        }
        Err(BackendError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        let response = self.http_client.get(self.url(path)).send().await?;
        let bytes = Self::check(response).await?.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Interpret one line of a stream body
///
/// Accepts bare NDJSON and SSE framing. Returns `None` for blank lines,
/// SSE comments and lines that are not a stream unit.
pub(crate) fn parse_stream_line(line: &str) -> Option<StreamingToken> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return None;
    }

    let payload = line.strip_prefix("data:").map_or(line, str::trim_start);
    if payload == "[DONE]" {
        return Some(StreamingToken::Done);
    }

    match serde_json::from_str::<StreamChunk>(payload) {
        Ok(chunk) => Some(StreamingToken::Chunk(chunk)),
        Err(e) => {
            tracing::debug!(error = %e, line = %payload, "Skipping unparseable stream line");
            None
        }
    }
}

#[async_trait]
impl ChatApi for HttpBackend {
    async fn send_message_stream(
        &self,
        request: &ChatRequest,
    ) -> Result<mpsc::Receiver<StreamingToken>, BackendError> {
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);

        let response = self
            .http_client
            .post(self.url("/api/chat/stream"))
            .json(request)
            .send()
            .await?;
        let response = Self::check(response).await?;

        let mut stream = response.bytes_stream();

        tokio::spawn(async move {
            // Raw bytes; a multi-byte character may span two network chunks
            let mut buffer: Vec<u8> = Vec::new();

            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(bytes) => {
                        buffer.extend_from_slice(&bytes);

                        while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                            let line: Vec<u8> = buffer.drain(..=pos).collect();
                            let Some(token) = parse_stream_line(&String::from_utf8_lossy(&line))
                            else {
                                continue;
                            };
                            let done = token == StreamingToken::Done;
                            if tx.send(token).await.is_err() || done {
                                // Receiver dropped or backend finished
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(StreamingToken::Error(e.to_string())).await;
                        return;
                    }
                }
            }

            // Body ended without a trailing newline
            if let Some(token) = parse_stream_line(&String::from_utf8_lossy(&buffer)) {
                let _ = tx.send(token).await;
            }
        });

        Ok(rx)
    }

    async fn send_message(&self, request: &ChatRequest) -> Result<ChatReply, BackendError> {
        let response = self
            .http_client
            .post(self.url("/api/chat"))
            .json(request)
            .send()
            .await?;
        let bytes = Self::check(response).await?.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl ModelApi for HttpBackend {
    async fn get_models(&self) -> Result<Vec<ModelInfo>, BackendError> {
        self.get_json("/api/models").await
    }

    async fn get_current_model(&self) -> Result<ModelInfo, BackendError> {
        self.get_json("/api/models/current").await
    }

    async fn get_health(&self) -> Result<HealthStatus, BackendError> {
        self.get_json("/api/health").await
    }

    async fn switch_model(&self, name: &str) -> Result<(), BackendError> {
        let response = self
            .http_client
            .post(self.url("/api/models/switch"))
            .json(&serde_json::json!({ "model_name": name }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
