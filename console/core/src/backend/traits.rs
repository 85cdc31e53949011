//! Collaborator Traits
//!
//! The console never talks to a model server directly. Chat completion and
//! model management are provided by two collaborators, each behind a trait,
//! so the console core can be driven by an HTTP client, an in-process engine,
//! or a test double without changing its logic.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::BackendError;
use crate::messages::MessageRole;
use crate::stream::StreamChunk;

/// Events delivered on an incremental reply channel
///
/// The channel closing without `Done` is also a normal end of stream.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamingToken {
    /// A unit of the reply
    Chunk(StreamChunk),
    /// Backend signalled the end of the reply
    Done,
    /// Stream failed; nothing further will arrive
    Error(String),
}

/// One entry of the message history sent to the chat collaborator
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    /// `"user"` or `"assistant"`
    pub role: MessageRole,
    /// Message text
    pub content: String,
}

impl HistoryMessage {
    /// Create a history entry
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Sampling options for a reply
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Caps reply length
    pub max_tokens: u32,
    /// Sampling randomness (0.0-1.0)
    pub temperature: f32,
    /// Nucleus-sampling mass (0.0-1.0)
    pub top_p: f32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: 1000,
            temperature: 0.7,
            top_p: 0.9,
        }
    }
}

impl GenerationOptions {
    /// Set max tokens
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 1.0);
        self
    }

    /// Set nucleus-sampling mass
    #[must_use]
    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = top_p.clamp(0.0, 1.0);
        self
    }
}

/// A chat request: full history plus options
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Ordered history, ending with the new user message
    pub messages: Vec<HistoryMessage>,
    /// Sampling options
    #[serde(flatten)]
    pub options: GenerationOptions,
}

impl ChatRequest {
    /// Create a request with default options
    pub fn new(messages: Vec<HistoryMessage>) -> Self {
        Self {
            messages,
            options: GenerationOptions::default(),
        }
    }

    /// Set generation options
    #[must_use]
    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }
}

/// Non-streaming reply
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    /// Reply text
    #[serde(default)]
    pub message: String,
}

/// Information about a served model
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier
    pub name: String,
    /// Human-readable description
    #[serde(default)]
    pub description: Option<String>,
    /// Model family or task type
    #[serde(default, rename = "type")]
    pub model_type: Option<String>,
    /// Backend-reported status string
    #[serde(default)]
    pub status: Option<String>,
    /// Whether the model is loaded/ready
    #[serde(default)]
    pub loaded: bool,
}

impl ModelInfo {
    /// Create a model entry with just a name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            model_type: None,
            status: None,
            loaded: false,
        }
    }
}

/// Coarse health verdict
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// Backend reports itself healthy
    Healthy,
    /// Backend reports a problem
    Unhealthy,
    /// Backend reported something else
    #[serde(other)]
    Unknown,
}

/// Health report from the model collaborator
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Verdict
    pub status: HealthState,
    /// Any extra fields the backend reports
    #[serde(flatten)]
    pub details: BTreeMap<String, serde_json::Value>,
}

impl HealthStatus {
    /// Report with no extra details
    #[must_use]
    pub fn new(status: HealthState) -> Self {
        Self {
            status,
            details: BTreeMap::new(),
        }
    }

    /// Whether the verdict is healthy
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.status == HealthState::Healthy
    }
}

/// Chat completion collaborator
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Open an incremental reply stream
    ///
    /// Returns a channel receiver that yields units as they arrive. An `Err`
    /// here means the stream could not be opened at all.
    async fn send_message_stream(
        &self,
        request: &ChatRequest,
    ) -> Result<mpsc::Receiver<StreamingToken>, BackendError>;

    /// Send a request and wait for the complete reply
    async fn send_message(&self, request: &ChatRequest) -> Result<ChatReply, BackendError>;
}

/// Model management collaborator
#[async_trait]
pub trait ModelApi: Send + Sync {
    /// List served models
    async fn get_models(&self) -> Result<Vec<ModelInfo>, BackendError>;

    /// Currently loaded model; `BackendError::NotFound` when none is loaded
    async fn get_current_model(&self) -> Result<ModelInfo, BackendError>;

    /// Backend health report
    async fn get_health(&self) -> Result<HealthStatus, BackendError>;

    /// Ask the backend to load another model
    async fn switch_model(&self, name: &str) -> Result<(), BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_options_builder() {
        let options = GenerationOptions::default()
            .with_max_tokens(256)
            .with_temperature(1.7)
            .with_top_p(-0.2);

        assert_eq!(options.max_tokens, 256);
        assert!((options.temperature - 1.0).abs() < f32::EPSILON);
        assert!(options.top_p.abs() < f32::EPSILON);
    }

    #[test]
    fn test_chat_request_body_shape() {
        let request = ChatRequest::new(vec![HistoryMessage::new(MessageRole::User, "hi")]);
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hi");
        assert_eq!(body["max_tokens"], 1000);
        assert!(body.get("options").is_none());
    }

    #[test]
    fn test_health_status_keeps_details() {
        let health: HealthStatus =
            serde_json::from_str(r#"{"status":"healthy","gpu":"ok","uptime":12}"#).unwrap();
        assert!(health.is_healthy());
        assert_eq!(health.details["gpu"], "ok");

        let health: HealthStatus = serde_json::from_str(r#"{"status":"degraded"}"#).unwrap();
        assert_eq!(health.status, HealthState::Unknown);
    }

    #[test]
    fn test_model_info_defaults() {
        let model: ModelInfo =
            serde_json::from_str(r#"{"name":"qwen-7b","type":"general"}"#).unwrap();
        assert_eq!(model.name, "qwen-7b");
        assert_eq!(model.model_type.as_deref(), Some("general"));
        assert!(!model.loaded);
    }

    #[test]
    fn test_chat_reply_missing_message() {
        let reply: ChatReply = serde_json::from_str("{}").unwrap();
        assert!(reply.message.is_empty());
    }
}
