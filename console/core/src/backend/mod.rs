//! Backend Collaborators
//!
//! Chat completion and model management are external collaborators reached
//! through the [`ChatApi`] and [`ModelApi`] traits.
//!
//! # Available Backends
//!
//! - **HTTP**: REST model-serving backend (default)
//!
//! # Usage
//!
//! ```ignore
//! use console_core::backend::{ChatApi, ChatRequest, HistoryMessage, HttpBackend};
//! use console_core::MessageRole;
//!
//! let backend = HttpBackend::new("http://localhost:8000", Duration::from_secs(120))?;
//! let request = ChatRequest::new(vec![HistoryMessage::new(MessageRole::User, "Hello!")]);
//! let rx = backend.send_message_stream(&request).await?;
//! ```

mod http;
mod traits;

pub use http::HttpBackend;
pub use traits::{
    ChatApi, ChatReply, ChatRequest, GenerationOptions, HealthState, HealthStatus,
    HistoryMessage, ModelApi, ModelInfo, StreamingToken,
};
