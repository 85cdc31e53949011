//! Console Core - Headless Chat Orchestration for a Model-Serving Backend
//!
//! This crate holds the chat console's behavior with no display attached:
//! streaming reply consumption with a single-request fallback, model listing
//! and switching, backend health, and simulated inference tasks. A terminal,
//! a web page or a test harness drives it through channels.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        Display Surfaces                           │
//! │  ┌──────────────┐  ┌──────────────┐  ┌─────────────────────────┐ │
//! │  │ chat-console │  │   Web page   │  │   Test harness          │ │
//! │  │    (CLI)     │  │              │  │                         │ │
//! │  └──────┬───────┘  └──────┬───────┘  └────────────┬────────────┘ │
//! │         └─────────────────┴───────────────────────┘              │
//! │                           │                                       │
//! │                    ConsoleEvent (up)                              │
//! │                   ConsoleMessage (down)                           │
//! └───────────────────────────┼───────────────────────────────────────┘
//!                             │
//! ┌───────────────────────────┼───────────────────────────────────────┐
//! │                      CONSOLE CORE                                 │
//! │  ┌────────────────────────┴─────────────────────────────────────┐ │
//! │  │                         Console                               │ │
//! │  │  ┌──────────┐  ┌──────────────┐  ┌──────────┐  ┌───────────┐ │ │
//! │  │  │ Session  │  │  Streaming   │  │  Model   │  │   Task    │ │ │
//! │  │  │          │  │  Consumer    │  │ Registry │  │  Backend  │ │ │
//! │  │  └──────────┘  └──────┬───────┘  └────┬─────┘  └───────────┘ │ │
//! │  └───────────────────────┼───────────────┼──────────────────────┘ │
//! │                          └───────┬───────┘                        │
//! │                          HttpBackend (REST)                       │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`Console`]: Orchestrates a session over its collaborators
//! - [`ConsoleMessage`]: Messages sent from the Console to a surface
//! - [`ConsoleEvent`]: Events sent from a surface to the Console
//! - [`ChatSession`]: Transcript plus the last known model data
//! - [`StreamingChatConsumer`]: Turns a stream of reply units into text
//! - [`ModelRegistry`]: Model listing, switching and health
//! - [`SimulatedTaskBackend`]: Stand-in for a real inference task service
//!
//! # Quick Start
//!
//! ```ignore
//! use console_core::{
//!     backend::HttpBackend, config::load_config, tasks::SimulatedTaskBackend,
//!     Console, ConsoleEvent,
//! };
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     let backend = HttpBackend::from_config(&config)?;
//!
//!     let (tx, mut rx) = mpsc::channel(100);
//!     let (event_tx, event_rx) = mpsc::channel(32);
//!
//!     let console = Console::new(
//!         backend.clone(),
//!         backend,
//!         SimulatedTaskBackend::new(),
//!         config,
//!         tx,
//!     );
//!     tokio::spawn(console.run(event_rx));
//!
//!     event_tx.send(ConsoleEvent::user_message("Hello")).await?;
//!     while let Some(msg) = rx.recv().await {
//!         // Render message
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`backend`]: Collaborator traits and the HTTP implementation
//! - [`config`]: Configuration file and environment loading
//! - [`console`]: Main Console struct
//! - [`consumer`]: Streaming reply consumption with fallback
//! - [`error`]: Backend and stream error types
//! - [`events`]: Events from surfaces to the Console
//! - [`messages`]: Messages from the Console to surfaces
//! - [`registry`]: Model registry
//! - [`session`]: Session state transitions
//! - [`stream`]: Stream unit shapes and text extraction
//! - [`tasks`]: Inference tasks and the simulated task backend

#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod config;
pub mod console;
pub mod consumer;
pub mod error;
pub mod events;
pub mod messages;
pub mod registry;
pub mod session;
pub mod stream;
pub mod tasks;

// Re-exports for convenience
pub use backend::{
    ChatApi, ChatReply, ChatRequest, GenerationOptions, HealthState, HealthStatus,
    HistoryMessage, HttpBackend, ModelApi, ModelInfo, StreamingToken,
};
pub use console::Console;
pub use consumer::{
    AssembledReply, ReplySink, ReplySource, StreamingChatConsumer, EMPTY_REPLY_PLACEHOLDER,
};
pub use error::{BackendError, StreamError};
pub use events::ConsoleEvent;
pub use messages::{
    ChatTurn, ConsoleMessage, ConsoleState, MessageId, MessageRole, NotifyLevel, TurnStatus,
};
pub use registry::{ModelRegistry, RegistrySnapshot};
pub use session::{build_history, ChatSession, SubmitRejection, Submission};
pub use stream::{StreamChunk, StreamToken};
pub use tasks::{
    canned_result, FileType, InferenceTask, SimulatedTaskBackend, TaskBackend, TaskId,
    TaskRequest, TaskStatus,
};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, ConsoleConfig,
};
