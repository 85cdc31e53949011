//! Console Messages
//!
//! Messages sent from the Console to a display surface. A surface (terminal,
//! web page, test harness) renders what it is told and keeps no business
//! logic of its own.
//!
//! # Streaming Display
//!
//! While a reply is streaming the surface receives [`ConsoleMessage::StreamUpdate`]
//! carrying the *full reply so far*, not just the newest increment. A surface
//! re-renders the in-flight reply from that text. Exactly one
//! [`ConsoleMessage::Turn`] for the same message id follows, closing the reply
//! either as `Sent` or as `Error`.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::{HealthStatus, ModelInfo};
use crate::tasks::InferenceTask;

/// Messages from Console to display surface
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ConsoleMessage {
    // ============================================
    // Conversation Messages
    // ============================================
    /// A finished turn was appended to the transcript
    Turn {
        /// The appended turn
        turn: ChatTurn,
    },

    /// The in-flight reply grew
    StreamUpdate {
        /// Id the terminal turn will carry
        message_id: MessageId,
        /// Cumulative reply text received so far
        content: String,
    },

    /// The transcript was reset
    TranscriptCleared,

    // ============================================
    // Model Directives
    // ============================================
    /// Available models changed
    Models {
        /// Latest known model list
        models: Vec<ModelInfo>,
    },

    /// Currently loaded model changed (`None` when nothing is loaded)
    CurrentModel {
        /// Latest known current model
        model: Option<ModelInfo>,
    },

    /// Backend health changed
    Health {
        /// Latest known health report
        status: HealthStatus,
    },

    // ============================================
    // Task Directives
    // ============================================
    /// An inference task was created or advanced
    TaskUpdated {
        /// Current task record
        task: InferenceTask,
    },

    // ============================================
    // System Messages
    // ============================================
    /// Transient notification
    Notify {
        /// Notification level
        level: NotifyLevel,
        /// Message content
        message: String,
    },

    /// Console state change
    State {
        /// The new state
        state: ConsoleState,
    },

    /// Console is shutting down
    Quit,
}

/// Who authored a turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// The person typing
    User,
    /// The model's reply
    Assistant,
}

impl MessageRole {
    /// Role string used in collaborator history
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery status of a turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnStatus {
    /// Still being produced
    Sending,
    /// Delivered
    Sent,
    /// Could not be produced; text is a placeholder
    Error,
}

/// One message in the transcript
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Unique message ID
    pub id: MessageId,
    /// Who authored this turn
    pub role: MessageRole,
    /// Turn text
    pub text: String,
    /// When the turn was recorded
    pub sent_at: DateTime<Utc>,
    /// Delivery status
    pub status: TurnStatus,
}

impl ChatTurn {
    /// Create a delivered turn with a fresh id
    pub fn new(role: MessageRole, text: impl Into<String>) -> Self {
        Self::with_id(MessageId::new(), role, text, TurnStatus::Sent)
    }

    /// Create a turn with an explicit id and status
    pub fn with_id(
        id: MessageId,
        role: MessageRole,
        text: impl Into<String>,
        status: TurnStatus,
    ) -> Self {
        Self {
            id,
            role,
            text: text.into(),
            sent_at: Utc::now(),
            status,
        }
    }
}

/// Notification level
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotifyLevel {
    /// Informational
    Info,
    /// Action succeeded
    Success,
    /// Something needs attention
    Warning,
    /// Action failed
    Error,
}

/// Console operational state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsoleState {
    /// Loading models and health on start-up
    Initializing,
    /// Accepting submissions
    Ready,
    /// A reply is in flight; submissions are refused
    Responding,
    /// Shutting down
    ShuttingDown,
}

impl ConsoleState {
    /// Whether the surface should accept new submissions
    #[must_use]
    pub fn accepts_input(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Unique message identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Generate a new unique message ID
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        Self(format!("msg_{id}"))
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
