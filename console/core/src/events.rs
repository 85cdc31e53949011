//! Surface Events
//!
//! Events sent from a display surface to the Console. Surfaces report what the
//! user did; the Console decides what it means and answers with
//! [`ConsoleMessage`](crate::messages::ConsoleMessage)s.

use serde::{Deserialize, Serialize};

use crate::tasks::TaskRequest;

/// Events from display surface to Console
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ConsoleEvent {
    // ============================================
    // Conversation Events
    // ============================================
    /// User submitted a chat message
    UserMessage {
        /// The message text
        content: String,
    },

    /// User issued a service command (sent as `"{command} {target}"`)
    ServiceCommand {
        /// Command verb, e.g. "start service"
        command: String,
        /// Command target, e.g. "Qwen-7B"
        target: String,
    },

    /// User asked for a fresh transcript
    ClearHistory,

    // ============================================
    // Model Events
    // ============================================
    /// Reload model list, current model and health
    RefreshModels,

    /// Load another model
    SwitchModel {
        /// Model name
        name: String,
    },

    // ============================================
    // Task Events
    // ============================================
    /// Create an inference task
    SubmitTask {
        /// What to run
        request: TaskRequest,
    },

    /// Advance all running tasks
    PollTasks,

    // ============================================
    // Lifecycle Events
    // ============================================
    /// Surface is going away
    Shutdown,
}

impl ConsoleEvent {
    /// Convenience constructor for a chat message
    pub fn user_message(content: impl Into<String>) -> Self {
        Self::UserMessage {
            content: content.into(),
        }
    }

    /// Text a service command is sent as
    #[must_use]
    pub fn command_text(command: &str, target: &str) -> String {
        format!("{} {}", command.trim(), target.trim())
    }
}
