//! Session State
//!
//! Everything the console knows about the current page session lives in one
//! [`ChatSession`]: the transcript, the in-flight reply, and the last known
//! model list, current model, health report and inference tasks.
//!
//! State only changes through named transitions. Each transition mutates the
//! session and returns the [`ConsoleMessage`]s a surface must render, so the
//! whole state machine can be exercised without any UI or I/O.
//!
//! ```text
//!            submit                receive_delta*          finalize / set_error
//!  Ready ───────────────▶ Responding ─────────────▶ Responding ───────────────────▶ Ready
//!    ▲                        │
//!    └── submit rejected ◀────┘ (Busy)
//! ```

use serde::{Deserialize, Serialize};

use crate::backend::{HealthStatus, HistoryMessage, ModelInfo};
use crate::messages::{
    ChatTurn, ConsoleMessage, ConsoleState, MessageId, MessageRole, TurnStatus,
};
use crate::tasks::InferenceTask;

/// Why a submission was refused
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitRejection {
    /// Nothing but whitespace was submitted
    Empty,
    /// A reply is still in flight
    Busy,
}

impl std::fmt::Display for SubmitRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "message is empty"),
            Self::Busy => write!(f, "a reply is still in progress"),
        }
    }
}

/// An accepted submission
#[derive(Clone, Debug)]
pub struct Submission {
    /// Id reserved for the assistant reply
    pub reply_id: MessageId,
    /// History to send, ending with the new user message
    pub history: Vec<HistoryMessage>,
    /// Messages to render
    pub effects: Vec<ConsoleMessage>,
}

/// The reply currently being produced
#[derive(Clone, Debug, Serialize, Deserialize)]
struct PendingReply {
    id: MessageId,
    partial: String,
}

/// Map a transcript plus a new utterance to collaborator history
#[must_use]
pub fn build_history(transcript: &[ChatTurn], new_user_text: &str) -> Vec<HistoryMessage> {
    transcript
        .iter()
        .map(|turn| HistoryMessage::new(turn.role, turn.text.clone()))
        .chain(std::iter::once(HistoryMessage::new(
            MessageRole::User,
            new_user_text,
        )))
        .collect()
}

/// Console session state
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChatSession {
    transcript: Vec<ChatTurn>,
    pending: Option<PendingReply>,
    models: Vec<ModelInfo>,
    current_model: Option<ModelInfo>,
    health: Option<HealthStatus>,
    tasks: Vec<InferenceTask>,
}

impl ChatSession {
    /// Create a session whose transcript opens with an assistant greeting
    pub fn new(greeting: impl Into<String>) -> Self {
        Self {
            transcript: vec![ChatTurn::new(MessageRole::Assistant, greeting)],
            ..Self::default()
        }
    }

    // ============================================
    // Queries
    // ============================================

    /// All turns, oldest first
    #[must_use]
    pub fn transcript(&self) -> &[ChatTurn] {
        &self.transcript
    }

    /// Whether a reply is in flight
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    /// Id and partial text of the in-flight reply
    #[must_use]
    pub fn pending_reply(&self) -> Option<(&MessageId, &str)> {
        self.pending.as_ref().map(|p| (&p.id, p.partial.as_str()))
    }

    /// Operational state implied by the session
    #[must_use]
    pub fn state(&self) -> ConsoleState {
        if self.is_busy() {
            ConsoleState::Responding
        } else {
            ConsoleState::Ready
        }
    }

    /// Last known model list
    #[must_use]
    pub fn models(&self) -> &[ModelInfo] {
        &self.models
    }

    /// Last known current model
    #[must_use]
    pub fn current_model(&self) -> Option<&ModelInfo> {
        self.current_model.as_ref()
    }

    /// Last known health report
    #[must_use]
    pub fn health(&self) -> Option<&HealthStatus> {
        self.health.as_ref()
    }

    /// Known inference tasks, oldest first
    #[must_use]
    pub fn tasks(&self) -> &[InferenceTask] {
        &self.tasks
    }

    // ============================================
    // Conversation transitions
    // ============================================

    /// Accept a user utterance and open a reply
    ///
    /// # Errors
    ///
    /// Refuses blank text and any submission while a reply is in flight.
    pub fn submit(&mut self, text: &str) -> Result<Submission, SubmitRejection> {
        if text.trim().is_empty() {
            return Err(SubmitRejection::Empty);
        }
        if self.is_busy() {
            return Err(SubmitRejection::Busy);
        }

        let history = build_history(&self.transcript, text);
        let user_turn = ChatTurn::new(MessageRole::User, text);
        self.transcript.push(user_turn.clone());

        let reply_id = MessageId::new();
        self.pending = Some(PendingReply {
            id: reply_id.clone(),
            partial: String::new(),
        });

        Ok(Submission {
            reply_id,
            history,
            effects: vec![
                ConsoleMessage::Turn { turn: user_turn },
                ConsoleMessage::State {
                    state: ConsoleState::Responding,
                },
            ],
        })
    }

    /// Record the reply so far; `assembled` is the full text, not a delta
    pub fn receive_delta(&mut self, assembled: &str) -> Vec<ConsoleMessage> {
        let Some(pending) = self.pending.as_mut() else {
            tracing::warn!("Stream update with no reply in flight");
            return Vec::new();
        };

        pending.partial.clear();
        pending.partial.push_str(assembled);

        vec![ConsoleMessage::StreamUpdate {
            message_id: pending.id.clone(),
            content: pending.partial.clone(),
        }]
    }

    /// Close the in-flight reply with its final text
    pub fn finalize(&mut self, text: impl Into<String>) -> Vec<ConsoleMessage> {
        self.close_reply(text.into(), TurnStatus::Sent)
    }

    /// Close the in-flight reply as failed, showing `apology`
    pub fn set_error(&mut self, apology: impl Into<String>) -> Vec<ConsoleMessage> {
        self.close_reply(apology.into(), TurnStatus::Error)
    }

    fn close_reply(&mut self, text: String, status: TurnStatus) -> Vec<ConsoleMessage> {
        let Some(pending) = self.pending.take() else {
            tracing::warn!(?status, "Reply closed with no reply in flight");
            return Vec::new();
        };

        let turn = ChatTurn::with_id(pending.id, MessageRole::Assistant, text, status);
        self.transcript.push(turn.clone());

        vec![
            ConsoleMessage::Turn { turn },
            ConsoleMessage::State {
                state: ConsoleState::Ready,
            },
        ]
    }

    /// Replace the transcript with a single greeting turn
    ///
    /// An in-flight reply stays open and lands after the greeting.
    pub fn clear_history(&mut self, greeting: impl Into<String>) -> Vec<ConsoleMessage> {
        let turn = ChatTurn::new(MessageRole::Assistant, greeting);
        self.transcript = vec![turn.clone()];
        vec![ConsoleMessage::TranscriptCleared, ConsoleMessage::Turn { turn }]
    }

    // ============================================
    // Model transitions
    // ============================================

    /// Record the latest model list
    pub fn set_models(&mut self, models: Vec<ModelInfo>) -> Vec<ConsoleMessage> {
        self.models = models;
        vec![ConsoleMessage::Models {
            models: self.models.clone(),
        }]
    }

    /// Record the latest current model (`None` when nothing is loaded)
    pub fn set_current_model(&mut self, model: Option<ModelInfo>) -> Vec<ConsoleMessage> {
        self.current_model = model;
        vec![ConsoleMessage::CurrentModel {
            model: self.current_model.clone(),
        }]
    }

    /// Record the latest health report
    pub fn set_health(&mut self, status: HealthStatus) -> Vec<ConsoleMessage> {
        self.health = Some(status.clone());
        vec![ConsoleMessage::Health { status }]
    }

    // ============================================
    // Task transitions
    // ============================================

    /// Insert or replace a task record
    pub fn upsert_task(&mut self, task: InferenceTask) -> Vec<ConsoleMessage> {
        match self.tasks.iter_mut().find(|t| t.id == task.id) {
            Some(existing) => *existing = task.clone(),
            None => self.tasks.push(task.clone()),
        }
        vec![ConsoleMessage::TaskUpdated { task }]
    }
}
