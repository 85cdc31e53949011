//! Terminal rendering
//!
//! Prints [`ConsoleMessage`]s as plain lines. Stream updates carry the whole
//! reply so far; only the part not yet on screen is written.

use console_core::{
    ChatTurn, ConsoleMessage, ConsoleState, InferenceTask, MessageId, MessageRole, ModelInfo,
    NotifyLevel, TaskStatus, TurnStatus,
};
use tokio::io::{self, AsyncWrite, AsyncWriteExt};

const ASSISTANT_PREFIX: &str = "assistant> ";

/// Reply currently being printed
struct OpenReply {
    id: MessageId,
    shown: String,
}

/// Renders console output and remembers what the surface needs to know
pub struct Renderer<W> {
    out: W,
    state: ConsoleState,
    open: Option<OpenReply>,
    models: Vec<ModelInfo>,
    current: Option<ModelInfo>,
    tasks: Vec<InferenceTask>,
}

impl<W: AsyncWrite + Unpin> Renderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            state: ConsoleState::Initializing,
            open: None,
            models: Vec::new(),
            current: None,
            tasks: Vec::new(),
        }
    }

    /// Last state the console reported
    pub fn state(&self) -> ConsoleState {
        self.state
    }

    /// Refuse further chat input until the console reports back
    pub fn expect_reply(&mut self) {
        self.state = ConsoleState::Responding;
    }

    /// Render one message; returns `false` once the console has quit
    pub async fn render(&mut self, msg: ConsoleMessage) -> io::Result<bool> {
        match msg {
            ConsoleMessage::Turn { turn } => self.turn(&turn).await?,
            ConsoleMessage::StreamUpdate {
                message_id,
                content,
            } => self.stream_update(message_id, &content).await?,
            ConsoleMessage::TranscriptCleared => {
                self.open = None;
                self.line("--- conversation cleared ---").await?;
            }
            ConsoleMessage::Models { models } => {
                self.models = models;
                let names: Vec<_> = self.models.iter().map(|m| m.name.as_str()).collect();
                self.line(&format!("models: {}", names.join(", "))).await?;
            }
            ConsoleMessage::CurrentModel { model } => {
                self.current = model;
                let text = match &self.current {
                    Some(model) => format!("current model: {}", model.name),
                    None => "current model: none loaded".to_string(),
                };
                self.line(&text).await?;
            }
            ConsoleMessage::Health { status } => {
                self.line(&format!("backend health: {:?}", status.status).to_lowercase())
                    .await?;
            }
            ConsoleMessage::TaskUpdated { task } => self.task_updated(task).await?,
            ConsoleMessage::Notify { level, message } => {
                let tag = match level {
                    NotifyLevel::Info => "info",
                    NotifyLevel::Success => "ok",
                    NotifyLevel::Warning => "warning",
                    NotifyLevel::Error => "error",
                };
                self.line(&format!("[{tag}] {message}")).await?;
            }
            ConsoleMessage::State { state } => self.state = state,
            ConsoleMessage::Quit => return Ok(false),
        }
        Ok(true)
    }

    /// Print a line of text
    pub async fn line(&mut self, text: &str) -> io::Result<()> {
        self.out.write_all(text.as_bytes()).await?;
        self.out.write_all(b"\n").await?;
        self.out.flush().await
    }

    /// Print the task table
    pub async fn print_tasks(&mut self) -> io::Result<()> {
        if self.tasks.is_empty() {
            return self.line("no inference tasks").await;
        }
        let rows: Vec<String> = self.tasks.iter().map(task_row).collect();
        for row in rows {
            self.line(&row).await?;
        }
        Ok(())
    }

    async fn turn(&mut self, turn: &ChatTurn) -> io::Result<()> {
        if turn.role == MessageRole::User {
            return Ok(());
        }

        let marker = if turn.status == TurnStatus::Error {
            "[error] "
        } else {
            ""
        };

        match self.open.take() {
            Some(open) if open.id == turn.id && !open.shown.is_empty() => {
                match turn.text.strip_prefix(open.shown.as_str()) {
                    Some(rest) if marker.is_empty() => {
                        self.out.write_all(rest.as_bytes()).await?;
                        self.out.write_all(b"\n").await?;
                        self.out.flush().await
                    }
                    // Final text differs from what streamed; print it whole
                    _ => {
                        self.out.write_all(b"\n").await?;
                        self.line(&format!("{ASSISTANT_PREFIX}{marker}{}", turn.text))
                            .await
                    }
                }
            }
            _ => {
                self.line(&format!("{ASSISTANT_PREFIX}{marker}{}", turn.text))
                    .await
            }
        }
    }

    async fn stream_update(&mut self, id: MessageId, content: &str) -> io::Result<()> {
        let unseen = match &self.open {
            Some(open) if open.id == id => match content.strip_prefix(open.shown.as_str()) {
                Some(unseen) => unseen.to_string(),
                None => format!("\n{ASSISTANT_PREFIX}{content}"),
            },
            _ => format!("{ASSISTANT_PREFIX}{content}"),
        };

        self.out.write_all(unseen.as_bytes()).await?;
        self.out.flush().await?;
        self.open = Some(OpenReply {
            id,
            shown: content.to_string(),
        });
        Ok(())
    }

    async fn task_updated(&mut self, task: InferenceTask) -> io::Result<()> {
        let previous = self
            .tasks
            .iter()
            .position(|t| t.id == task.id)
            .map(|i| std::mem::replace(&mut self.tasks[i], task.clone()));

        match previous {
            None => {
                self.tasks.push(task.clone());
                self.line(&format!(
                    "task {} created: {} [{}] on {}",
                    task.id, task.file_name, task.file_type, task.model
                ))
                .await
            }
            Some(prev) if prev.status != task.status && task.status.is_terminal() => {
                self.line(&task_row(&task)).await
            }
            Some(_) => Ok(()),
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

fn task_row(task: &InferenceTask) -> String {
    let mut row = format!(
        "{} {} [{}] {} {:>3.0}% {}",
        task.id, task.file_name, task.file_type, task.model, task.progress, task.status
    );
    if task.status == TaskStatus::Completed {
        if let Some(result) = &task.result {
            row.push_str(": ");
            row.push_str(result);
        }
    }
    row
}
