//! Console - The Orchestration Core
//!
//! The Console ties the pieces of a chat session together:
//! - Reply consumption through the chat collaborator
//! - Model listing, switching and health through the model collaborator
//! - Inference tasks through the task backend
//! - Communication with a display surface
//!
//! It is surface-agnostic. It receives [`ConsoleEvent`]s and answers with
//! [`ConsoleMessage`]s on an mpsc channel; a terminal, a web page or a test
//! harness can sit on the other end.
//!
//! Events are handled one at a time. A reply is awaited inside
//! [`Console::handle_event`], so a second submission cannot start until the
//! first has produced its terminal turn.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::backend::{ChatApi, ModelApi};
use crate::config::ConsoleConfig;
use crate::consumer::{ReplySink, StreamingChatConsumer};
use crate::events::ConsoleEvent;
use crate::messages::{ConsoleMessage, ConsoleState, NotifyLevel};
use crate::registry::ModelRegistry;
use crate::session::{ChatSession, SubmitRejection};
use crate::tasks::{TaskBackend, TaskRequest};

/// Routes stream progress through the session to the surface
struct SessionSink<'a> {
    session: &'a mut ChatSession,
    tx: &'a mpsc::Sender<ConsoleMessage>,
}

#[async_trait]
impl ReplySink for SessionSink<'_> {
    async fn partial(&mut self, assembled: &str) {
        for msg in self.session.receive_delta(assembled) {
            if let Err(e) = self.tx.send(msg).await {
                tracing::warn!("Failed to send stream update to surface: {}", e);
            }
        }
    }
}

/// The Console - headless chat orchestration
pub struct Console<C: ChatApi, M: ModelApi, T: TaskBackend> {
    /// Configuration
    config: ConsoleConfig,
    /// Session state
    session: ChatSession,
    /// Reply consumer over the chat collaborator
    consumer: StreamingChatConsumer<C>,
    /// Model collaborator wrapper
    registry: ModelRegistry<M>,
    /// Inference task backend
    tasks: Arc<T>,
    /// Current operational state
    state: ConsoleState,
    /// Channel to send messages to the surface
    tx: mpsc::Sender<ConsoleMessage>,
}

impl<C, M, T> Console<C, M, T>
where
    C: ChatApi + 'static,
    M: ModelApi + 'static,
    T: TaskBackend + 'static,
{
    /// Create a new Console over the given collaborators
    pub fn new(
        chat: C,
        models: M,
        tasks: T,
        config: ConsoleConfig,
        tx: mpsc::Sender<ConsoleMessage>,
    ) -> Self {
        Self::with_shared(Arc::new(chat), Arc::new(models), Arc::new(tasks), config, tx)
    }

    /// Create a new Console over already-shared collaborators
    pub fn with_shared(
        chat: Arc<C>,
        models: Arc<M>,
        tasks: Arc<T>,
        config: ConsoleConfig,
        tx: mpsc::Sender<ConsoleMessage>,
    ) -> Self {
        Self {
            session: ChatSession::new(config.greeting.clone()),
            consumer: StreamingChatConsumer::new(chat),
            registry: ModelRegistry::new(models),
            tasks,
            config,
            state: ConsoleState::Initializing,
            tx,
        }
    }

    /// Current operational state
    pub fn state(&self) -> ConsoleState {
        self.state
    }

    /// Session state
    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    /// Whether the console accepts submissions
    pub fn is_ready(&self) -> bool {
        self.state.accepts_input()
    }

    /// Send the opening transcript and load model data
    ///
    /// A backend that cannot be reached is reported to the surface; the
    /// console still becomes ready.
    pub async fn start(&mut self) -> anyhow::Result<()> {
        tracing::info!(base_url = %self.config.base_url, "Starting console");

        for turn in self.session.transcript().to_vec() {
            self.send(ConsoleMessage::Turn { turn }).await;
        }

        self.refresh_models().await;
        self.set_state(ConsoleState::Ready).await;
        Ok(())
    }

    /// Handle an event from the surface
    pub async fn handle_event(&mut self, event: ConsoleEvent) -> anyhow::Result<()> {
        match event {
            ConsoleEvent::UserMessage { content } => {
                self.handle_user_message(&content).await;
            }
            ConsoleEvent::ServiceCommand { command, target } => {
                let content = ConsoleEvent::command_text(&command, &target);
                tracing::info!(command = %content, "Service command");
                self.handle_user_message(&content).await;
            }
            ConsoleEvent::ClearHistory => {
                let effects = self.session.clear_history(self.config.cleared_greeting.clone());
                self.emit(effects).await;
            }
            ConsoleEvent::RefreshModels => {
                self.refresh_models().await;
            }
            ConsoleEvent::SwitchModel { name } => {
                self.switch_model(&name).await;
            }
            ConsoleEvent::SubmitTask { request } => {
                self.submit_task(request).await;
            }
            ConsoleEvent::PollTasks => {
                self.poll_tasks().await;
            }
            ConsoleEvent::Shutdown => {
                self.shutdown().await;
            }
        }
        Ok(())
    }

    /// Run until the surface shuts down or drops its sender
    ///
    /// Running tasks are polled on the configured interval between events.
    pub async fn run(mut self, mut events: mpsc::Receiver<ConsoleEvent>) -> anyhow::Result<()> {
        self.start().await?;

        let mut poll = tokio::time::interval(self.config.task_poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(ConsoleEvent::Shutdown) | None => break,
                    Some(event) => self.handle_event(event).await?,
                },
                _ = poll.tick() => {
                    if self.has_active_tasks() {
                        self.poll_tasks().await;
                    }
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Handle a user message: submit, consume the reply, close the turn
    async fn handle_user_message(&mut self, content: &str) {
        let submission = match self.session.submit(content) {
            Ok(submission) => submission,
            Err(SubmitRejection::Empty) => {
                tracing::debug!("Ignoring empty message");
                return;
            }
            Err(reason @ SubmitRejection::Busy) => {
                tracing::warn!(reason = %reason, "Rejected user message");
                self.notify(NotifyLevel::Warning, "A reply is still in progress")
                    .await;
                return;
            }
        };

        tracing::debug!(
            history_len = submission.history.len(),
            reply_id = %submission.reply_id,
            "Sending message history"
        );
        self.emit(submission.effects).await;

        let options = self.config.generation;
        let result = {
            let mut sink = SessionSink {
                session: &mut self.session,
                tx: &self.tx,
            };
            self.consumer
                .consume_history(submission.history, &options, &mut sink)
                .await
        };

        let effects = match result {
            Ok(reply) => {
                tracing::info!(
                    source = ?reply.source,
                    increments = reply.increments,
                    chars = reply.text.len(),
                    "Reply complete"
                );
                self.session.finalize(reply.text)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to obtain reply");
                self.session.set_error(self.config.apology.clone())
            }
        };
        self.emit(effects).await;
    }

    /// Reload model list, current model and health
    async fn refresh_models(&mut self) -> bool {
        match self.registry.snapshot().await {
            Ok(snapshot) => {
                let mut effects = self.session.set_models(snapshot.models);
                effects.extend(self.session.set_current_model(snapshot.current));
                effects.extend(self.session.set_health(snapshot.health));
                self.emit(effects).await;
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load model data");
                self.notify(
                    NotifyLevel::Error,
                    &format!("Failed to connect to backend: {e}"),
                )
                .await;
                false
            }
        }
    }

    /// Switch models; on failure only a notification is produced
    async fn switch_model(&mut self, name: &str) {
        match self.registry.switch_model(name).await {
            // A failed refresh has already produced its own error notification
            Ok(()) => {
                if self.refresh_models().await {
                    self.notify(NotifyLevel::Success, &format!("Switched to model: {name}"))
                        .await;
                }
            }
            Err(e) => {
                tracing::error!(model = %name, error = %e, "Model switch failed");
                self.notify(
                    NotifyLevel::Error,
                    "Failed to switch model, please check the service status",
                )
                .await;
            }
        }
    }

    /// Create an inference task
    async fn submit_task(&mut self, request: TaskRequest) {
        match self.tasks.submit(request).await {
            Ok(task) => {
                tracing::info!(task_id = %task.id, file_type = %task.file_type, "Task created");
                let effects = self.session.upsert_task(task);
                self.emit(effects).await;
                self.notify(NotifyLevel::Success, "File uploaded, inference task created")
                    .await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Task submission failed");
                self.notify(NotifyLevel::Error, &format!("Failed to create task: {e}"))
                    .await;
            }
        }
    }

    fn has_active_tasks(&self) -> bool {
        self.session.tasks().iter().any(|t| !t.status.is_terminal())
    }

    /// Advance every task that has not finished
    async fn poll_tasks(&mut self) {
        let active: Vec<_> = self
            .session
            .tasks()
            .iter()
            .filter(|t| !t.status.is_terminal())
            .map(|t| t.id.clone())
            .collect();

        for id in active {
            match self.tasks.poll(&id).await {
                Ok(task) => {
                    let effects = self.session.upsert_task(task);
                    self.emit(effects).await;
                }
                Err(e) => {
                    tracing::warn!(task_id = %id, error = %e, "Task poll failed, marking task failed");
                    let Some(mut task) = self.session.tasks().iter().find(|t| t.id == id).cloned()
                    else {
                        continue;
                    };
                    task.fail();
                    let effects = self.session.upsert_task(task);
                    self.emit(effects).await;
                }
            }
        }
    }

    /// Shut down the Console
    pub async fn shutdown(&mut self) {
        if self.state == ConsoleState::ShuttingDown {
            return;
        }
        self.set_state(ConsoleState::ShuttingDown).await;
        self.send(ConsoleMessage::Quit).await;
    }

    /// Set state and notify the surface
    async fn set_state(&mut self, state: ConsoleState) {
        self.emit(vec![ConsoleMessage::State { state }]).await;
    }

    /// Send notification
    async fn notify(&self, level: NotifyLevel, message: &str) {
        self.send(ConsoleMessage::Notify {
            level,
            message: message.to_string(),
        })
        .await;
    }

    /// Send transition output, tracking state changes
    async fn emit(&mut self, messages: Vec<ConsoleMessage>) {
        for msg in messages {
            if let ConsoleMessage::State { state } = &msg {
                self.state = *state;
            }
            self.send(msg).await;
        }
    }

    /// Send a message to the surface
    async fn send(&self, msg: ConsoleMessage) {
        if let Err(e) = self.tx.send(msg).await {
            tracing::warn!("Failed to send message to surface: {}", e);
        }
    }
}
