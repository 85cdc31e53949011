//! Console integration tests
//!
//! These drive a [`Console`] end to end over scripted collaborators and check
//! the exact message sequence a surface would render:
//! - Streamed replies, including mixed unit shapes
//! - Fallback to the single-request call
//! - Apology turn when no reply can be obtained
//! - Model switching and a missing current model
//! - Inference tasks polled to completion
//! - The full event loop with shutdown

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;
use tokio_test::assert_ok;

use console_core::{
    BackendError, ChatApi, ChatReply, ChatRequest, ConsoleConfig, ConsoleEvent, ConsoleMessage,
    ConsoleState, FileType, HealthState, HealthStatus, MessageRole, ModelApi, ModelInfo,
    NotifyLevel, SimulatedTaskBackend, StreamChunk, StreamingToken, TaskRequest, TaskStatus,
    TurnStatus,
};

type TestConsole = console_core::Console<ScriptedBackend, ScriptedBackend, SimulatedTaskBackend>;

// =============================================================================
// Scripted backend
// =============================================================================

/// Chat and model collaborator with canned behavior
#[derive(Default)]
struct ScriptedBackend {
    /// Units to stream; `None` fails to open the stream
    stream: Option<Vec<StreamingToken>>,
    /// Single-request reply; `None` fails
    fallback: Option<String>,
    /// Loaded model; `None` answers not found
    current: Option<String>,
    /// Model listing fails
    models_down: bool,
    /// Model switch is rejected
    reject_switch: bool,
    fallback_calls: AtomicUsize,
    requests: Mutex<Vec<ChatRequest>>,
    switched_to: Mutex<Option<String>>,
}

impl ScriptedBackend {
    fn streaming(units: Vec<StreamingToken>) -> Self {
        Self {
            stream: Some(units),
            current: Some("qwen-7b".to_string()),
            ..Self::default()
        }
    }
}

#[async_trait]
impl ChatApi for ScriptedBackend {
    async fn send_message_stream(
        &self,
        request: &ChatRequest,
    ) -> Result<mpsc::Receiver<StreamingToken>, BackendError> {
        self.requests.lock().push(request.clone());
        let Some(units) = self.stream.clone() else {
            return Err(BackendError::Status {
                status: 503,
                body: "stream unavailable".to_string(),
            });
        };

        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            for unit in units {
                if tx.send(unit).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }

    async fn send_message(&self, _request: &ChatRequest) -> Result<ChatReply, BackendError> {
        self.fallback_calls.fetch_add(1, Ordering::SeqCst);
        match &self.fallback {
            Some(message) => Ok(ChatReply {
                message: message.clone(),
            }),
            None => Err(BackendError::Other("backend unreachable".to_string())),
        }
    }
}

#[async_trait]
impl ModelApi for ScriptedBackend {
    async fn get_models(&self) -> Result<Vec<ModelInfo>, BackendError> {
        if self.models_down {
            return Err(BackendError::Other("connection refused".to_string()));
        }
        Ok(vec![ModelInfo::named("qwen-7b"), ModelInfo::named("llama-3")])
    }

    async fn get_current_model(&self) -> Result<ModelInfo, BackendError> {
        let switched = self.switched_to.lock().clone();
        switched
            .or_else(|| self.current.clone())
            .map(ModelInfo::named)
            .ok_or_else(|| BackendError::NotFound("no model loaded".to_string()))
    }

    async fn get_health(&self) -> Result<HealthStatus, BackendError> {
        Ok(HealthStatus::new(HealthState::Healthy))
    }

    async fn switch_model(&self, name: &str) -> Result<(), BackendError> {
        if self.reject_switch {
            return Err(BackendError::Status {
                status: 400,
                body: format!("cannot load {name}"),
            });
        }
        *self.switched_to.lock() = Some(name.to_string());
        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn chunk(text: &str) -> StreamingToken {
    StreamingToken::Chunk(StreamChunk::token(text))
}

fn test_config() -> ConsoleConfig {
    let mut config = ConsoleConfig::default();
    config.task_poll_interval = Duration::from_millis(10);
    config
}

/// Start a console and discard its start-up messages
async fn started(
    backend: ScriptedBackend,
    tasks: SimulatedTaskBackend,
) -> (TestConsole, Arc<ScriptedBackend>, mpsc::Receiver<ConsoleMessage>) {
    let backend = Arc::new(backend);
    let (tx, mut rx) = mpsc::channel(256);
    let mut console = TestConsole::with_shared(
        Arc::clone(&backend),
        Arc::clone(&backend),
        Arc::new(tasks),
        test_config(),
        tx,
    );
    assert_ok!(console.start().await);
    drain(&mut rx);
    (console, backend, rx)
}

/// Everything sent so far
fn drain(rx: &mut mpsc::Receiver<ConsoleMessage>) -> Vec<ConsoleMessage> {
    let mut messages = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        messages.push(msg);
    }
    messages
}

fn notifications(messages: &[ConsoleMessage]) -> Vec<(NotifyLevel, String)> {
    messages
        .iter()
        .filter_map(|m| match m {
            ConsoleMessage::Notify { level, message } => Some((*level, message.clone())),
            _ => None,
        })
        .collect()
}

// =============================================================================
// Conversation
// =============================================================================

#[tokio::test]
async fn test_start_sends_greeting_then_model_data() {
    let backend = Arc::new(ScriptedBackend::streaming(vec![]));
    let (tx, mut rx) = mpsc::channel(64);
    let mut console = TestConsole::with_shared(
        Arc::clone(&backend),
        backend,
        Arc::new(SimulatedTaskBackend::new()),
        test_config(),
        tx,
    );

    assert_ok!(console.start().await);
    let messages = drain(&mut rx);

    assert!(matches!(
        &messages[0],
        ConsoleMessage::Turn { turn } if turn.role == MessageRole::Assistant
    ));
    assert!(matches!(&messages[1], ConsoleMessage::Models { models } if models.len() == 2));
    assert!(matches!(
        &messages[2],
        ConsoleMessage::CurrentModel { model: Some(m) } if m.name == "qwen-7b"
    ));
    assert!(matches!(&messages[3], ConsoleMessage::Health { .. }));
    assert_eq!(
        messages[4],
        ConsoleMessage::State {
            state: ConsoleState::Ready
        }
    );
    assert_eq!(messages.len(), 5);
}

#[tokio::test]
async fn test_streamed_reply_message_sequence() {
    let (mut console, backend, mut rx) = started(
        ScriptedBackend::streaming(vec![chunk("Hel"), chunk("lo"), StreamingToken::Done]),
        SimulatedTaskBackend::new(),
    )
    .await;

    assert_ok!(console.handle_event(ConsoleEvent::user_message("hi")).await);
    let messages = drain(&mut rx);

    assert_eq!(messages.len(), 6);
    assert!(matches!(
        &messages[0],
        ConsoleMessage::Turn { turn } if turn.role == MessageRole::User && turn.text == "hi"
    ));
    assert_eq!(
        messages[1],
        ConsoleMessage::State {
            state: ConsoleState::Responding
        }
    );

    let ConsoleMessage::StreamUpdate {
        message_id,
        content,
    } = &messages[2]
    else {
        panic!("expected stream update, got {:?}", messages[2]);
    };
    assert_eq!(content, "Hel");
    assert!(matches!(
        &messages[3],
        ConsoleMessage::StreamUpdate { content, .. } if content == "Hello"
    ));

    let ConsoleMessage::Turn { turn } = &messages[4] else {
        panic!("expected final turn, got {:?}", messages[4]);
    };
    assert_eq!(&turn.id, message_id);
    assert_eq!(turn.text, "Hello");
    assert_eq!(turn.status, TurnStatus::Sent);
    assert_eq!(
        messages[5],
        ConsoleMessage::State {
            state: ConsoleState::Ready
        }
    );

    // Greeting plus the new message, in order
    let requests = backend.requests.lock();
    let roles: Vec<_> = requests[0].messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![MessageRole::Assistant, MessageRole::User]);
    assert_eq!(requests[0].messages[1].content, "hi");
    assert_eq!(backend.fallback_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_mixed_unit_shapes_are_concatenated() {
    let units = vec![
        StreamingToken::Chunk(StreamChunk::token("A")),
        StreamingToken::Chunk(StreamChunk::delta("B")),
        StreamingToken::Chunk(StreamChunk::default()),
        StreamingToken::Chunk(StreamChunk::content("C")),
        StreamingToken::Chunk(StreamChunk::text("D")),
        StreamingToken::Done,
    ];
    let (mut console, _backend, _rx) =
        started(ScriptedBackend::streaming(units), SimulatedTaskBackend::new()).await;

    assert_ok!(console.handle_event(ConsoleEvent::user_message("go")).await);

    let last = console.session().transcript().last().unwrap();
    assert_eq!(last.text, "ABCD");
}

#[tokio::test]
async fn test_stream_failure_falls_back_once() {
    let backend = ScriptedBackend {
        stream: None,
        fallback: Some("Hi there".to_string()),
        ..ScriptedBackend::default()
    };
    let (mut console, backend, mut rx) = started(backend, SimulatedTaskBackend::new()).await;

    assert_ok!(console.handle_event(ConsoleEvent::user_message("hi")).await);
    let messages = drain(&mut rx);

    assert!(!messages
        .iter()
        .any(|m| matches!(m, ConsoleMessage::StreamUpdate { .. })));
    let last = console.session().transcript().last().unwrap();
    assert_eq!(last.text, "Hi there");
    assert_eq!(last.status, TurnStatus::Sent);
    assert_eq!(backend.fallback_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_both_paths_failing_shows_apology() {
    let backend = ScriptedBackend {
        stream: Some(vec![chunk("par"), StreamingToken::Error("reset".to_string())]),
        fallback: None,
        ..ScriptedBackend::default()
    };
    let (mut console, backend, _rx) = started(backend, SimulatedTaskBackend::new()).await;

    assert_ok!(console.handle_event(ConsoleEvent::user_message("hi")).await);

    let last = console.session().transcript().last().unwrap();
    assert_eq!(last.role, MessageRole::Assistant);
    assert_eq!(last.status, TurnStatus::Error);
    assert_eq!(last.text, console_core::config::DEFAULT_APOLOGY);
    assert_eq!(backend.fallback_calls.load(Ordering::SeqCst), 1);
    assert_eq!(console.state(), ConsoleState::Ready);
}

#[tokio::test]
async fn test_blank_message_is_ignored() {
    let (mut console, backend, mut rx) = started(
        ScriptedBackend::streaming(vec![StreamingToken::Done]),
        SimulatedTaskBackend::new(),
    )
    .await;

    assert_ok!(console.handle_event(ConsoleEvent::user_message("   ")).await);

    assert!(drain(&mut rx).is_empty());
    assert!(backend.requests.lock().is_empty());
    assert_eq!(console.session().transcript().len(), 1);
}

#[tokio::test]
async fn test_service_command_is_sent_as_text() {
    let (mut console, backend, _rx) = started(
        ScriptedBackend::streaming(vec![chunk("ok"), StreamingToken::Done]),
        SimulatedTaskBackend::new(),
    )
    .await;

    assert_ok!(
        console
            .handle_event(ConsoleEvent::ServiceCommand {
                command: "restart".to_string(),
                target: "monitoring service".to_string(),
            })
            .await
    );

    let requests = backend.requests.lock();
    assert_eq!(
        requests[0].messages.last().unwrap().content,
        "restart monitoring service"
    );
}

#[tokio::test]
async fn test_clear_history_keeps_only_greeting() {
    let (mut console, _backend, mut rx) = started(
        ScriptedBackend::streaming(vec![chunk("ok"), StreamingToken::Done]),
        SimulatedTaskBackend::new(),
    )
    .await;

    assert_ok!(console.handle_event(ConsoleEvent::user_message("hi")).await);
    drain(&mut rx);
    assert_ok!(console.handle_event(ConsoleEvent::ClearHistory).await);

    let messages = drain(&mut rx);
    assert_eq!(messages[0], ConsoleMessage::TranscriptCleared);
    assert_eq!(console.session().transcript().len(), 1);
    assert_eq!(
        console.session().transcript()[0].text,
        console_core::config::DEFAULT_CLEARED_GREETING
    );
}

// =============================================================================
// Models
// =============================================================================

#[tokio::test]
async fn test_missing_current_model_is_not_an_error() {
    let backend = ScriptedBackend {
        current: None,
        ..ScriptedBackend::default()
    };
    let backend = Arc::new(backend);
    let (tx, mut rx) = mpsc::channel(64);
    let mut console = TestConsole::with_shared(
        Arc::clone(&backend),
        backend,
        Arc::new(SimulatedTaskBackend::new()),
        test_config(),
        tx,
    );

    assert_ok!(console.start().await);
    let messages = drain(&mut rx);

    assert!(notifications(&messages).is_empty());
    assert!(messages.contains(&ConsoleMessage::CurrentModel { model: None }));
    assert!(console.session().current_model().is_none());
    assert_eq!(console.session().models().len(), 2);
}

#[tokio::test]
async fn test_unreachable_backend_is_reported() {
    let backend = ScriptedBackend {
        models_down: true,
        ..ScriptedBackend::default()
    };
    let backend = Arc::new(backend);
    let (tx, mut rx) = mpsc::channel(64);
    let mut console = TestConsole::with_shared(
        Arc::clone(&backend),
        backend,
        Arc::new(SimulatedTaskBackend::new()),
        test_config(),
        tx,
    );

    assert_ok!(console.start().await);
    let notes = notifications(&drain(&mut rx));

    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].0, NotifyLevel::Error);
    assert!(notes[0].1.starts_with("Failed to connect to backend"));
    assert!(console.is_ready());
}

#[tokio::test]
async fn test_switch_model_refreshes_and_notifies() {
    let (mut console, _backend, mut rx) = started(
        ScriptedBackend::streaming(vec![]),
        SimulatedTaskBackend::new(),
    )
    .await;

    assert_ok!(
        console
            .handle_event(ConsoleEvent::SwitchModel {
                name: "llama-3".to_string()
            })
            .await
    );
    let messages = drain(&mut rx);

    assert_eq!(console.session().current_model().unwrap().name, "llama-3");
    assert_eq!(
        notifications(&messages),
        vec![(
            NotifyLevel::Success,
            "Switched to model: llama-3".to_string()
        )]
    );
}

#[tokio::test]
async fn test_switch_model_failure_leaves_state_unchanged() {
    let backend = ScriptedBackend {
        reject_switch: true,
        ..ScriptedBackend::streaming(vec![])
    };
    let (mut console, _backend, mut rx) = started(backend, SimulatedTaskBackend::new()).await;
    let before = console.session().current_model().cloned();

    assert_ok!(
        console
            .handle_event(ConsoleEvent::SwitchModel {
                name: "llama-3".to_string()
            })
            .await
    );
    let messages = drain(&mut rx);

    assert_eq!(console.session().current_model().cloned(), before);
    assert_eq!(
        notifications(&messages),
        vec![(
            NotifyLevel::Error,
            "Failed to switch model, please check the service status".to_string()
        )]
    );
    assert!(!messages
        .iter()
        .any(|m| matches!(m, ConsoleMessage::CurrentModel { .. })));
}

#[tokio::test]
async fn test_switch_not_announced_when_refresh_fails() {
    let backend = ScriptedBackend {
        models_down: true,
        ..ScriptedBackend::streaming(vec![])
    };
    let (mut console, backend, mut rx) = started(backend, SimulatedTaskBackend::new()).await;

    assert_ok!(
        console
            .handle_event(ConsoleEvent::SwitchModel {
                name: "llama-3".to_string()
            })
            .await
    );
    let notes = notifications(&drain(&mut rx));

    assert_eq!(backend.switched_to.lock().as_deref(), Some("llama-3"));
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].0, NotifyLevel::Error);
    assert!(notes[0].1.starts_with("Failed to connect to backend"));
}

// =============================================================================
// Tasks
// =============================================================================

#[tokio::test]
async fn test_task_polled_to_completion() {
    let (mut console, _backend, mut rx) = started(
        ScriptedBackend::streaming(vec![]),
        SimulatedTaskBackend::with_step(|| 40.0),
    )
    .await;

    let request = TaskRequest::new(FileType::Image, "ResNet-50").with_file_name("cat.jpg");
    assert_ok!(console.handle_event(ConsoleEvent::SubmitTask { request }).await);

    let task = &console.session().tasks()[0];
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.file_name, "cat.jpg");
    assert_eq!(notifications(&drain(&mut rx))[0].0, NotifyLevel::Success);

    for _ in 0..3 {
        assert_ok!(console.handle_event(ConsoleEvent::PollTasks).await);
    }

    let task = &console.session().tasks()[0];
    assert_eq!(task.status, TaskStatus::Completed);
    assert!((task.progress - 100.0).abs() < f32::EPSILON);
    assert_eq!(
        task.result.as_deref(),
        Some(console_core::canned_result(FileType::Image, "ResNet-50"))
    );

    // Terminal tasks are not polled again
    drain(&mut rx);
    assert_ok!(console.handle_event(ConsoleEvent::PollTasks).await);
    assert!(drain(&mut rx).is_empty());
}

// =============================================================================
// Event loop
// =============================================================================

#[tokio::test]
async fn test_run_loop_polls_tasks_and_shuts_down() {
    let backend = Arc::new(ScriptedBackend::streaming(vec![
        chunk("pong"),
        StreamingToken::Done,
    ]));
    let (tx, mut rx) = mpsc::channel(256);
    let (event_tx, event_rx) = mpsc::channel(8);
    let console = TestConsole::with_shared(
        Arc::clone(&backend),
        backend,
        Arc::new(SimulatedTaskBackend::with_step(|| 100.0)),
        test_config(),
        tx,
    );
    let handle = tokio::spawn(console.run(event_rx));

    event_tx
        .send(ConsoleEvent::user_message("ping"))
        .await
        .unwrap();
    event_tx
        .send(ConsoleEvent::SubmitTask {
            request: TaskRequest::new(FileType::Audio, "Whisper"),
        })
        .await
        .unwrap();

    // Wait for the interval to complete the task
    let completed = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(msg) = rx.recv().await {
            if let ConsoleMessage::TaskUpdated { task } = msg {
                if task.status == TaskStatus::Completed {
                    return true;
                }
            }
        }
        false
    })
    .await
    .unwrap();
    assert!(completed);

    event_tx.send(ConsoleEvent::Shutdown).await.unwrap();
    assert_ok!(handle.await.unwrap());

    let rest = drain(&mut rx);
    assert_eq!(rest.last(), Some(&ConsoleMessage::Quit));
}
