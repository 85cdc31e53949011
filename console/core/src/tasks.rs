//! Inference Task Management
//!
//! File-based inference tasks are submitted to a [`TaskBackend`] and polled
//! until they reach a terminal status. There is no real inference pipeline
//! behind the console yet: [`SimulatedTaskBackend`] stands in for one,
//! advancing progress a step per poll and answering with a canned result.
//! A genuine backend only has to implement `submit` and `poll`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;

/// Task identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    /// Generate a new unique task ID
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("task_{}", uuid::Uuid::new_v4().simple()))
    }

    /// Get the string value
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of file submitted for inference
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// Still image
    Image,
    /// Plain text
    Text,
    /// Video clip
    Video,
    /// Audio clip
    Audio,
}

impl FileType {
    /// Parse a file type name (case-insensitive)
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "image" => Some(Self::Image),
            "text" => Some(Self::Text),
            "video" => Some(Self::Video),
            "audio" => Some(Self::Audio),
            _ => None,
        }
    }

    /// Lowercase name
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Text => "text",
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Status of an inference task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Created, not started
    Pending,
    /// Making progress
    Processing,
    /// Finished with a result
    Completed,
    /// Gave up
    Failed,
}

impl TaskStatus {
    /// Human-readable label
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Processing => "Processing",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        }
    }

    /// Whether the task will not change any more
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// What to run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRequest {
    /// Name of the uploaded file
    pub file_name: Option<String>,
    /// Kind of file
    pub file_type: FileType,
    /// Model to run it through
    pub model: String,
}

impl TaskRequest {
    /// Create a request without a file name
    pub fn new(file_type: FileType, model: impl Into<String>) -> Self {
        Self {
            file_name: None,
            file_type,
            model: model.into(),
        }
    }

    /// Set the file name
    #[must_use]
    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }
}

/// An inference task record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InferenceTask {
    /// Unique task identifier
    pub id: TaskId,
    /// Name of the uploaded file
    pub file_name: String,
    /// Kind of file
    pub file_type: FileType,
    /// Model running the task
    pub model: String,
    /// Current status
    pub status: TaskStatus,
    /// Progress percentage (0-100)
    pub progress: f32,
    /// Result text (when completed)
    pub result: Option<String>,
    /// When the task was created
    pub started_at: DateTime<Utc>,
    /// When the task reached a terminal status
    pub finished_at: Option<DateTime<Utc>>,
}

impl InferenceTask {
    /// Create a pending task from a request
    #[must_use]
    pub fn new(id: TaskId, request: TaskRequest) -> Self {
        Self {
            id,
            file_name: request
                .file_name
                .unwrap_or_else(|| "uploaded_file".to_string()),
            file_type: request.file_type,
            model: request.model,
            status: TaskStatus::Pending,
            progress: 0.0,
            result: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Advance progress; completes the task at 100
    pub fn advance(&mut self, step: f32) {
        if self.status.is_terminal() {
            return;
        }

        self.progress = (self.progress + step.max(0.0)).min(100.0);
        if self.progress >= 100.0 {
            self.status = TaskStatus::Completed;
            self.finished_at = Some(Utc::now());
            self.result = Some(canned_result(self.file_type, &self.model).to_string());
        } else {
            self.status = TaskStatus::Processing;
        }
    }

    /// Give up on the task; terminal tasks are left alone
    pub fn fail(&mut self) {
        if self.status.is_terminal() {
            return;
        }
        self.status = TaskStatus::Failed;
        self.finished_at = Some(Utc::now());
    }
}

/// Canned result for a `(file_type, model)` pair
#[must_use]
pub fn canned_result(file_type: FileType, model: &str) -> &'static str {
    match (file_type, model) {
        (FileType::Image, "ResNet-50") => {
            "Recognized: cat (95.2%), sofa (87.1%), window (76.3%)"
        }
        (FileType::Image, "YOLO-v8") => {
            "Detected 3 objects: person (92.1%), car (88.7%), traffic sign (85.4%)"
        }
        (FileType::Image, "EfficientNet") => {
            "Classified: landscape photo (91.8%), natural scene (89.2%)"
        }
        (FileType::Text, "BERT") => {
            "Sentiment: positive (78.5%); topic: technical discussion; keywords: AI, machine learning, innovation"
        }
        (FileType::Text, "Qwen-7B") => {
            "Summary: a technical article on AI progress, mainly discussing applications of machine learning."
        }
        (FileType::Video, "3D-CNN") => {
            "Actions: walking (89.1%), waving (76.8%); scene: office"
        }
        (FileType::Video, "LSTM") => {
            "Sequence analysis: 5 key actions detected, temporal pattern recognition complete"
        }
        (FileType::Audio, "Whisper") => {
            "Transcript: Hello, welcome to the speech recognition system. Accuracy: 94.2%"
        }
        (FileType::Audio, "Wav2Vec") => {
            "Speaker: male, roughly 30-35 years old, calm"
        }
        _ => "Analysis complete, results generated.",
    }
}

/// Inference task collaborator
#[async_trait]
pub trait TaskBackend: Send + Sync {
    /// Create a task
    async fn submit(&self, request: TaskRequest) -> Result<InferenceTask, BackendError>;

    /// Fetch the latest state of a task
    async fn poll(&self, id: &TaskId) -> Result<InferenceTask, BackendError>;
}

type StepFn = Arc<dyn Fn() -> f32 + Send + Sync>;

/// In-memory stand-in for a real inference pipeline
#[derive(Clone)]
pub struct SimulatedTaskBackend {
    tasks: Arc<Mutex<HashMap<TaskId, InferenceTask>>>,
    step: StepFn,
}

impl SimulatedTaskBackend {
    /// Progress advances by a random amount in `[0, 20)` per poll
    #[must_use]
    pub fn new() -> Self {
        Self::with_step(|| rand::thread_rng().gen_range(0.0..20.0))
    }

    /// Progress advances by whatever `step` returns per poll
    pub fn with_step(step: impl Fn() -> f32 + Send + Sync + 'static) -> Self {
        Self {
            tasks: Arc::new(Mutex::new(HashMap::new())),
            step: Arc::new(step),
        }
    }

    /// Number of tasks known to the simulator
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Whether no task has been submitted
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }
}

impl Default for SimulatedTaskBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskBackend for SimulatedTaskBackend {
    async fn submit(&self, request: TaskRequest) -> Result<InferenceTask, BackendError> {
        let task = InferenceTask::new(TaskId::generate(), request);
        tracing::debug!(task_id = %task.id, model = %task.model, "Simulated task created");
        self.tasks.lock().insert(task.id.clone(), task.clone());
        Ok(task)
    }

    async fn poll(&self, id: &TaskId) -> Result<InferenceTask, BackendError> {
        let step = (self.step)();
        let mut tasks = self.tasks.lock();
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| BackendError::Other(format!("unknown task {id}")))?;
        task.advance(step);
        Ok(task.clone())
    }
}
