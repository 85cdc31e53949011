//! Model Registry
//!
//! Single-shot wrappers over the model collaborator. Nothing is cached here;
//! the last known values are held by the session until the next call.
//!
//! Having no model loaded is an ordinary state: [`ModelRegistry::current_model`]
//! answers `None` instead of failing.

use std::sync::Arc;

use crate::backend::{HealthStatus, ModelApi, ModelInfo};
use crate::error::BackendError;

/// Everything the console shows about models, fetched together
#[derive(Clone, Debug, PartialEq)]
pub struct RegistrySnapshot {
    /// Served models
    pub models: Vec<ModelInfo>,
    /// Loaded model, if any
    pub current: Option<ModelInfo>,
    /// Health report
    pub health: HealthStatus,
}

/// Thin wrapper over a [`ModelApi`]
pub struct ModelRegistry<M: ModelApi> {
    api: Arc<M>,
}

impl<M: ModelApi> Clone for ModelRegistry<M> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
        }
    }
}

impl<M: ModelApi> ModelRegistry<M> {
    /// Create a registry over a model collaborator
    pub fn new(api: Arc<M>) -> Self {
        Self { api }
    }

    /// List served models
    ///
    /// # Errors
    ///
    /// Propagates collaborator failures.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, BackendError> {
        self.api.get_models().await
    }

    /// Currently loaded model; `None` when nothing is loaded
    pub async fn current_model(&self) -> Option<ModelInfo> {
        match self.api.get_current_model().await {
            Ok(model) => Some(model),
            Err(e) => {
                tracing::info!(reason = %e, "No model currently loaded");
                None
            }
        }
    }

    /// Backend health report
    ///
    /// # Errors
    ///
    /// Propagates collaborator failures.
    pub async fn check_health(&self) -> Result<HealthStatus, BackendError> {
        self.api.get_health().await
    }

    /// Ask the backend to load another model
    ///
    /// # Errors
    ///
    /// Propagates the backend's rejection.
    pub async fn switch_model(&self, name: &str) -> Result<(), BackendError> {
        tracing::info!(model = %name, "Switching model");
        self.api.switch_model(name).await
    }

    /// Fetch models, current model and health in that order
    ///
    /// # Errors
    ///
    /// Fails if listing models or the health check fails. A missing current
    /// model is not a failure.
    pub async fn snapshot(&self) -> Result<RegistrySnapshot, BackendError> {
        let models = self.list_models().await?;
        tracing::debug!(count = models.len(), "Loaded model list");

        let current = self.current_model().await;
        let health = self.check_health().await?;

        Ok(RegistrySnapshot {
            models,
            current,
            health,
        })
    }
}
