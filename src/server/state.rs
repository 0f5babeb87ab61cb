//! Application state management

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::data::TableLoader;
use crate::error::Result;
use crate::pipeline::{PipelineConfig, ScreeningService};

use super::ServerConfig;

/// Application state shared across handlers
pub struct AppState {
    pub config: ServerConfig,
    /// One action at a time; handlers lock it on the blocking pool
    pub service: Mutex<ScreeningService>,
    pub loader: TableLoader,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let pipeline_config = PipelineConfig::default().with_layout(config.layout.clone());
        let service = ScreeningService::open(pipeline_config, &config.models_dir);
        Self {
            config,
            service: Mutex::new(service),
            loader: TableLoader::new(),
            started_at: Utc::now(),
        }
    }

    /// Run `f` against the service on the blocking pool
    pub async fn with_service<T, F>(self: &Arc<Self>, f: F) -> super::error::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut ScreeningService) -> Result<T> + Send + 'static,
    {
        let state = Arc::clone(self);
        let result = tokio::task::spawn_blocking(move || {
            let mut service = state.service.lock();
            f(&mut service)
        })
        .await
        .map_err(|e| super::ServerError::Internal(format!("worker task failed: {}", e)))?;
        Ok(result?)
    }
}
