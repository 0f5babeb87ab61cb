//! Screening web server
//!
//! Serves the diagnosis form UI and a JSON API for training, evaluation and
//! prediction.

mod api;
mod error;
mod handlers;
mod state;

pub use api::create_router;
pub use error::ServerError;
pub use state::AppState;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::preprocessing::DatasetLayout;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub models_dir: PathBuf,
    pub max_upload_size: usize,
    pub layout: DatasetLayout,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let layout = match std::env::var("HEPASCREEN_LAYOUT") {
            Ok(name) => name.parse().unwrap_or_else(|e: String| {
                warn!(error = %e, "Falling back to the default dataset layout");
                DatasetLayout::default()
            }),
            Err(_) => DatasetLayout::default(),
        };

        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            models_dir: std::env::var("MODELS_DIR")
                .unwrap_or_else(|_| "./models".to_string())
                .into(),
            max_upload_size: std::env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(20 * 1024 * 1024), // 20MB
            layout,
        }
    }
}

impl ServerConfig {
    pub fn with_models_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.models_dir = dir.into();
        self
    }

    pub fn with_layout(mut self, layout: DatasetLayout) -> Self {
        self.layout = layout;
        self
    }
}

/// Start the server with the given configuration
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let start_time = chrono::Utc::now();
    info!(
        models_dir = %config.models_dir.display(),
        started_at = %start_time.to_rfc3339(),
        "Initializing server"
    );

    std::fs::create_dir_all(&config.models_dir)?;

    let state = Arc::new(AppState::new(config.clone()));
    let app = create_router(state, &config);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!(
        address = %addr,
        max_upload_size_mb = config.max_upload_size / 1024 / 1024,
        "Hepatitis screening server starting"
    );
    info!(url = %format!("http://{}", addr), "Web UI available");
    info!(url = %format!("http://{}/api/health", addr), "Health endpoint available");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl+c");
            return;
        }
        let uptime = chrono::Utc::now().signed_duration_since(start_time);
        info!(uptime_secs = uptime.num_seconds(), "Shutdown signal received, stopping server");
    };

    info!("Server started (press ctrl+c to stop)");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}
