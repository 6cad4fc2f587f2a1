//! Exam Proctoring API Server
//!
//! REST surface over the session controller, the stored session records,
//! and the analytics summary.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use camera_capture::{open_source, CameraConfig, CameraError, FrameSource};
use inference_engine::{ObjectDetector, OnnxObjectDetector};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use session::{SessionController, SessionPhase};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use storage::Repository;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

mod error;
mod routes;
pub mod settings;

pub use error::ApiError;
pub use settings::Settings;

/// Opens the capture source for a new session
pub type SourceFactory =
    Arc<dyn Fn(&CameraConfig) -> Result<Box<dyn FrameSource>, CameraError> + Send + Sync>;

pub type SharedState = Arc<RwLock<AppState>>;

/// Application state shared across handlers
pub struct AppState {
    /// Session record store
    pub repository: Arc<Repository>,
    /// Controller for the current (or last) session
    pub controller: SessionController,
    pub settings: Settings,
    /// `None` when no model is configured or it failed to load
    pub detector: Option<Arc<dyn ObjectDetector>>,
    /// Prometheus render handle, when the recorder is installed
    pub metrics: Option<PrometheusHandle>,
    pub version: String,
    pub start_time: Instant,
    source_factory: SourceFactory,
}

impl AppState {
    /// Create state that opens the configured camera for each session
    pub fn new(
        settings: Settings,
        repository: Arc<Repository>,
        detector: Option<Arc<dyn ObjectDetector>>,
    ) -> Self {
        Self::with_source_factory(settings, repository, detector, Arc::new(open_source))
    }

    pub fn with_source_factory(
        settings: Settings,
        repository: Arc<Repository>,
        detector: Option<Arc<dyn ObjectDetector>>,
        source_factory: SourceFactory,
    ) -> Self {
        let controller = SessionController::new(
            settings.session.clone(),
            detector.clone(),
            Arc::clone(&repository),
        );

        Self {
            repository,
            controller,
            settings,
            detector,
            metrics: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: Instant::now(),
            source_factory,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Swap in a fresh controller once the previous session has ended
    pub(crate) fn ready_controller(&mut self) -> &mut SessionController {
        if self.controller.phase() == SessionPhase::Ended {
            self.controller = SessionController::new(
                self.settings.session.clone(),
                self.detector.clone(),
                Arc::clone(&self.repository),
            );
        }
        &mut self.controller
    }

    pub(crate) fn source_factory(&self) -> SourceFactory {
        Arc::clone(&self.source_factory)
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub session_phase: SessionPhase,
    pub stored_sessions: usize,
    pub object_detection: bool,
}

/// Create the application router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/session", post(routes::session::start_session))
        .route("/api/v1/session/end", post(routes::session::end_session))
        .route("/api/v1/session/live", get(routes::session::live_status))
        .route(
            "/api/v1/sessions",
            get(routes::records::list_sessions).delete(routes::records::clear_sessions),
        )
        .route("/api/v1/analytics", get(routes::records::analytics))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let state = state.read().await;

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        session_phase: state.controller.phase(),
        stored_sessions: state.repository.len(),
        object_detection: state.detector.is_some(),
    })
}

/// Prometheus scrape endpoint
async fn metrics_handler(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    let state = state.read().await;
    let handle = state.metrics.as_ref().ok_or(ApiError::MetricsUnavailable)?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    ))
}

/// Initialize logging
pub fn init_logging(
    level: &str,
    json: bool,
) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let parsed = level.parse::<Level>().ok();
    let max_level = parsed.unwrap_or(Level::INFO);

    let builder = FmtSubscriber::builder()
        .with_max_level(max_level)
        .with_target(true);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }

    if parsed.is_none() {
        warn!("Unknown log level '{}', using info", level);
    }
    Ok(())
}

/// Load the object detector, if one is configured. Failure only disables
/// phone and object signals.
pub fn load_detector(settings: &settings::DetectorSettings) -> Option<Arc<dyn ObjectDetector>> {
    let path = settings.model_path.as_deref()?;

    match OnnxObjectDetector::load(Path::new(path), settings.onnx.clone()) {
        Ok(detector) => {
            info!("Object detector ready ({})", path);
            Some(Arc::new(detector))
        }
        Err(e) => {
            warn!("Object detector unavailable, continuing without it: {}", e);
            None
        }
    }
}

/// Open the session store described by the settings
pub fn open_repository(settings: &settings::StorageSettings) -> anyhow::Result<Repository> {
    let Some(path) = settings.path.as_deref() else {
        return Ok(Repository::new());
    };

    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(Repository::open(path)?)
}

/// Run the server
pub async fn run_server(settings: Settings) -> anyhow::Result<()> {
    let metrics = PrometheusBuilder::new().install_recorder()?;
    let repository = Arc::new(open_repository(&settings.storage)?);
    let detector = load_detector(&settings.detector);
    let addr = settings.server.addr.clone();

    let state = AppState::new(settings, repository, detector).with_metrics(metrics);
    let app = create_router(Arc::new(RwLock::new(state)));

    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
