//! Session Routes

use axum::{extract::State, http::StatusCode, Json};
use session::{LiveStatus, SessionRequest};
use storage::SessionRecord;
use tracing::info;

use crate::{ApiError, SharedState};

/// Start a session on the configured camera
pub async fn start_session(
    State(state): State<SharedState>,
    Json(request): Json<SessionRequest>,
) -> Result<(StatusCode, Json<LiveStatus>), ApiError> {
    let mut state = state.write().await;
    let open_camera = state.source_factory();

    let controller = state.ready_controller();
    controller.start(request, |camera| open_camera(camera))?;

    let status = controller.live_status();
    info!(
        "Monitoring {} for {}",
        status.student_name.as_deref().unwrap_or_default(),
        status.exam_name.as_deref().unwrap_or_default()
    );
    Ok((StatusCode::CREATED, Json(status)))
}

/// End the active session; `null` when it already ended
pub async fn end_session(
    State(state): State<SharedState>,
) -> Result<Json<Option<SessionRecord>>, ApiError> {
    let mut state = state.write().await;
    let record = state.controller.end().await?;
    Ok(Json(record))
}

/// Current live status
pub async fn live_status(State(state): State<SharedState>) -> Json<LiveStatus> {
    let state = state.read().await;
    Json(state.controller.live_status())
}
