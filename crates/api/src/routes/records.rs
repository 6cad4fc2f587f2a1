//! Session Record Routes

use analytics::{summarize, AnalyticsSummary};
use axum::{extract::State, Json};
use serde::Serialize;
use storage::SessionRecord;

use crate::{ApiError, SharedState};

/// Response for the bulk clear endpoint
#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub cleared: usize,
}

/// All stored sessions, insertion order
pub async fn list_sessions(
    State(state): State<SharedState>,
) -> Result<Json<Vec<SessionRecord>>, ApiError> {
    let state = state.read().await;
    Ok(Json(state.repository.list()?))
}

/// Drop every stored session
pub async fn clear_sessions(
    State(state): State<SharedState>,
) -> Result<Json<ClearResponse>, ApiError> {
    let state = state.read().await;
    let cleared = state.repository.clear()?;
    record_cleared(cleared);
    Ok(Json(ClearResponse { cleared }))
}

fn record_cleared(cleared: usize) {
    tracing::info!("Cleared {} stored sessions", cleared);
    metrics::counter!("proctor_sessions_cleared_total").increment(cleared as u64);
}

/// Summary statistics over stored sessions
pub async fn analytics(
    State(state): State<SharedState>,
) -> Result<Json<AnalyticsSummary>, ApiError> {
    let state = state.read().await;
    let records = state.repository.list()?;
    Ok(Json(summarize(&records)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[test]
    fn test_clear_counts_removed_sessions() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            record_cleared(2);
            record_cleared(0);
            record_cleared(3);
        });

        let rendered = handle.render();
        assert!(
            rendered.contains("proctor_sessions_cleared_total 5"),
            "unexpected render: {}",
            rendered
        );
    }
}
