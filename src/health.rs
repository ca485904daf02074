use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;

use crate::api::envelope;
use crate::state::AppState;
use crate::store::ReportStore;

/// Store health: 200 when the store answers a ping, otherwise 503.
pub async fn db_health(State(state): State<AppState>) -> impl IntoResponse {
	match state.store.ping().await {
		Ok(()) => envelope::success(json!({ "database": "ok" })).into_response(),
		Err(e) => {
			log::warn!("health check failed: {}", e);
			envelope::error(StatusCode::SERVICE_UNAVAILABLE, &format!("db error: {}", e))
		}
	}
}

/// Prometheus metrics endpoint: returns metrics in Prometheus text format
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
	(StatusCode::OK, state.metrics.encode())
}
