//! Liveness endpoint.

use crate::server::AppState;
use axum::{extract::State, response::Json};
use chrono::Utc;
use ecospin_types::{HealthResponse, HealthSummary};

fn persistence_label(mode: &str) -> &'static str {
	match mode {
		"file" => "JSON file storage",
		"sqlite" => "SQLite database",
		"memory" => "In-memory (not persisted)",
		_ => "Unknown",
	}
}

/// Handles GET /api/health requests.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
	let summary = state.engine.summary().await;
	let info = state.engine.persistence();

	Json(HealthResponse {
		status: "OK".to_string(),
		timestamp: Utc::now(),
		orders_summary: HealthSummary::from(&summary),
		mode: "manual_payments".to_string(),
		business_number: state.engine.config().business.mpesa_number.clone(),
		email_configured: state.engine.notifications_configured(),
		persistence: persistence_label(info.mode).to_string(),
		data_location: info.location,
	})
}
