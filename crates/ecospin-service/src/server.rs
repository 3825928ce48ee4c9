//! HTTP server for the EcoSpin order API.
//!
//! Builds the router, applies the CORS, body-size, timeout and tracing
//! layers, and serves until the shutdown future resolves.

use crate::apis::{export, health, orders};
use axum::{
	extract::DefaultBodyLimit,
	http::StatusCode,
	response::{IntoResponse, Json},
	routing::{get, post, put},
	Router,
};
use ecospin_config::ApiConfig;
use ecospin_core::OrderEngine;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Reference to the order engine for processing requests.
	pub engine: Arc<OrderEngine>,
}

/// Builds the application router.
pub fn router(engine: Arc<OrderEngine>) -> Router {
	let api_config = engine.config().api.clone();
	let app_state = AppState { engine };

	Router::new()
		.nest(
			"/api",
			Router::new()
				.route("/create-order", post(orders::create_order))
				.route("/confirm-payment/{order_id}", post(orders::confirm_payment))
				.route(
					"/order/{order_id}",
					get(orders::get_order).delete(orders::delete_order),
				)
				.route("/order/{order_id}/status", put(orders::update_status))
				.route("/orders", get(orders::list_orders))
				.route("/health", get(health::health))
				.route("/export/csv", get(export::export_csv))
				.route("/backup", get(export::backup)),
		)
		.fallback(not_found)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(CorsLayer::permissive())
				.layer(TimeoutLayer::with_status_code(
					StatusCode::REQUEST_TIMEOUT,
					Duration::from_secs(api_config.timeout_seconds),
				))
				.layer(DefaultBodyLimit::max(api_config.max_request_size)),
		)
		.with_state(app_state)
}

async fn not_found() -> impl IntoResponse {
	(
		StatusCode::NOT_FOUND,
		Json(serde_json::json!({
			"success": false,
			"message": "Endpoint not found"
		})),
	)
}

/// Starts the HTTP server for the API.
pub async fn start_server<F>(
	api_config: ApiConfig,
	engine: Arc<OrderEngine>,
	shutdown: F,
) -> Result<(), Box<dyn std::error::Error>>
where
	F: Future<Output = ()> + Send + 'static,
{
	let app = router(engine);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("EcoSpin API server starting on {}", bind_address);

	axum::serve(listener, app)
		.with_graceful_shutdown(shutdown)
		.await?;

	tracing::info!("API server stopped");
	Ok(())
}
