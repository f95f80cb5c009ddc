//! HTTP server exposing the feed's prices.

use crate::apis::prices;
use axum::http::{HeaderValue, Method};
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use scope_config::ApiConfig;
use scope_core::ScopeContext;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Builds the router; separate from [`start_server`] so tests can call it.
pub fn router(api_config: &ApiConfig, context: Arc<ScopeContext>) -> Router {
	Router::new()
		.route("/health", get(health))
		.nest(
			"/api",
			Router::new()
				.route("/prices", get(prices::list_prices))
				.route("/prices/{slot}", get(prices::get_price)),
		)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(TimeoutLayer::new(Duration::from_secs(api_config.timeout_seconds)))
				.layer(cors_layer(api_config)),
		)
		.with_state(context)
}

pub async fn start_server(
	api_config: ApiConfig,
	context: Arc<ScopeContext>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(&api_config, context);
	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Scope API server starting on {}", bind_address);
	axum::serve(listener, app).await?;
	Ok(())
}

fn cors_layer(api_config: &ApiConfig) -> CorsLayer {
	let origins: Vec<HeaderValue> = api_config
		.cors
		.as_ref()
		.map(|cors| {
			cors.allowed_origins
				.iter()
				.filter_map(|origin| match origin.parse() {
					Ok(value) => Some(value),
					Err(e) => {
						tracing::warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
						None
					},
				})
				.collect()
		})
		.unwrap_or_default();

	if origins.is_empty() {
		return CorsLayer::permissive();
	}
	CorsLayer::new()
		.allow_origin(origins)
		.allow_methods([Method::GET])
		.allow_headers(Any)
}

async fn health(State(context): State<Arc<ScopeContext>>) -> Json<serde_json::Value> {
	let feed = context.config().feed.id.clone();
	let initialized = context.feed().await.is_ok();
	Json(serde_json::json!({
		"status": "ok",
		"feed": feed,
		"initialized": initialized,
	}))
}
