//! HTTP API handlers.

pub mod prices;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use scope_core::ScopeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
	#[error("{0}")]
	BadRequest(String),
	#[error("{0}")]
	NotFound(String),
	#[error("{0}")]
	Internal(String),
}

impl From<ScopeError> for ApiError {
	fn from(err: ScopeError) -> Self {
		match err {
			ScopeError::BadSlot { .. } => ApiError::BadRequest(err.to_string()),
			ScopeError::NoMapping(_) | ScopeError::UnknownFeed(_) => ApiError::NotFound(err.to_string()),
			other => ApiError::Internal(other.to_string()),
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let status = match &self {
			ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
			ApiError::NotFound(_) => StatusCode::NOT_FOUND,
			ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
		};
		if status.is_server_error() {
			tracing::warn!(error = %self, "API request failed");
		}
		(status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
	}
}
