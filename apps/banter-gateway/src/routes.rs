use axum::{
	Json, Router,
	extract::State,
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;

use banter_domain::content::WebhookPayload;
use banter_service::Error as ServiceError;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/webhook", post(webhook))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

/// Ingests the payload synchronously, then dispatches on a spawned task so
/// slow collaborator calls never delay webhook acknowledgment.
async fn webhook(
	State(state): State<AppState>,
	Json(payload): Json<WebhookPayload>,
) -> Result<StatusCode, ApiError> {
	let message = match state.service.ingest(&payload).await {
		Ok(message) => message,
		Err(ServiceError::Address(err)) => {
			// Unparseable addresses are dropped, not bounced; the platform
			// would just redeliver them.
			tracing::warn!(error = %err, "Dropping a payload with an unparseable address.");

			return Ok(StatusCode::OK);
		},
		Err(ServiceError::InvalidRequest { message }) => {
			return Err(ApiError::new(StatusCode::BAD_REQUEST, message));
		},
		Err(err) => {
			return Err(ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()));
		},
	};
	let service = state.service.clone();

	tokio::spawn(async move {
		if let Err(err) = service.dispatch(&message).await {
			tracing::error!(
				message_id = %message.message_id,
				error = %err,
				"Dispatch failed."
			);
		}
	});

	Ok(StatusCode::OK)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, message: impl Into<String>) -> Self {
		Self { status, message: message.into() }
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		(self.status, Json(ErrorBody { message: self.message })).into_response()
	}
}
