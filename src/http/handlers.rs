//! HTTP handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::any::Any;
use std::sync::Arc;
use tracing::{error, info};

use super::auth::AuthenticatedUser;
use super::extract::ValidatedJson;
use super::problem::ApiError;
use super::state::AppState;
use crate::models::{TokenResponse, WebhookPayload};

/// Liveness probe.
pub async fn health() -> &'static str {
    "Healthy"
}

/// Accept a webhook delivery.
pub async fn receive_webhook(
    AuthenticatedUser(identity): AuthenticatedUser,
    ValidatedJson(payload): ValidatedJson<WebhookPayload>,
) -> StatusCode {
    info!(
        event_type = payload.event_type.as_deref().unwrap_or_default(),
        subject = ?identity.subject,
        "Webhook received"
    );
    StatusCode::OK
}

/// Issue a development bearer token. Only mounted when development mode is on.
pub async fn generate_token(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TokenResponse>, ApiError> {
    info!("Generating development token");

    if !state.authenticator.is_configured() {
        error!("JWT issuer, audience or key is not configured");
        return Err(ApiError::internal(
            "JWT Configuration Error",
            "Ensure jwt.issuer, jwt.audience and jwt.key are set in configuration.",
        ));
    }

    let token = state.authenticator.issue_development_token().map_err(|e| {
        error!(error = %e, "Failed to sign development token");
        ApiError::internal("JWT Configuration Error", e.to_string())
    })?;

    Ok(Json(TokenResponse { token }))
}

/// Fallback for unknown routes.
pub async fn not_found() -> ApiError {
    ApiError::NotFound
}

/// Convert a handler panic into a 500 problem response.
pub fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");

    let err = ApiError::internal(
        "An unexpected error occurred.",
        "An internal server error occurred. Please try again later or contact support.",
    );
    if let ApiError::Internal { trace_id, .. } = &err {
        error!(trace_id = %trace_id, panic = message, "Unhandled panic in request handler");
    }
    err.into_response()
}
