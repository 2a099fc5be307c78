//! Issues the single outbound call for a request and renders its outcome.

use crate::ai::{UpstreamPayload, UpstreamService};
use crate::models::StatusPolicy;
use crate::Error;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Forwards `payload` once and converts the result into the caller's response.
pub async fn relay(
    upstream: &dyn UpstreamService,
    payload: &UpstreamPayload,
    policy: StatusPolicy,
) -> Response {
    match upstream.forward(payload).await {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(e) => {
            error!("Caught {} generation error: {}", payload.label(), e);
            failure(&e, policy)
        }
    }
}

/// Renders any per-request failure as `{ "error": message }`.
pub fn failure(error: &Error, policy: StatusPolicy) -> Response {
    let body = ErrorBody {
        error: error.to_string(),
    };
    (status_for(error, policy), Json(body)).into_response()
}

pub fn status_for(error: &Error, policy: StatusPolicy) -> StatusCode {
    match (policy, error) {
        (StatusPolicy::Preserve, Error::UpstreamRejected { status, .. }) => {
            StatusCode::from_u16(*status)
                .ok()
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
