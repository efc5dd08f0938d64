//! Outcome-to-status mapping for webhook handling.
//!
//! Three terminal outcomes exist for a delivery: rejected (bad signature),
//! unparseable, or failed upstream (token exchange or git). Ignored and
//! successful deliveries are plain 200 responses, not errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::remediate::RemediateError;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("invalid webhook signature")]
    InvalidSignature,
    #[error("malformed webhook payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
    #[error(transparent)]
    Remediation(#[from] RemediateError),
    #[error(transparent)]
    Upstream(#[from] anyhow::Error),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        match self {
            WebhookError::InvalidSignature => {
                (StatusCode::UNAUTHORIZED, "Invalid signature").into_response()
            }
            WebhookError::MalformedPayload(e) => {
                tracing::warn!(error = %e, "Failed to parse webhook payload");
                (StatusCode::BAD_REQUEST, "Malformed payload").into_response()
            }
            WebhookError::Remediation(e) => {
                tracing::error!(error = %e, "Remediation failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "error").into_response()
            }
            WebhookError::Upstream(e) => {
                tracing::error!(error = %e, "Webhook handling failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "error").into_response()
            }
        }
    }
}
