//! Email-service API: magic link issuing and redemption.
//!
//! These endpoints answer with bare JSON values rather than the
//! [`crate::response::ApiResponse`] wrapper, since the blog-service client
//! reads them directly.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use quill_common::AppError;
use quill_core::{MagicLinkRequest, MagicLinkService, mask_token};
use serde::{Deserialize, Serialize};

/// Email-service application state.
#[derive(Clone)]
pub struct EmailState {
    pub magic_link_service: MagicLinkService,
}

/// Outcome of a magic link request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MagicLinkResponse {
    pub email: String,
    pub message: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: String,
}

async fn send_magic_link(
    State(state): State<EmailState>,
    Json(request): Json<MagicLinkRequest>,
) -> Response {
    let email = request.email.clone();

    match state.magic_link_service.issue(request).await {
        Ok(issued) => Json(MagicLinkResponse {
            email: issued.email,
            message: "Magic link sent successfully".to_string(),
            expires_at: Some(issued.expires_at),
        })
        .into_response(),
        Err(e @ AppError::Validation { .. }) => e.into_response(),
        Err(e) => {
            tracing::error!(email = %email, error = %e, "Failed to send magic link");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(MagicLinkResponse {
                    email,
                    message: format!("Failed to send magic link email: {e}"),
                    expires_at: None,
                }),
            )
                .into_response()
        }
    }
}

/// Redeems the token: true for the first call only.
async fn validate_token(
    State(state): State<EmailState>,
    Query(q): Query<TokenQuery>,
) -> Json<bool> {
    Json(state.magic_link_service.redeem(&q.token).await)
}

async fn email_from_token(
    State(state): State<EmailState>,
    Query(q): Query<TokenQuery>,
) -> Json<Option<String>> {
    match state.magic_link_service.email_from_token(&q.token).await {
        Ok(email) => Json(email),
        Err(e) => {
            tracing::error!(token = %mask_token(&q.token), error = %e, "Token lookup failed");
            Json(None)
        }
    }
}

async fn health() -> &'static str {
    "Email Service is running"
}

/// Create the email router, to be nested under `/api/v1/email`.
pub fn router() -> Router<EmailState> {
    Router::new()
        .route("/magic-link", post(send_magic_link))
        .route("/validate-token", get(validate_token))
        .route("/email-from-token", get(email_from_token))
        .route("/health", get(health))
}
