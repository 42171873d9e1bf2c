//! Registration and magic link login endpoints.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use quill_common::AppResult;
use quill_core::{AuthToken, LoginInput, RegisterInput};
use quill_db::entities::user;
use serde::{Deserialize, Serialize};

use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{ApiResponse, Message},
};

/// Public view of a user.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: user::UserRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture_url: Option<String>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl From<user::Model> for UserResponse {
    fn from(u: user::Model) -> Self {
        Self {
            id: u.id,
            username: u.username,
            first_name: u.first_name,
            last_name: u.last_name,
            email: u.email,
            role: u.role,
            profile_picture_url: u.profile_picture_url,
            created_at: u.created_at.to_rfc3339(),
            updated_at: u.updated_at.map(|t| t.to_rfc3339()),
        }
    }
}

async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterInput>,
) -> AppResult<ApiResponse<UserResponse>> {
    let user = state.auth_service.register(input).await?;
    Ok(ApiResponse::created(user.into()))
}

async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginInput>,
) -> AppResult<ApiResponse<Message>> {
    state.auth_service.login(input).await?;
    Ok(ApiResponse::ok(Message::new(
        "Magic link sent to your email. Please check your inbox and click the link to sign in.",
    )))
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: String,
}

async fn verify_magic_link(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> AppResult<ApiResponse<AuthToken>> {
    let token = state.auth_service.verify_magic_link(&query.token).await?;
    Ok(ApiResponse::ok(token))
}

async fn refresh_token(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<AuthToken>> {
    let token = state.auth_service.refresh(&user)?;
    Ok(ApiResponse::ok(token))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/verify-magic-link", get(verify_magic_link))
        .route("/refresh-token", post(refresh_token))
}
