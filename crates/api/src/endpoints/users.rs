//! User endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use quill_common::AppResult;
use quill_core::UpdateUserInput;

use super::auth::UserResponse;
use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{ApiResponse, no_content},
};

async fn me(AuthUser(user): AuthUser) -> ApiResponse<UserResponse> {
    ApiResponse::ok(user.into())
}

async fn list(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<UserResponse>>> {
    let users = state.user_service.list(&user).await?;
    Ok(ApiResponse::ok(users.into_iter().map(Into::into).collect()))
}

async fn show(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<UserResponse>> {
    let found = state.user_service.get(&user, &id).await?;
    Ok(ApiResponse::ok(found.into()))
}

async fn update(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateUserInput>,
) -> AppResult<ApiResponse<UserResponse>> {
    let updated = state.user_service.update(&user, &id, input).await?;
    Ok(ApiResponse::ok(updated.into()))
}

async fn delete(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.user_service.delete(&user, &id).await?;
    Ok(no_content())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/me", get(me))
        .route("/{id}", get(show).put(update).delete(delete))
}
