//! Post and clap endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use quill_common::AppResult;
use quill_core::{CreatePostInput, UpdatePostInput};
use quill_db::entities::post;
use serde::{Deserialize, Serialize};

use crate::{
    extractors::{AuthUser, MaybeAuthUser},
    middleware::AppState,
    response::{ApiResponse, Message, no_content},
};

/// Post response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub id: String,
    pub title: String,
    pub content: String,
    pub author_id: String,
    pub status: post::PostStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured_image_id: Option<String>,
    pub claps_count: i64,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl From<post::Model> for PostResponse {
    fn from(p: post::Model) -> Self {
        Self {
            id: p.id,
            title: p.title,
            content: p.content,
            author_id: p.author_id,
            status: p.status,
            image_url: p.image_url,
            featured_image_id: p.featured_image_id,
            claps_count: p.claps_count,
            created_at: p.created_at.to_rfc3339(),
            updated_at: p.updated_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Clap count response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClapCountResponse {
    pub post_id: String,
    pub count: i64,
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    query: Option<String>,
}

async fn list(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> AppResult<ApiResponse<Vec<PostResponse>>> {
    let posts = state.post_service.list(q.query.as_deref()).await?;
    Ok(ApiResponse::ok(posts.into_iter().map(Into::into).collect()))
}

async fn show(
    MaybeAuthUser(viewer): MaybeAuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<PostResponse>> {
    let post = state.post_service.get(viewer.as_ref(), &id).await?;
    Ok(ApiResponse::ok(post.into()))
}

async fn by_author(
    State(state): State<AppState>,
    Path(author_id): Path<String>,
) -> AppResult<ApiResponse<Vec<PostResponse>>> {
    let posts = state.post_service.by_author(&author_id).await?;
    Ok(ApiResponse::ok(posts.into_iter().map(Into::into).collect()))
}

async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreatePostInput>,
) -> AppResult<ApiResponse<PostResponse>> {
    let post = state.post_service.create(&user, input).await?;
    Ok(ApiResponse::created(post.into()))
}

async fn update(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdatePostInput>,
) -> AppResult<ApiResponse<PostResponse>> {
    let post = state.post_service.update(&user, &id, input).await?;
    Ok(ApiResponse::ok(post.into()))
}

async fn delete(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.post_service.delete(&user, &id).await?;
    Ok(no_content())
}

async fn clap(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Message>> {
    state.clap_service.clap(&user.id, &id).await?;
    Ok(ApiResponse::ok(Message::new("Clapped")))
}

async fn unclap(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Message>> {
    state.clap_service.unclap(&user.id, &id).await?;
    Ok(ApiResponse::ok(Message::new("Clap removed")))
}

async fn clap_count(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<ClapCountResponse>> {
    let count = state.clap_service.count(&id).await?;
    Ok(ApiResponse::ok(ClapCountResponse { post_id: id, count }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(show).put(update).delete(delete))
        .route("/{id}/clap", post(clap).delete(unclap))
        .route("/{id}/claps/count", get(clap_count))
        .route("/author/{author_id}", get(by_author))
}
