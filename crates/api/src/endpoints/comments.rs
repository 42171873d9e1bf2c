//! Comment endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use chrono::{DateTime, Utc};
use quill_common::AppResult;
use quill_core::{
    CommentStatistics, CommentView, CreateCommentInput, ModerationInput, UpdateCommentInput,
};
use quill_db::entities::{comment, comment::CommentStatus};
use serde::{Deserialize, Serialize};

use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{ApiResponse, Page, no_content},
};

/// Comment response. Threaded listings fill `replies`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: String,
    pub content: String,
    pub author_id: String,
    pub post_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub status: CommentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moderated_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moderated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moderation_note: Option<String>,
    pub is_reply: bool,
    pub has_replies: bool,
    pub replies: Vec<CommentResponse>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl From<comment::Model> for CommentResponse {
    fn from(c: comment::Model) -> Self {
        Self {
            is_reply: c.is_reply(),
            has_replies: false,
            replies: Vec::new(),
            id: c.id,
            content: c.content,
            author_id: c.author_id,
            post_id: c.post_id,
            parent_id: c.parent_id,
            status: c.status,
            moderated_by: c.moderated_by,
            moderated_at: c.moderated_at.map(|t| t.to_rfc3339()),
            moderation_note: c.moderation_note,
            created_at: c.created_at.to_rfc3339(),
            updated_at: c.updated_at.map(|t| t.to_rfc3339()),
        }
    }
}

impl From<CommentView> for CommentResponse {
    fn from(view: CommentView) -> Self {
        let mut response = Self::from(view.comment);
        response.has_replies = view.has_replies;
        response.replies = view.replies.into_iter().map(Into::into).collect();
        response
    }
}

fn respond_all(comments: Vec<comment::Model>) -> ApiResponse<Vec<CommentResponse>> {
    ApiResponse::ok(comments.into_iter().map(Into::into).collect())
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    #[serde(default)]
    page: u64,
    #[serde(default = "default_size")]
    size: u64,
}

const fn default_size() -> u64 {
    10
}

#[derive(Debug, Deserialize)]
struct SinceQuery {
    since: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    keyword: String,
}

async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateCommentInput>,
) -> AppResult<ApiResponse<CommentResponse>> {
    let comment = state.comment_service.create(&user, input).await?;
    Ok(ApiResponse::created(comment.into()))
}

async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<CommentResponse>> {
    let comment = state.comment_service.get(&id).await?;
    Ok(ApiResponse::ok(comment.into()))
}

async fn update(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateCommentInput>,
) -> AppResult<ApiResponse<CommentResponse>> {
    let comment = state.comment_service.update(&user, &id, input).await?;
    Ok(ApiResponse::ok(comment.into()))
}

async fn delete(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.comment_service.delete(&user, &id).await?;
    Ok(no_content())
}

async fn moderate(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<ModerationInput>,
) -> AppResult<ApiResponse<CommentResponse>> {
    let comment = state.comment_service.moderate(&user, &id, input).await?;
    Ok(ApiResponse::ok(comment.into()))
}

async fn by_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<ApiResponse<Vec<CommentResponse>>> {
    let threads = state.comment_service.approved_by_post(&post_id).await?;
    Ok(ApiResponse::ok(threads.into_iter().map(Into::into).collect()))
}

async fn all_by_post(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<ApiResponse<Vec<CommentResponse>>> {
    let comments = state.comment_service.all_by_post(&user, &post_id).await?;
    Ok(respond_all(comments))
}

async fn by_post_paged(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Query(q): Query<PageQuery>,
) -> AppResult<ApiResponse<Page<CommentResponse>>> {
    let size = q.size.clamp(1, 100);
    let (comments, total) = state
        .comment_service
        .approved_by_post_paged(&post_id, q.page, size)
        .await?;
    let items = comments.into_iter().map(Into::into).collect();
    Ok(ApiResponse::ok(Page::new(items, q.page, size, total)))
}

async fn replies(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Vec<CommentResponse>>> {
    let comments = state.comment_service.replies(&id).await?;
    Ok(respond_all(comments))
}

async fn by_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<ApiResponse<Vec<CommentResponse>>> {
    let comments = state.comment_service.by_author(&user_id).await?;
    Ok(respond_all(comments))
}

async fn most_recent_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<ApiResponse<CommentResponse>> {
    let comment = state.comment_service.most_recent_by_user(&user_id).await?;
    Ok(ApiResponse::ok(comment.into()))
}

async fn by_status(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(status): Path<CommentStatus>,
) -> AppResult<ApiResponse<Vec<CommentResponse>>> {
    let comments = state.comment_service.by_status(&user, status).await?;
    Ok(respond_all(comments))
}

async fn pending(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<CommentResponse>>> {
    let comments = state.comment_service.pending(&user).await?;
    Ok(respond_all(comments))
}

async fn statistics(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<CommentStatistics>> {
    let stats = state.comment_service.statistics(&user).await?;
    Ok(ApiResponse::ok(stats))
}

async fn recent(
    State(state): State<AppState>,
    Query(q): Query<SinceQuery>,
) -> AppResult<ApiResponse<Vec<CommentResponse>>> {
    let comments = state.comment_service.created_after(q.since).await?;
    Ok(respond_all(comments))
}

async fn search(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> AppResult<ApiResponse<Vec<CommentResponse>>> {
    let comments = state.comment_service.search(&q.keyword).await?;
    Ok(respond_all(comments))
}

async fn check(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<ApiResponse<bool>> {
    let commented = state
        .comment_service
        .has_user_commented(&user.id, &post_id)
        .await?;
    Ok(ApiResponse::ok(commented))
}

async fn count_by_status(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(status): Path<CommentStatus>,
) -> AppResult<ApiResponse<u64>> {
    let count = state.comment_service.count_by_status(&user, status).await?;
    Ok(ApiResponse::ok(count))
}

async fn count_by_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<ApiResponse<u64>> {
    let count = state.comment_service.count_by_post(&post_id).await?;
    Ok(ApiResponse::ok(count))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create))
        .route("/{id}", get(show).put(update).delete(delete))
        .route("/{id}/moderate", put(moderate))
        .route("/{id}/replies", get(replies))
        .route("/post/{post_id}", get(by_post))
        .route("/post/{post_id}/all", get(all_by_post))
        .route("/post/{post_id}/page", get(by_post_paged))
        .route("/user/{user_id}", get(by_user))
        .route("/user/{user_id}/recent", get(most_recent_by_user))
        .route("/status/{status}", get(by_status))
        .route("/pending", get(pending))
        .route("/statistics", get(statistics))
        .route("/recent", get(recent))
        .route("/search", get(search))
        .route("/check/{post_id}", get(check))
        .route("/count/status/{status}", get(count_by_status))
        .route("/count/post/{post_id}", get(count_by_post))
}
