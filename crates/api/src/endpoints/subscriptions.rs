//! Newsletter subscription endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, put},
};
use quill_common::AppResult;
use quill_core::{SubscribeInput, SubscriptionStatistics, ensure_admin};
use quill_db::entities::{
    subscription,
    subscription::{NotificationType, SubscriptionStatus},
};
use serde::{Deserialize, Serialize};

use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{ApiResponse, Message},
};

/// Subscription response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResponse {
    pub id: String,
    pub email: String,
    pub token: String,
    pub status: SubscriptionStatus,
    pub notification_type: NotificationType,
    pub email_verified: bool,
    pub active: bool,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_notification_sent: Option<String>,
}

impl From<subscription::Model> for SubscriptionResponse {
    fn from(s: subscription::Model) -> Self {
        Self {
            id: s.id,
            email: s.email,
            token: s.token,
            status: s.status,
            notification_type: s.notification_type,
            email_verified: s.email_verified,
            active: s.active,
            created_at: s.created_at.to_rfc3339(),
            verified_at: s.verified_at.map(|t| t.to_rfc3339()),
            last_notification_sent: s.last_notification_sent.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreferencesQuery {
    notification_type: NotificationType,
}

async fn subscribe(
    State(state): State<AppState>,
    Json(input): Json<SubscribeInput>,
) -> AppResult<ApiResponse<SubscriptionResponse>> {
    let subscription = state.subscription_service.subscribe(input).await?;
    Ok(ApiResponse::created(subscription.into()))
}

async fn verify(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<ApiResponse<SubscriptionResponse>> {
    let subscription = state.subscription_service.verify(&token).await?;
    Ok(ApiResponse::ok(subscription.into()))
}

async fn show(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<ApiResponse<SubscriptionResponse>> {
    let subscription = state.subscription_service.get_by_token(&token).await?;
    Ok(ApiResponse::ok(subscription.into()))
}

async fn unsubscribe(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<ApiResponse<Message>> {
    state.subscription_service.unsubscribe(&token).await?;
    Ok(ApiResponse::ok(Message::new("Successfully unsubscribed")))
}

async fn update_preferences(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(q): Query<PreferencesQuery>,
) -> AppResult<ApiResponse<SubscriptionResponse>> {
    let subscription = state
        .subscription_service
        .update_preferences(&token, q.notification_type)
        .await?;
    Ok(ApiResponse::ok(subscription.into()))
}

async fn by_email(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> AppResult<ApiResponse<SubscriptionResponse>> {
    ensure_admin(&user)?;
    let subscription = state.subscription_service.get_by_email(&email).await?;
    Ok(ApiResponse::ok(subscription.into()))
}

async fn list_active(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<SubscriptionResponse>>> {
    ensure_admin(&user)?;
    let subscriptions = state.subscription_service.list_active().await?;
    Ok(ApiResponse::ok(
        subscriptions.into_iter().map(Into::into).collect(),
    ))
}

async fn statistics(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<SubscriptionStatistics>> {
    ensure_admin(&user)?;
    let stats = state.subscription_service.statistics().await?;
    Ok(ApiResponse::ok(stats))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_active).post(subscribe))
        .route("/statistics", get(statistics))
        .route("/verify/{token}", get(verify))
        .route("/email/{email}", get(by_email))
        .route("/{token}", get(show).delete(unsubscribe))
        .route("/{token}/preferences", put(update_preferences))
}
