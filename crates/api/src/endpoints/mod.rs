//! Blog-service API endpoints.

mod auth;
mod comments;
mod health;
mod images;
mod posts;
mod subscriptions;
mod users;

use axum::Router;

use crate::middleware::AppState;

pub use auth::UserResponse;
pub use comments::CommentResponse;
pub use images::ImageResponse;
pub use posts::PostResponse;
pub use subscriptions::SubscriptionResponse;

/// Create the blog API router, to be nested under `/api/v1`.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .nest("/posts", posts::router())
        .nest("/comments", comments::router())
        .nest("/images", images::router())
        .nest("/subscriptions", subscriptions::router())
}
