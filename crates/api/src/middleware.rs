//! API middleware.

#![allow(missing_docs)]

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use quill_core::{
    AuthService, ClapService, CommentService, ImageService, PostService, SubscriptionService,
    UserService,
};

/// Blog-service application state.
#[derive(Clone)]
pub struct AppState {
    pub auth_service: AuthService,
    pub user_service: UserService,
    pub post_service: PostService,
    pub clap_service: ClapService,
    pub comment_service: CommentService,
    pub image_service: ImageService,
    pub subscription_service: SubscriptionService,
}

/// Authentication middleware.
///
/// A valid bearer token puts the caller's `user::Model` into the request
/// extensions. Missing or invalid tokens leave the request anonymous; handlers
/// that need a user reject it through [`crate::extractors::AuthUser`].
pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(TypedHeader(Authorization(bearer))) = bearer {
        match state.auth_service.authenticate(bearer.token()).await {
            Ok(user) => {
                req.extensions_mut().insert(user);
            }
            Err(e) => tracing::debug!(error = %e, "Bearer token rejected"),
        }
    }

    next.run(req).await
}
