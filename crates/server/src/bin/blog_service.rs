//! Blog-service entry point.

use std::sync::Arc;

use axum::{Router, extract::DefaultBodyLimit, middleware};
use quill_api::{AppState, auth_middleware, router as api_router};
use quill_common::{Config, LocalStorage};
use quill_core::{
    AuthService, ClapService, CommentService, EmailServiceClient, ImageService, JwtService,
    PostService, SubscriptionService, UserService, mailer_from_config,
};
use quill_db::repositories::{
    ClapRepository, CommentRepository, ImageRepository, NotificationLogRepository,
    PostRepository, SubscriptionRepository, UserRepository,
};
use quill_server::{init_tracing, serve, with_common_layers};
use tracing::info;

/// Multipart framing overhead allowed on top of the file size limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    info!("Starting blog-service...");

    let config = Config::load("blog-service")?;

    let db = quill_db::init(&config).await?;
    info!("Connected to database");

    info!("Running database migrations...");
    quill_db::migrate(&db).await?;
    info!("Migrations completed");

    // Initialize repositories
    let db = Arc::new(db);
    let user_repo = UserRepository::new(Arc::clone(&db));
    let post_repo = PostRepository::new(Arc::clone(&db));
    let clap_repo = ClapRepository::new(Arc::clone(&db));
    let comment_repo = CommentRepository::new(Arc::clone(&db));
    let image_repo = ImageRepository::new(Arc::clone(&db));
    let subscription_repo = SubscriptionRepository::new(Arc::clone(&db));
    let log_repo = NotificationLogRepository::new(Arc::clone(&db));

    // External collaborators
    let magic_links = Arc::new(EmailServiceClient::new(&config.email_service)?);
    let mailer = mailer_from_config(&config.mail)?;
    let storage = Arc::new(LocalStorage::new(
        config.storage.upload_dir.clone(),
        config.storage.base_url.clone(),
    ));

    // Initialize services
    let user_service = UserService::new(user_repo.clone());
    let auth_service = AuthService::new(
        user_repo.clone(),
        magic_links,
        JwtService::new(&config.jwt),
    );
    let subscription_service =
        SubscriptionService::new(subscription_repo, log_repo, mailer, &config.magic_link);
    let post_service =
        PostService::new(post_repo.clone()).with_notifier(subscription_service.clone());
    let clap_service = ClapService::new(clap_repo, post_repo.clone());
    let comment_service = CommentService::new(comment_repo, post_repo, user_repo);
    let image_service = ImageService::new(
        image_repo,
        user_service.clone(),
        storage,
        config.storage.max_file_size,
    );

    let state = AppState {
        auth_service,
        user_service,
        post_service,
        clap_service,
        comment_service,
        image_service,
        subscription_service,
    };

    let app = Router::new()
        .nest("/api/v1", api_router())
        .layer(DefaultBodyLimit::max(
            config.storage.max_file_size + MULTIPART_OVERHEAD,
        ))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state);

    serve(&config, with_common_layers(app)).await?;

    info!("Server shutdown complete");
    Ok(())
}
