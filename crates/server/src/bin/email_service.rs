//! Email-service entry point.

use std::{sync::Arc, time::Duration};

use axum::Router;
use quill_api::{EmailState, email_router};
use quill_common::Config;
use quill_core::{MagicLinkService, TokenCleanupTask, mailer_from_config};
use quill_db::repositories::MagicLinkTokenRepository;
use quill_server::{init_tracing, serve, with_common_layers};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    info!("Starting email-service...");

    let config = Config::load("email-service")?;

    let db = quill_db::init(&config).await?;
    info!("Connected to database");

    info!("Running database migrations...");
    quill_db::migrate_email(&db).await?;
    info!("Migrations completed");

    let token_repo = MagicLinkTokenRepository::new(Arc::new(db));
    let mailer = mailer_from_config(&config.mail)?;
    let magic_link_service = MagicLinkService::new(token_repo, mailer, config.magic_link.clone());

    let mut cleanup = TokenCleanupTask::new(
        magic_link_service.clone(),
        Duration::from_secs(config.magic_link.cleanup_interval_secs),
    );
    cleanup.start();

    let app = Router::new()
        .nest("/api/v1/email", email_router())
        .with_state(EmailState { magic_link_service });

    let served = serve(&config, with_common_layers(app)).await;

    cleanup.stop().await;
    served?;

    info!("Server shutdown complete");
    Ok(())
}
