//! Database migrations.
//!
//! The blog-service and the email-service own separate databases, so each
//! gets its own migrator.

#![allow(missing_docs)]

use sea_orm_migration::prelude::*;

mod m20250101_000001_create_user_table;
mod m20250101_000002_create_post_table;
mod m20250101_000003_create_clap_table;
mod m20250101_000004_create_comment_table;
mod m20250101_000005_create_image_table;
mod m20250101_000006_create_subscription_table;
mod m20250101_000007_create_notification_log_table;
mod m20250101_000101_create_magic_link_token_table;

/// Blog-service schema.
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_user_table::Migration),
            Box::new(m20250101_000002_create_post_table::Migration),
            Box::new(m20250101_000003_create_clap_table::Migration),
            Box::new(m20250101_000004_create_comment_table::Migration),
            Box::new(m20250101_000005_create_image_table::Migration),
            Box::new(m20250101_000006_create_subscription_table::Migration),
            Box::new(m20250101_000007_create_notification_log_table::Migration),
        ]
    }
}

/// Email-service schema.
pub struct EmailMigrator;

#[async_trait::async_trait]
impl MigratorTrait for EmailMigrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(
            m20250101_000101_create_magic_link_token_table::Migration,
        )]
    }
}
