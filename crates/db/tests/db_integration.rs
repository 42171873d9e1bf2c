//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `quill_test`)
//!   `TEST_DB_PASSWORD` (default: `quill_test`)
//!   `TEST_DB_NAME` (default: `quill_test`)

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use quill_common::AppError;
use quill_db::{
    entities::{clap, magic_link_token},
    repositories::{ClapRepository, MagicLinkTokenRepository, PostRepository},
    test_utils::{TestDatabase, TestDbConfig},
};
use sea_orm::{Set, SqlxPostgresConnector};

async fn setup() -> TestDatabase {
    TestDatabase::create_unique()
        .await
        .expect("Failed to create database")
}

fn clap_row(id: &str, user_id: &str, post_id: &str) -> clap::ActiveModel {
    clap::ActiveModel {
        id: Set(id.to_string()),
        user_id: Set(user_id.to_string()),
        post_id: Set(post_id.to_string()),
        created_at: Set(Utc::now().into()),
    }
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_database_connection() {
    let config = TestDbConfig::default();
    let result = TestDatabase::with_config(config).await;
    assert!(result.is_ok(), "Failed to connect: {:?}", result.err());
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_clap_is_unique_and_counted() {
    let db = setup().await;
    let conn = Arc::new(SqlxPostgresConnector::from_sqlx_postgres_pool(
        db.connection().get_postgres_connection_pool().clone(),
    ));

    let posts = PostRepository::new(Arc::clone(&conn));
    let claps = ClapRepository::new(Arc::clone(&conn));

    db.insert_user("author").await.unwrap();
    db.insert_user("reader").await.unwrap();
    db.insert_post("p1", "author").await.unwrap();

    claps
        .create_and_increment(clap_row("c1", "reader", "p1"))
        .await
        .unwrap();
    let second = claps
        .create_and_increment(clap_row("c2", "reader", "p1"))
        .await;
    assert!(matches!(second, Err(AppError::Conflict(_))));

    assert_eq!(posts.get_by_id("p1").await.unwrap().claps_count, 1);
    assert_eq!(claps.count_by_post("p1").await.unwrap(), 1);

    assert!(claps.delete_and_decrement("reader", "p1").await.unwrap());
    assert!(!claps.delete_and_decrement("reader", "p1").await.unwrap());
    assert_eq!(posts.get_by_id("p1").await.unwrap().claps_count, 0);

    drop((posts, claps, conn));
    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_post_delete_takes_claps_along() {
    let db = setup().await;
    let conn = Arc::new(SqlxPostgresConnector::from_sqlx_postgres_pool(
        db.connection().get_postgres_connection_pool().clone(),
    ));
    let posts = PostRepository::new(Arc::clone(&conn));
    let claps = ClapRepository::new(Arc::clone(&conn));

    db.insert_user("author").await.unwrap();
    db.insert_user("reader").await.unwrap();
    db.insert_post("p1", "author").await.unwrap();
    claps
        .create_and_increment(clap_row("c1", "reader", "p1"))
        .await
        .unwrap();

    assert_eq!(posts.delete_with_dependents("p1").await.unwrap(), (1, 0));
    assert!(posts.find_by_id("p1").await.unwrap().is_none());
    assert_eq!(claps.count_by_post("p1").await.unwrap(), 0);

    drop((posts, claps, conn));
    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_truncate_all_empties_tables() {
    let db = setup().await;
    let conn = Arc::new(SqlxPostgresConnector::from_sqlx_postgres_pool(
        db.connection().get_postgres_connection_pool().clone(),
    ));
    let posts = PostRepository::new(Arc::clone(&conn));

    db.insert_user("author").await.unwrap();
    db.insert_post("p1", "author").await.unwrap();
    db.truncate_all().await.unwrap();

    assert!(posts.find_published().await.unwrap().is_empty());
    db.insert_user("author").await.unwrap();

    drop((posts, conn));
    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_magic_link_token_redeems_once() {
    let db = setup().await;
    let conn = Arc::new(SqlxPostgresConnector::from_sqlx_postgres_pool(
        db.connection().get_postgres_connection_pool().clone(),
    ));
    let tokens = MagicLinkTokenRepository::new(Arc::clone(&conn));

    let now = Utc::now();
    tokens
        .create(magic_link_token::ActiveModel {
            id: Set("t1".to_string()),
            token: Set("tok-1".to_string()),
            email: Set("a@example.com".to_string()),
            expires_at: Set((now + Duration::minutes(15)).into()),
            used_at: Set(None),
            created_at: Set(now.into()),
        })
        .await
        .unwrap();

    let (first, second) = tokio::join!(tokens.redeem("tok-1", now), tokens.redeem("tok-1", now));
    assert!(first.unwrap() ^ second.unwrap());

    assert_eq!(
        tokens
            .delete_expired(now + Duration::minutes(30))
            .await
            .unwrap(),
        1
    );

    drop((tokens, conn));
    db.drop_database().await.unwrap();
}

#[test]
fn test_config_from_env() {
    let config = TestDbConfig::default();
    assert!(!config.host.is_empty());
    assert!(config.port > 0);
    assert!(!config.username.is_empty());
    assert!(!config.database.is_empty());
}
