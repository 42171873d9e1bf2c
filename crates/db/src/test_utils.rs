//! Postgres-backed fixtures for the ignored integration tests.
//!
//! Each [`TestDatabase::create_unique`] call gets its own database with the
//! blog and email schemas applied, so tests can run in parallel.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DbErr, Set,
    Statement,
};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use crate::{
    entities::{post, post::PostStatus, user, user::UserRole},
    migrations::{EmailMigrator, Migrator},
};

/// Tables owned by the schemas, children before parents.
const TABLES: [&str; 8] = [
    "notification_log",
    "subscription",
    "clap",
    "comment",
    "image",
    "post",
    "user",
    "magic_link_token",
];

/// Where the throwaway databases live. Read from `TEST_DB_*`.
#[derive(Debug, Clone)]
pub struct TestDbConfig {
    /// Database host.
    pub host: String,
    /// Database port.
    pub port: u16,
    /// Role used to create and drop databases.
    pub username: String,
    /// Password of that role.
    pub password: String,
    /// Database to connect to.
    pub database: String,
}

impl Default for TestDbConfig {
    fn default() -> Self {
        let var = |key: &str, fallback: &str| std::env::var(key).unwrap_or_else(|_| fallback.to_string());
        Self {
            host: var("TEST_DB_HOST", "localhost"),
            port: std::env::var("TEST_DB_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5433),
            username: var("TEST_DB_USER", "quill_test"),
            password: var("TEST_DB_PASSWORD", "quill_test"),
            database: var("TEST_DB_NAME", "quill_test"),
        }
    }
}

impl TestDbConfig {
    /// URL of the configured database.
    #[must_use]
    pub fn database_url(&self) -> String {
        self.url_for(&self.database)
    }

    /// URL of the maintenance database used for CREATE/DROP DATABASE.
    #[must_use]
    pub fn postgres_url(&self) -> String {
        self.url_for("postgres")
    }

    fn url_for(&self, database: &str) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{database}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// A connected test database.
pub struct TestDatabase {
    conn: DatabaseConnection,
    config: TestDbConfig,
}

impl TestDatabase {
    /// Connect to an existing database without touching its schema.
    pub async fn with_config(config: TestDbConfig) -> Result<Self, DbErr> {
        let conn = Database::connect(&config.database_url()).await?;
        info!(database = %config.database, "Connected to test database");
        Ok(Self { conn, config })
    }

    /// Create a fresh `quill_test_*` database and migrate it.
    pub async fn create_unique() -> Result<Self, DbErr> {
        let mut config = TestDbConfig::default();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        config.database = format!("quill_test_{}", &suffix[..8]);

        let admin = Database::connect(&config.postgres_url()).await?;
        admin
            .execute(Statement::from_string(
                DatabaseBackend::Postgres,
                format!("CREATE DATABASE \"{}\"", config.database),
            ))
            .await?;
        admin.close().await?;

        let db = Self::with_config(config).await?;
        db.migrate().await?;
        Ok(db)
    }

    /// Apply the blog and email migrations.
    pub async fn migrate(&self) -> Result<(), DbErr> {
        Migrator::up(&self.conn, None).await?;
        EmailMigrator::up(&self.conn, None).await
    }

    /// The live connection.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Empty every schema table, keeping the migration history.
    pub async fn truncate_all(&self) -> Result<(), DbErr> {
        let tables = TABLES
            .iter()
            .map(|t| format!("\"{t}\""))
            .collect::<Vec<_>>()
            .join(", ");
        self.conn
            .execute(Statement::from_string(
                DatabaseBackend::Postgres,
                format!("TRUNCATE TABLE {tables}"),
            ))
            .await?;
        Ok(())
    }

    /// Insert a USER-role account with id-derived username and email.
    pub async fn insert_user(&self, id: &str) -> Result<user::Model, DbErr> {
        user::ActiveModel {
            id: Set(id.to_string()),
            username: Set(format!("user_{id}")),
            first_name: Set("Test".to_string()),
            last_name: Set("User".to_string()),
            email: Set(format!("{id}@example.com")),
            password: Set(None),
            role: Set(UserRole::User),
            profile_picture_url: Set(None),
            profile_picture_filename: Set(None),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        }
        .insert(&self.conn)
        .await
    }

    /// Insert a published post by `author_id`.
    pub async fn insert_post(&self, id: &str, author_id: &str) -> Result<post::Model, DbErr> {
        post::ActiveModel {
            id: Set(id.to_string()),
            title: Set(format!("Post {id}")),
            content: Set("Body".to_string()),
            status: Set(PostStatus::Published),
            author_id: Set(author_id.to_string()),
            image_url: Set(None),
            featured_image_id: Set(None),
            claps_count: Set(0),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        }
        .insert(&self.conn)
        .await
    }

    /// Close the connection and drop the database.
    pub async fn drop_database(self) -> Result<(), DbErr> {
        self.conn.close().await?;

        let admin = Database::connect(&self.config.postgres_url()).await?;
        // Pool connections cloned into repositories may still be open.
        let terminate = format!(
            "SELECT pg_terminate_backend(pid) FROM pg_stat_activity WHERE datname = '{}'",
            self.config.database
        );
        if let Err(e) = admin
            .execute(Statement::from_string(DatabaseBackend::Postgres, terminate))
            .await
        {
            tracing::warn!(error = %e, "Failed to terminate test connections");
        }
        admin
            .execute(Statement::from_string(
                DatabaseBackend::Postgres,
                format!("DROP DATABASE IF EXISTS \"{}\"", self.config.database),
            ))
            .await?;
        admin.close().await?;

        info!(database = %self.config.database, "Dropped test database");
        Ok(())
    }
}
