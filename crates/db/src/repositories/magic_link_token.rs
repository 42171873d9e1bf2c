//! Magic link token repository.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    prelude::DateTimeWithTimeZone, sea_query::Expr,
};

use crate::entities::{MagicLinkToken, magic_link_token};
use quill_common::{AppError, AppResult};

/// Magic link token repository.
#[derive(Clone)]
pub struct MagicLinkTokenRepository {
    db: Arc<DatabaseConnection>,
}

impl MagicLinkTokenRepository {
    /// Create a new repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Insert a freshly issued token.
    pub async fn create(
        &self,
        model: magic_link_token::ActiveModel,
    ) -> AppResult<magic_link_token::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a token row by its token string.
    pub async fn find_by_token(&self, token: &str) -> AppResult<Option<magic_link_token::Model>> {
        MagicLinkToken::find()
            .filter(magic_link_token::Column::Token.eq(token))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a single token row by id.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        MagicLinkToken::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete all unused tokens for an email. Returns the number removed.
    pub async fn delete_unused_by_email(&self, email: &str) -> AppResult<u64> {
        let res = MagicLinkToken::delete_many()
            .filter(magic_link_token::Column::Email.eq(email))
            .filter(magic_link_token::Column::UsedAt.is_null())
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(res.rows_affected)
    }

    /// Mark a token used if it is still unused and unexpired at `now`.
    ///
    /// A single conditional UPDATE, so concurrent redemptions of the same
    /// token see exactly one success.
    pub async fn redeem(&self, token: &str, now: DateTime<Utc>) -> AppResult<bool> {
        let now: DateTimeWithTimeZone = now.into();
        let res = MagicLinkToken::update_many()
            .col_expr(magic_link_token::Column::UsedAt, Expr::value(now))
            .filter(magic_link_token::Column::Token.eq(token))
            .filter(magic_link_token::Column::UsedAt.is_null())
            .filter(magic_link_token::Column::ExpiresAt.gt(now))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(res.rows_affected == 1)
    }

    /// Delete every token that expired before `now`, used or not.
    pub async fn delete_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let now: DateTimeWithTimeZone = now.into();
        let res = MagicLinkToken::delete_many()
            .filter(magic_link_token::Column::ExpiresAt.lt(now))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(res.rows_affected)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Transaction};

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    #[tokio::test]
    async fn test_find_by_token() {
        let now = Utc::now();
        let token = magic_link_token::Model {
            id: "t1".to_string(),
            token: "tok".to_string(),
            email: "a@example.com".to_string(),
            expires_at: (now + Duration::minutes(15)).into(),
            used_at: None,
            created_at: now.into(),
        };

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[token.clone()]])
                .into_connection(),
        );

        let repo = MagicLinkTokenRepository::new(db);
        let found = repo.find_by_token("tok").await.unwrap();
        assert_eq!(found, Some(token));
    }

    #[tokio::test]
    async fn test_redeem_succeeds_once() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([exec(1), exec(0)])
                .into_connection(),
        );

        let repo = MagicLinkTokenRepository::new(Arc::clone(&db));
        let now = Utc::now();
        assert!(repo.redeem("tok", now).await.unwrap());
        assert!(!repo.redeem("tok", now).await.unwrap());
    }

    #[tokio::test]
    async fn test_redeem_is_conditional_update() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([exec(1)])
                .into_connection(),
        );

        let repo = MagicLinkTokenRepository::new(Arc::clone(&db));
        repo.redeem("tok", Utc::now()).await.unwrap();
        drop(repo);

        let log: Vec<Transaction> = Arc::try_unwrap(db).unwrap().into_transaction_log();
        let sql = log[0].statements()[0].sql.clone();
        assert!(sql.starts_with("UPDATE \"magic_link_token\""));
        assert!(sql.contains("\"used_at\" IS NULL"));
        assert!(sql.contains("\"expires_at\" >"));
    }

    #[tokio::test]
    async fn test_delete_by_id() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([exec(1)])
                .into_connection(),
        );

        let repo = MagicLinkTokenRepository::new(Arc::clone(&db));
        repo.delete("t1").await.unwrap();
        drop(repo);

        let log = Arc::try_unwrap(db).unwrap().into_transaction_log();
        assert!(log[0].statements()[0].sql.starts_with("DELETE FROM \"magic_link_token\""));
    }

    #[tokio::test]
    async fn test_delete_expired_returns_count() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([exec(3)])
                .into_connection(),
        );

        let repo = MagicLinkTokenRepository::new(db);
        assert_eq!(repo.delete_expired(Utc::now()).await.unwrap(), 3);
    }
}
