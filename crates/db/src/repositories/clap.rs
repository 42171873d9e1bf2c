//! Clap repository.
//!
//! The clap row and the post's `claps_count` change together inside one
//! transaction.

use std::sync::Arc;

use crate::entities::{Clap, Post, clap, post};
use quill_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    TransactionTrait, sea_query::Expr,
};

/// Clap repository for database operations.
#[derive(Clone)]
pub struct ClapRepository {
    db: Arc<DatabaseConnection>,
}

impl ClapRepository {
    /// Create a new clap repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a clap by user and post.
    pub async fn find_by_user_and_post(
        &self,
        user_id: &str,
        post_id: &str,
    ) -> AppResult<Option<clap::Model>> {
        Clap::find()
            .filter(clap::Column::UserId.eq(user_id))
            .filter(clap::Column::PostId.eq(post_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Check if a user has clapped for a post.
    pub async fn has_clapped(&self, user_id: &str, post_id: &str) -> AppResult<bool> {
        Ok(self
            .find_by_user_and_post(user_id, post_id)
            .await?
            .is_some())
    }

    /// Insert a clap and bump the post counter.
    ///
    /// The unique (user_id, post_id) index decides races: the losing insert
    /// fails with a unique violation, surfaced as [`AppError::Conflict`].
    pub async fn create_and_increment(&self, model: clap::ActiveModel) -> AppResult<clap::Model> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let clap = model.insert(&txn).await.map_err(|e| {
            if crate::is_unique_violation(&e) {
                AppError::Conflict("User has already clapped for this post.".to_string())
            } else {
                AppError::Database(e.to_string())
            }
        })?;

        Post::update_many()
            .col_expr(
                post::Column::ClapsCount,
                Expr::col(post::Column::ClapsCount).add(1),
            )
            .filter(post::Column::Id.eq(&clap.post_id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(clap)
    }

    /// Remove a clap and lower the post counter, never below zero.
    ///
    /// Returns false when there was no clap to remove.
    pub async fn delete_and_decrement(&self, user_id: &str, post_id: &str) -> AppResult<bool> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let res = Clap::delete_many()
            .filter(clap::Column::UserId.eq(user_id))
            .filter(clap::Column::PostId.eq(post_id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if res.rows_affected == 0 {
            txn.rollback()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            return Ok(false);
        }

        Post::update_many()
            .col_expr(
                post::Column::ClapsCount,
                Expr::cust("GREATEST(claps_count - 1, 0)"),
            )
            .filter(post::Column::Id.eq(post_id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(true)
    }

    /// Count clap rows for a post.
    pub async fn count_by_post(&self, post_id: &str) -> AppResult<u64> {
        Clap::find()
            .filter(clap::Column::PostId.eq(post_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
