//! Post repository.

use std::sync::Arc;

use crate::entities::{Clap, Comment, Post, clap, comment, post, post::PostStatus};
use quill_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, TransactionTrait,
    sea_query::{Expr, Func},
};

/// Post repository for database operations.
#[derive(Clone)]
pub struct PostRepository {
    db: Arc<DatabaseConnection>,
}

impl PostRepository {
    /// Create a new post repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a post by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<post::Model>> {
        Post::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a post by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<post::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::PostNotFound(id.to_string()))
    }

    /// Create a new post.
    pub async fn create(&self, model: post::ActiveModel) -> AppResult<post::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a post.
    pub async fn update(&self, model: post::ActiveModel) -> AppResult<post::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a post together with its claps and comments in one transaction.
    ///
    /// Returns the number of claps and comments removed.
    pub async fn delete_with_dependents(&self, id: &str) -> AppResult<(u64, u64)> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let claps = Clap::delete_many()
            .filter(clap::Column::PostId.eq(id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        let comments = Comment::delete_many()
            .filter(comment::Column::PostId.eq(id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Post::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok((claps.rows_affected, comments.rows_affected))
    }

    /// Published posts, newest first.
    pub async fn find_published(&self) -> AppResult<Vec<post::Model>> {
        Post::find()
            .filter(post::Column::Status.eq(PostStatus::Published))
            .order_by_desc(post::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Published posts whose title or content contains `query`, ignoring case.
    pub async fn search_published(&self, query: &str) -> AppResult<Vec<post::Model>> {
        let pattern = format!("%{}%", super::escape_like(&query.to_lowercase()));

        Post::find()
            .filter(post::Column::Status.eq(PostStatus::Published))
            .filter(
                Condition::any()
                    .add(Expr::expr(Func::lower(Expr::col(post::Column::Title))).like(&pattern))
                    .add(Expr::expr(Func::lower(Expr::col(post::Column::Content))).like(&pattern)),
            )
            .order_by_desc(post::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Published posts by one author, newest first.
    pub async fn find_published_by_author(&self, author_id: &str) -> AppResult<Vec<post::Model>> {
        Post::find()
            .filter(post::Column::AuthorId.eq(author_id))
            .filter(post::Column::Status.eq(PostStatus::Published))
            .order_by_desc(post::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

}
