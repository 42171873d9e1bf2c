//! Comment repository.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    prelude::DateTimeWithTimeZone,
    sea_query::{Expr, Func},
};

use crate::entities::{Comment, comment, comment::CommentStatus};
use quill_common::{AppError, AppResult};

/// Row of a "group by, count" ranking query.
#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult)]
pub struct RankedId {
    pub id: String,
    pub count: i64,
}

/// Parent link of a comment, used to build the in-memory tree.
#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult)]
pub struct ParentLink {
    pub id: String,
    pub parent_id: Option<String>,
}

#[derive(FromQueryResult)]
struct CountRow {
    count: i64,
}

/// Comment repository for database operations.
#[derive(Clone)]
pub struct CommentRepository {
    db: Arc<DatabaseConnection>,
}

impl CommentRepository {
    /// Create a new comment repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a comment by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<comment::Model>> {
        Comment::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a comment by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<comment::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::CommentNotFound(id.to_string()))
    }

    /// Create a new comment.
    pub async fn create(&self, model: comment::ActiveModel) -> AppResult<comment::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a comment.
    pub async fn update(&self, model: comment::ActiveModel) -> AppResult<comment::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Comments of a post with a given status, oldest first.
    pub async fn find_by_post_and_status(
        &self,
        post_id: &str,
        status: CommentStatus,
    ) -> AppResult<Vec<comment::Model>> {
        Comment::find()
            .filter(comment::Column::PostId.eq(post_id))
            .filter(comment::Column::Status.eq(status))
            .order_by_asc(comment::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Every comment of a post regardless of status, oldest first.
    pub async fn find_by_post(&self, post_id: &str) -> AppResult<Vec<comment::Model>> {
        Comment::find()
            .filter(comment::Column::PostId.eq(post_id))
            .order_by_asc(comment::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// One page of approved comments of a post, plus the total count.
    pub async fn find_approved_by_post_paged(
        &self,
        post_id: &str,
        page: u64,
        size: u64,
    ) -> AppResult<(Vec<comment::Model>, u64)> {
        let paginator = Comment::find()
            .filter(comment::Column::PostId.eq(post_id))
            .filter(comment::Column::Status.eq(CommentStatus::Approved))
            .order_by_asc(comment::Column::CreatedAt)
            .paginate(self.db.as_ref(), size);

        let total = paginator
            .num_items()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        let items = paginator
            .fetch_page(page)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok((items, total))
    }

    /// Direct replies of a comment with a given status.
    pub async fn find_replies(
        &self,
        parent_id: &str,
        status: CommentStatus,
    ) -> AppResult<Vec<comment::Model>> {
        Comment::find()
            .filter(comment::Column::ParentId.eq(parent_id))
            .filter(comment::Column::Status.eq(status))
            .order_by_asc(comment::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Comments written by a user, newest first.
    pub async fn find_by_author(&self, author_id: &str) -> AppResult<Vec<comment::Model>> {
        Comment::find()
            .filter(comment::Column::AuthorId.eq(author_id))
            .order_by_desc(comment::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Comments in a status. Pending ones come oldest first for the moderation queue.
    pub async fn find_by_status(&self, status: CommentStatus) -> AppResult<Vec<comment::Model>> {
        Comment::find()
            .filter(comment::Column::Status.eq(status))
            .order_by_asc(comment::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Comments created after `since`, newest first.
    pub async fn find_created_after(
        &self,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<comment::Model>> {
        let since: DateTimeWithTimeZone = since.into();
        Comment::find()
            .filter(comment::Column::CreatedAt.gt(since))
            .order_by_desc(comment::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Approved comments containing `keyword`, ignoring case.
    pub async fn search_approved(&self, keyword: &str) -> AppResult<Vec<comment::Model>> {
        let pattern = format!("%{}%", super::escape_like(&keyword.to_lowercase()));
        Comment::find()
            .filter(comment::Column::Status.eq(CommentStatus::Approved))
            .filter(Expr::expr(Func::lower(Expr::col(comment::Column::Content))).like(pattern))
            .order_by_desc(comment::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Whether a user has commented on a post.
    pub async fn exists_by_post_and_author(
        &self,
        post_id: &str,
        author_id: &str,
    ) -> AppResult<bool> {
        let count = Comment::find()
            .filter(comment::Column::PostId.eq(post_id))
            .filter(comment::Column::AuthorId.eq(author_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(count > 0)
    }

    /// Latest comment by a user.
    pub async fn find_most_recent_by_author(
        &self,
        author_id: &str,
    ) -> AppResult<Option<comment::Model>> {
        Comment::find()
            .filter(comment::Column::AuthorId.eq(author_id))
            .order_by_desc(comment::Column::CreatedAt)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Id and parent of every comment on a post.
    pub async fn find_parent_links(&self, post_id: &str) -> AppResult<Vec<ParentLink>> {
        Comment::find()
            .select_only()
            .column(comment::Column::Id)
            .column(comment::Column::ParentId)
            .filter(comment::Column::PostId.eq(post_id))
            .into_model::<ParentLink>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count all comments.
    pub async fn count_all(&self) -> AppResult<u64> {
        Comment::find()
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count comments in a status.
    pub async fn count_by_status(&self, status: CommentStatus) -> AppResult<u64> {
        Comment::find()
            .filter(comment::Column::Status.eq(status))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count comments that are replies.
    pub async fn count_replies(&self) -> AppResult<u64> {
        Comment::find()
            .filter(comment::Column::ParentId.is_not_null())
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count comments created after `since`.
    pub async fn count_created_after(&self, since: DateTime<Utc>) -> AppResult<u64> {
        let since: DateTimeWithTimeZone = since.into();
        Comment::find()
            .filter(comment::Column::CreatedAt.gt(since))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count approved comments of a post.
    pub async fn count_approved_by_post(&self, post_id: &str) -> AppResult<u64> {
        Comment::find()
            .filter(comment::Column::PostId.eq(post_id))
            .filter(comment::Column::Status.eq(CommentStatus::Approved))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Number of distinct posts that have at least one comment.
    pub async fn count_commented_posts(&self) -> AppResult<i64> {
        let row = Comment::find()
            .select_only()
            .column_as(Expr::cust("COUNT(DISTINCT post_id)"), "count")
            .into_model::<CountRow>()
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(row.map_or(0, |r| r.count))
    }

    /// Post with the most comments.
    pub async fn most_commented_post(&self) -> AppResult<Option<RankedId>> {
        self.top_by(comment::Column::PostId).await
    }

    /// User with the most comments.
    pub async fn most_active_author(&self) -> AppResult<Option<RankedId>> {
        self.top_by(comment::Column::AuthorId).await
    }

    async fn top_by(&self, column: comment::Column) -> AppResult<Option<RankedId>> {
        Comment::find()
            .select_only()
            .column_as(column, "id")
            .column_as(Expr::col(comment::Column::Id).count(), "count")
            .group_by(column)
            .order_by_desc(Expr::cust("count"))
            .into_model::<RankedId>()
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
