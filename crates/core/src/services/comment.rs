//! Comment service: creation, moderation and queries.

use chrono::{DateTime, Duration, Utc};
use quill_common::{AppError, AppResult, IdGenerator, validation::not_blank};
use quill_db::{
    entities::{comment, comment::CommentStatus, user},
    repositories::{CommentRepository, PostRepository, UserRepository},
};
use sea_orm::{IntoActiveModel, Set};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{
    comment_tree::{self, CommentTree, CommentView},
    user::ensure_admin,
};

/// Input for creating a comment.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentInput {
    #[validate(
        length(max = 2000, message = "Comment content must be between 1 and 2000 characters"),
        custom(function = "not_blank", message = "Comment content is required")
    )]
    pub content: String,

    pub post_id: String,

    #[serde(default)]
    pub parent_id: Option<String>,
}

/// Input for editing a comment.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateCommentInput {
    #[validate(
        length(max = 2000, message = "Comment content must be between 1 and 2000 characters"),
        custom(function = "not_blank", message = "Comment content is required")
    )]
    pub content: String,
}

/// Moderation decision.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationInput {
    pub status: CommentStatus,
    #[serde(default)]
    pub moderation_note: Option<String>,
}

/// Aggregate comment counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentStatistics {
    pub total_comments: u64,
    pub approved_comments: u64,
    pub pending_comments: u64,
    pub spam_comments: u64,
    pub deleted_comments: u64,
    pub total_replies: u64,
    pub comments_today: u64,
    pub comments_this_week: u64,
    pub comments_this_month: u64,
    pub average_comments_per_post: f64,
    pub most_active_post_id: Option<String>,
    pub most_active_post_title: Option<String>,
    pub most_active_user_id: Option<String>,
    pub most_active_user_name: Option<String>,
}

/// Comment service.
#[derive(Clone)]
pub struct CommentService {
    comment_repo: CommentRepository,
    post_repo: PostRepository,
    user_repo: UserRepository,
    id_gen: IdGenerator,
}

impl CommentService {
    /// Create a new comment service.
    #[must_use]
    pub const fn new(
        comment_repo: CommentRepository,
        post_repo: PostRepository,
        user_repo: UserRepository,
    ) -> Self {
        Self {
            comment_repo,
            post_repo,
            user_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a pending comment, optionally as a reply.
    pub async fn create(
        &self,
        author: &user::Model,
        input: CreateCommentInput,
    ) -> AppResult<comment::Model> {
        input.validate()?;
        let post = self.post_repo.get_by_id(&input.post_id).await?;
        let id = self.id_gen.generate();

        if let Some(parent_id) = input.parent_id.as_deref() {
            let parent = self.comment_repo.get_by_id(parent_id).await?;
            if parent.post_id != post.id {
                return Err(AppError::BadRequest(
                    "Parent comment does not belong to the specified post".to_string(),
                ));
            }

            let tree = CommentTree::from_links(self.comment_repo.find_parent_links(&post.id).await?);
            if let Err(cycle) = tree.check_attach(&id, parent_id) {
                tracing::warn!(post_id = %post.id, at = %cycle.at, "Comment parent chain has a cycle");
                return Err(AppError::BadRequest(
                    "Reply would create a cycle in the comment thread".to_string(),
                ));
            }
        }

        let now = Utc::now();
        let model = comment::ActiveModel {
            id: Set(id),
            content: Set(input.content),
            author_id: Set(author.id.clone()),
            post_id: Set(post.id),
            parent_id: Set(input.parent_id),
            status: Set(CommentStatus::Pending),
            moderated_by: Set(None),
            moderated_at: Set(None),
            moderation_note: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(None),
        };

        let comment = self.comment_repo.create(model).await?;
        tracing::info!(comment_id = %comment.id, post_id = %comment.post_id, "Comment created");
        Ok(comment)
    }

    /// Get a comment by id.
    pub async fn get(&self, id: &str) -> AppResult<comment::Model> {
        self.comment_repo.get_by_id(id).await
    }

    /// Edit a comment. Only the author may edit, and only while pending.
    pub async fn update(
        &self,
        actor: &user::Model,
        id: &str,
        input: UpdateCommentInput,
    ) -> AppResult<comment::Model> {
        input.validate()?;
        let existing = self.comment_repo.get_by_id(id).await?;

        if existing.author_id != actor.id {
            return Err(AppError::Forbidden(
                "User is not authorized to update this comment".to_string(),
            ));
        }
        if existing.status != CommentStatus::Pending {
            return Err(AppError::Conflict(
                "Cannot update comment that is not pending".to_string(),
            ));
        }

        let mut model = existing.into_active_model();
        model.content = Set(input.content);
        model.status = Set(CommentStatus::Pending);
        model.updated_at = Set(Some(Utc::now().into()));
        self.comment_repo.update(model).await
    }

    /// Soft-delete a comment. Only the author may delete.
    pub async fn delete(&self, actor: &user::Model, id: &str) -> AppResult<()> {
        let existing = self.comment_repo.get_by_id(id).await?;
        if existing.author_id != actor.id {
            return Err(AppError::Forbidden(
                "User is not authorized to delete this comment".to_string(),
            ));
        }

        let mut model = existing.into_active_model();
        model.status = Set(CommentStatus::Deleted);
        model.updated_at = Set(Some(Utc::now().into()));
        self.comment_repo.update(model).await?;
        Ok(())
    }

    /// Apply a moderation decision to a pending comment.
    pub async fn moderate(
        &self,
        moderator: &user::Model,
        id: &str,
        input: ModerationInput,
    ) -> AppResult<comment::Model> {
        ensure_admin(moderator)?;
        if input.status == CommentStatus::Pending {
            return Err(AppError::BadRequest(
                "Moderation decision must be APPROVED, SPAM or DELETED".to_string(),
            ));
        }
        let existing = self.comment_repo.get_by_id(id).await?;

        if !existing.can_be_moderated() {
            return Err(AppError::Conflict(
                "Comment cannot be moderated in its current state".to_string(),
            ));
        }

        let mut model = existing.into_active_model();
        model.status = Set(input.status);
        model.moderated_by = Set(Some(moderator.id.clone()));
        model.moderated_at = Set(Some(Utc::now().into()));
        model.moderation_note = Set(input.moderation_note);

        let comment = self.comment_repo.update(model).await?;
        tracing::info!(
            comment_id = %comment.id,
            moderator_id = %moderator.id,
            status = ?comment.status,
            "Comment moderated"
        );
        Ok(comment)
    }

    /// Approved top-level comments of a post with approved replies nested.
    pub async fn approved_by_post(&self, post_id: &str) -> AppResult<Vec<CommentView>> {
        let approved = self
            .comment_repo
            .find_by_post_and_status(post_id, CommentStatus::Approved)
            .await?;
        Ok(comment_tree::thread(approved))
    }

    /// Every comment of a post, any status.
    pub async fn all_by_post(
        &self,
        actor: &user::Model,
        post_id: &str,
    ) -> AppResult<Vec<comment::Model>> {
        ensure_admin(actor)?;
        self.comment_repo.find_by_post(post_id).await
    }

    /// One page (zero-based) of approved comments of a post and the total count.
    pub async fn approved_by_post_paged(
        &self,
        post_id: &str,
        page: u64,
        size: u64,
    ) -> AppResult<(Vec<comment::Model>, u64)> {
        self.comment_repo
            .find_approved_by_post_paged(post_id, page, size.clamp(1, 100))
            .await
    }

    /// Approved direct replies of a comment.
    pub async fn replies(&self, id: &str) -> AppResult<Vec<comment::Model>> {
        self.comment_repo.get_by_id(id).await?;
        self.comment_repo
            .find_replies(id, CommentStatus::Approved)
            .await
    }

    /// Comments written by a user.
    pub async fn by_author(&self, author_id: &str) -> AppResult<Vec<comment::Model>> {
        self.comment_repo.find_by_author(author_id).await
    }

    /// Comments in a status.
    pub async fn by_status(
        &self,
        actor: &user::Model,
        status: CommentStatus,
    ) -> AppResult<Vec<comment::Model>> {
        ensure_admin(actor)?;
        self.comment_repo.find_by_status(status).await
    }

    /// Moderation queue.
    pub async fn pending(&self, actor: &user::Model) -> AppResult<Vec<comment::Model>> {
        self.by_status(actor, CommentStatus::Pending).await
    }

    /// Comments created after a point in time.
    pub async fn created_after(&self, since: DateTime<Utc>) -> AppResult<Vec<comment::Model>> {
        self.comment_repo.find_created_after(since).await
    }

    /// Case-insensitive search over approved comments.
    pub async fn search(&self, keyword: &str) -> AppResult<Vec<comment::Model>> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(AppError::validation("Search keyword must not be empty"));
        }
        self.comment_repo.search_approved(keyword).await
    }

    /// Whether a user has commented on a post.
    pub async fn has_user_commented(&self, user_id: &str, post_id: &str) -> AppResult<bool> {
        self.comment_repo
            .exists_by_post_and_author(post_id, user_id)
            .await
    }

    /// Latest comment of a user.
    pub async fn most_recent_by_user(&self, user_id: &str) -> AppResult<comment::Model> {
        self.comment_repo
            .find_most_recent_by_author(user_id)
            .await?
            .ok_or_else(|| AppError::CommentNotFound(format!("latest comment of user {user_id}")))
    }

    /// Number of comments in a status.
    pub async fn count_by_status(
        &self,
        actor: &user::Model,
        status: CommentStatus,
    ) -> AppResult<u64> {
        ensure_admin(actor)?;
        self.comment_repo.count_by_status(status).await
    }

    /// Approved comments on a post.
    pub async fn count_by_post(&self, post_id: &str) -> AppResult<u64> {
        self.comment_repo.count_approved_by_post(post_id).await
    }

    /// Site-wide comment statistics.
    pub async fn statistics(&self, actor: &user::Model) -> AppResult<CommentStatistics> {
        ensure_admin(actor)?;
        self.statistics_at(Utc::now()).await
    }

    async fn statistics_at(&self, now: DateTime<Utc>) -> AppResult<CommentStatistics> {
        let repo = &self.comment_repo;
        let midnight = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map_or(now, |t| t.and_utc());

        let total_comments = repo.count_all().await?;
        let mut stats = CommentStatistics {
            total_comments,
            approved_comments: repo.count_by_status(CommentStatus::Approved).await?,
            pending_comments: repo.count_by_status(CommentStatus::Pending).await?,
            spam_comments: repo.count_by_status(CommentStatus::Spam).await?,
            deleted_comments: repo.count_by_status(CommentStatus::Deleted).await?,
            total_replies: repo.count_replies().await?,
            comments_today: repo.count_created_after(midnight).await?,
            comments_this_week: repo.count_created_after(midnight - Duration::days(7)).await?,
            comments_this_month: repo.count_created_after(midnight - Duration::days(30)).await?,
            ..Default::default()
        };

        let posts = repo.count_commented_posts().await?;
        if posts > 0 {
            #[allow(clippy::cast_precision_loss)]
            let average = total_comments as f64 / posts as f64;
            stats.average_comments_per_post = average;
        }

        if let Some(top) = repo.most_commented_post().await? {
            stats.most_active_post_title =
                self.post_repo.find_by_id(&top.id).await?.map(|p| p.title);
            stats.most_active_post_id = Some(top.id);
        }
        if let Some(top) = repo.most_active_author().await? {
            stats.most_active_user_name = self
                .user_repo
                .find_by_id(&top.id)
                .await?
                .map(|u| u.username);
            stats.most_active_user_id = Some(top.id);
        }

        Ok(stats)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::test_support::{comment, count, post, user};
    use maplit::btreemap;
    use quill_db::entities::{post::PostStatus, user::UserRole};
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, Value};
    use std::sync::Arc;

    fn service(db: DatabaseConnection) -> CommentService {
        let db = Arc::new(db);
        CommentService::new(
            CommentRepository::new(Arc::clone(&db)),
            PostRepository::new(Arc::clone(&db)),
            UserRepository::new(db),
        )
    }

    fn create_input(parent_id: Option<&str>) -> CreateCommentInput {
        CreateCommentInput {
            content: "Nice post".to_string(),
            post_id: "p1".to_string(),
            parent_id: parent_id.map(str::to_string),
        }
    }

    fn link(id: &str, parent: Option<&str>) -> std::collections::BTreeMap<&'static str, Value> {
        btreemap! {
            "id" => Value::String(Some(Box::new(id.to_string()))),
            "parent_id" => Value::String(parent.map(|p| Box::new(p.to_string()))),
        }
    }

    #[tokio::test]
    async fn test_create_starts_pending() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[post("p1", "a1", PostStatus::Published)]])
            .append_query_results([[comment("c1", "p1", "u1", None, CommentStatus::Pending)]])
            .into_connection();

        let created = service(db)
            .create(&user("u1", UserRole::User), create_input(None))
            .await
            .unwrap();
        assert_eq!(created.status, CommentStatus::Pending);
        assert!(!created.is_visible());
    }

    #[tokio::test]
    async fn test_create_on_missing_post() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<quill_db::entities::post::Model>::new()])
            .into_connection();
        assert!(matches!(
            service(db)
                .create(&user("u1", UserRole::User), create_input(None))
                .await,
            Err(AppError::PostNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reply_parent_must_share_post() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[post("p1", "a1", PostStatus::Published)]])
            .append_query_results([[comment("c0", "other", "u2", None, CommentStatus::Approved)]])
            .into_connection();
        assert!(matches!(
            service(db)
                .create(&user("u1", UserRole::User), create_input(Some("c0")))
                .await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_reply_rejected_on_cyclic_chain() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[post("p1", "a1", PostStatus::Published)]])
            .append_query_results([[comment("c1", "p1", "u2", Some("c2"), CommentStatus::Approved)]])
            .append_query_results([vec![link("c1", Some("c2")), link("c2", Some("c1"))]])
            .into_connection();
        assert!(matches!(
            service(db)
                .create(&user("u1", UserRole::User), create_input(Some("c1")))
                .await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_reply_created_under_valid_parent() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[post("p1", "a1", PostStatus::Published)]])
            .append_query_results([[comment("c0", "p1", "u2", None, CommentStatus::Approved)]])
            .append_query_results([vec![link("c0", None)]])
            .append_query_results([[comment("c1", "p1", "u1", Some("c0"), CommentStatus::Pending)]])
            .into_connection();

        let reply = service(db)
            .create(&user("u1", UserRole::User), create_input(Some("c0")))
            .await
            .unwrap();
        assert!(reply.is_reply());
    }

    #[tokio::test]
    async fn test_moderate_then_moderate_again_conflicts() {
        let pending = comment("c1", "p1", "u1", None, CommentStatus::Pending);
        let mut approved = pending.clone();
        approved.status = CommentStatus::Approved;
        approved.moderated_by = Some("admin".to_string());

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[pending]])
            .append_query_results([[approved.clone()]])
            .append_query_results([[approved]])
            .into_connection();
        let service = service(db);
        let admin = user("admin", UserRole::Admin);
        let decision = ModerationInput {
            status: CommentStatus::Approved,
            moderation_note: Some("ok".to_string()),
        };

        let moderated = service.moderate(&admin, "c1", decision.clone()).await.unwrap();
        assert!(moderated.is_visible());
        assert!(!moderated.can_be_moderated());

        assert!(matches!(
            service.moderate(&admin, "c1", decision).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_moderate_to_pending_is_rejected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let result = service(db)
            .moderate(
                &user("admin", UserRole::Admin),
                "c1",
                ModerationInput {
                    status: CommentStatus::Pending,
                    moderation_note: None,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_moderate_requires_admin() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let result = service(db)
            .moderate(
                &user("m1", UserRole::Moderator),
                "c1",
                ModerationInput {
                    status: CommentStatus::Spam,
                    moderation_note: None,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_update_rules() {
        let mine_approved = comment("c1", "p1", "u1", None, CommentStatus::Approved);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[mine_approved.clone()], [mine_approved]])
            .into_connection();
        let service = service(db);
        let input = UpdateCommentInput {
            content: "edited".to_string(),
        };

        assert!(matches!(
            service
                .update(&user("u2", UserRole::Admin), "c1", input.clone())
                .await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            service.update(&user("u1", UserRole::User), "c1", input).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_is_soft() {
        let existing = comment("c1", "p1", "u1", None, CommentStatus::Approved);
        let mut deleted = existing.clone();
        deleted.status = CommentStatus::Deleted;

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[existing], [deleted]])
                .into_connection(),
        );
        let service = CommentService::new(
            CommentRepository::new(Arc::clone(&db)),
            PostRepository::new(Arc::clone(&db)),
            UserRepository::new(Arc::clone(&db)),
        );

        service
            .delete(&user("u1", UserRole::User), "c1")
            .await
            .unwrap();
        drop(service);

        let log = Arc::try_unwrap(db).unwrap().into_transaction_log();
        assert!(log[1].statements()[0].sql.starts_with("UPDATE \"comment\""));
    }

    #[tokio::test]
    async fn test_approved_by_post_is_threaded() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[
                comment("a", "p1", "u1", None, CommentStatus::Approved),
                comment("b", "p1", "u2", Some("a"), CommentStatus::Approved),
            ]])
            .into_connection();

        let threads = service(db).approved_by_post("p1").await.unwrap();
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].replies.len(), 1);
    }

    #[tokio::test]
    async fn test_most_recent_by_user_missing() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<comment::Model>::new()])
            .into_connection();
        assert!(matches!(
            service(db).most_recent_by_user("u1").await,
            Err(AppError::CommentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_statistics() {
        let ranked = |id: &str, n: i64| {
            btreemap! {
                "id" => Value::String(Some(Box::new(id.to_string()))),
                "count" => Value::BigInt(Some(n)),
            }
        };

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([
                [count(10)],
                [count(6)],
                [count(2)],
                [count(1)],
                [count(1)],
                [count(3)],
                [count(1)],
                [count(4)],
                [count(9)],
            ])
            .append_query_results([[btreemap! { "count" => Value::BigInt(Some(4)) }]])
            .append_query_results([[ranked("p1", 5)]])
            .append_query_results([[post("p1", "a1", PostStatus::Published)]])
            .append_query_results([[ranked("u1", 4)]])
            .append_query_results([[user("u1", UserRole::User)]])
            .into_connection();

        let stats = service(db).statistics_at(Utc::now()).await.unwrap();
        assert_eq!(stats.total_comments, 10);
        assert_eq!(stats.approved_comments, 6);
        assert_eq!(stats.total_replies, 3);
        assert_eq!(stats.comments_this_month, 9);
        assert!((stats.average_comments_per_post - 2.5).abs() < f64::EPSILON);
        assert_eq!(stats.most_active_post_title.as_deref(), Some("Post p1"));
        assert_eq!(stats.most_active_user_name.as_deref(), Some("user_u1"));
    }
}
