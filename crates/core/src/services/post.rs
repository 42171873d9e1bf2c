//! Post service.

use chrono::Utc;
use quill_common::{AppError, AppResult, IdGenerator, validation::not_blank};
use quill_db::{
    entities::{post, post::PostStatus, user},
    repositories::PostRepository,
};
use sea_orm::{IntoActiveModel, Set};
use serde::Deserialize;
use validator::Validate;

use super::subscription::SubscriptionService;

/// Input for creating a post.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostInput {
    #[validate(
        length(max = 255, message = "Title must not exceed 255 characters"),
        custom(function = "not_blank")
    )]
    pub title: String,

    #[validate(custom(function = "not_blank"))]
    pub content: String,

    #[serde(default)]
    pub status: Option<PostStatus>,

    #[serde(default)]
    pub image_url: Option<String>,

    #[serde(default)]
    pub featured_image_id: Option<String>,
}

/// Partial update of a post. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePostInput {
    #[validate(
        length(max = 255, message = "Title must not exceed 255 characters"),
        custom(function = "not_blank")
    )]
    pub title: Option<String>,

    #[validate(custom(function = "not_blank"))]
    pub content: Option<String>,

    pub status: Option<PostStatus>,

    pub image_url: Option<String>,

    pub featured_image_id: Option<String>,
}

/// Post service for business logic.
#[derive(Clone)]
pub struct PostService {
    post_repo: PostRepository,
    notifier: Option<SubscriptionService>,
    id_gen: IdGenerator,
}

impl PostService {
    /// Create a new post service.
    #[must_use]
    pub const fn new(post_repo: PostRepository) -> Self {
        Self {
            post_repo,
            notifier: None,
            id_gen: IdGenerator::new(),
        }
    }

    /// Notify subscribers whenever a post becomes published.
    #[must_use]
    pub fn with_notifier(mut self, notifier: SubscriptionService) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Published posts, optionally filtered by a search query.
    pub async fn list(&self, query: Option<&str>) -> AppResult<Vec<post::Model>> {
        match query.map(str::trim).filter(|q| !q.is_empty()) {
            Some(q) => self.post_repo.search_published(q).await,
            None => self.post_repo.find_published().await,
        }
    }

    /// Get a post. Drafts are only visible to admins and their author.
    pub async fn get(&self, viewer: Option<&user::Model>, id: &str) -> AppResult<post::Model> {
        let post = self.post_repo.get_by_id(id).await?;
        if post.is_published() {
            return Ok(post);
        }

        match viewer {
            Some(v) if v.is_admin() || v.id == post.author_id => Ok(post),
            _ => Err(AppError::Forbidden(
                "You do not have permission to view this post".to_string(),
            )),
        }
    }

    /// Published posts by one author.
    pub async fn by_author(&self, author_id: &str) -> AppResult<Vec<post::Model>> {
        self.post_repo.find_published_by_author(author_id).await
    }

    /// Create a post authored by `actor`, who must be an admin.
    pub async fn create(&self, actor: &user::Model, input: CreatePostInput) -> AppResult<post::Model> {
        super::user::ensure_admin(actor)?;
        input.validate()?;

        let model = post::ActiveModel {
            id: Set(self.id_gen.generate()),
            title: Set(input.title.trim().to_string()),
            content: Set(input.content),
            author_id: Set(actor.id.clone()),
            status: Set(input.status.unwrap_or_default()),
            image_url: Set(input.image_url),
            featured_image_id: Set(input.featured_image_id),
            claps_count: Set(0),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };

        let post = self.post_repo.create(model).await?;
        tracing::info!(post_id = %post.id, author_id = %actor.id, "Post created");

        if post.is_published() {
            self.spawn_notification(&post);
        }
        Ok(post)
    }

    /// Update a post. Only admins and the author may edit.
    pub async fn update(
        &self,
        actor: &user::Model,
        id: &str,
        input: UpdatePostInput,
    ) -> AppResult<post::Model> {
        input.validate()?;

        let existing = self.post_repo.get_by_id(id).await?;
        if !actor.is_admin() && actor.id != existing.author_id {
            return Err(AppError::Forbidden(
                "You do not have permission to edit this post".to_string(),
            ));
        }

        let was_published = existing.is_published();
        let mut model = existing.into_active_model();
        if let Some(title) = input.title {
            model.title = Set(title.trim().to_string());
        }
        if let Some(content) = input.content {
            model.content = Set(content);
        }
        if let Some(status) = input.status {
            model.status = Set(status);
        }
        if let Some(image_url) = input.image_url {
            model.image_url = Set(Some(image_url));
        }
        if let Some(featured_image_id) = input.featured_image_id {
            model.featured_image_id = Set(Some(featured_image_id));
        }
        model.updated_at = Set(Some(Utc::now().into()));

        let post = self.post_repo.update(model).await?;
        if !was_published && post.is_published() {
            self.spawn_notification(&post);
        }
        Ok(post)
    }

    /// Delete a post with its claps and comments. Admin only.
    pub async fn delete(&self, actor: &user::Model, id: &str) -> AppResult<()> {
        super::user::ensure_admin(actor)?;
        let post = self.post_repo.get_by_id(id).await?;

        let (claps, comments) = self.post_repo.delete_with_dependents(&post.id).await?;

        tracing::info!(post_id = %post.id, claps, comments, "Post deleted");
        Ok(())
    }

    fn spawn_notification(&self, post: &post::Model) {
        let Some(notifier) = self.notifier.clone() else {
            return;
        };
        let post = post.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.notify_new_post(&post).await {
                tracing::error!(post_id = %post.id, error = %e, "Failed to notify subscribers");
            }
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::test_support::{exec, post, user};
    use quill_db::entities::user::UserRole;
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase};
    use std::sync::Arc;

    fn service(db: DatabaseConnection) -> (Arc<DatabaseConnection>, PostService) {
        let db = Arc::new(db);
        let service = PostService::new(PostRepository::new(Arc::clone(&db)));
        (db, service)
    }

    fn create_input(title: &str) -> CreatePostInput {
        CreatePostInput {
            title: title.to_string(),
            content: "Body".to_string(),
            status: None,
            image_url: None,
            featured_image_id: None,
        }
    }

    #[tokio::test]
    async fn test_draft_visibility() {
        let draft = post("p1", "author", PostStatus::Draft);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[draft.clone()], [draft.clone()], [draft.clone()], [draft]])
            .into_connection();
        let (_db, service) = service(db);

        assert!(matches!(
            service.get(None, "p1").await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            service
                .get(Some(&user("other", UserRole::User)), "p1")
                .await,
            Err(AppError::Forbidden(_))
        ));
        assert!(
            service
                .get(Some(&user("author", UserRole::User)), "p1")
                .await
                .is_ok()
        );
        assert!(
            service
                .get(Some(&user("boss", UserRole::Admin)), "p1")
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_published_visible_to_anonymous() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[post("p1", "author", PostStatus::Published)]])
            .into_connection();
        let (_db, service) = service(db);
        assert!(service.get(None, "p1").await.is_ok());
    }

    #[tokio::test]
    async fn test_get_missing_post() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<post::Model>::new()])
            .into_connection();
        let (_db, service) = service(db);
        assert!(matches!(
            service.get(None, "missing").await,
            Err(AppError::PostNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_create_requires_admin() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let (_db, service) = service(db);
        let result = service
            .create(&user("u1", UserRole::User), create_input("Hello"))
            .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_create_rejects_blank_title() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let (_db, service) = service(db);
        let result = service
            .create(&user("a1", UserRole::Admin), create_input("   "))
            .await;
        match result {
            Err(AppError::Validation { fields, .. }) => assert!(fields.contains_key("title")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_defaults_to_draft() {
        let created = post("p1", "a1", PostStatus::Draft);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[created]])
            .into_connection();
        let (_db, service) = service(db);

        let post = service
            .create(&user("a1", UserRole::Admin), create_input("Hello"))
            .await
            .unwrap();
        assert_eq!(post.status, PostStatus::Draft);
    }

    #[tokio::test]
    async fn test_update_by_non_author_forbidden() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[post("p1", "author", PostStatus::Draft)]])
            .into_connection();
        let (_db, service) = service(db);

        let result = service
            .update(
                &user("other", UserRole::Moderator),
                "p1",
                UpdatePostInput::default(),
            )
            .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_update_applies_patch() {
        let existing = post("p1", "author", PostStatus::Draft);
        let mut updated = existing.clone();
        updated.title = "Renamed".to_string();

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[existing], [updated]])
            .into_connection();
        let (_db, service) = service(db);

        let post = service
            .update(
                &user("author", UserRole::User),
                "p1",
                UpdatePostInput {
                    title: Some("Renamed".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(post.title, "Renamed");
    }

    #[tokio::test]
    async fn test_delete_removes_children_in_one_transaction() {
        let mock = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[post("p1", "a1", PostStatus::Published)]])
            .append_exec_results([exec(2), exec(1), exec(1)])
            .into_connection();
        let (db, service) = service(mock);

        service
            .delete(&user("a1", UserRole::Admin), "p1")
            .await
            .unwrap();
        drop(service);

        let log = Arc::try_unwrap(db).unwrap().into_transaction_log();
        assert_eq!(log.len(), 2);
        let sql: Vec<&str> = log[1]
            .statements()
            .iter()
            .map(|s| s.sql.as_str())
            .filter(|s| s.starts_with("DELETE"))
            .collect();
        assert_eq!(sql.len(), 3);
        assert!(sql[0].starts_with("DELETE FROM \"clap\""));
        assert!(sql[1].starts_with("DELETE FROM \"comment\""));
        assert!(sql[2].starts_with("DELETE FROM \"post\""));
    }

    #[tokio::test]
    async fn test_list_uses_search_for_query() {
        let mock = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<post::Model>::new(), Vec::new()])
            .into_connection();
        let (db, service) = service(mock);

        service.list(Some("rust")).await.unwrap();
        service.list(Some("  ")).await.unwrap();
        drop(service);

        let log = Arc::try_unwrap(db).unwrap().into_transaction_log();
        assert!(log[0].statements()[0].sql.contains("LIKE"));
        assert!(!log[1].statements()[0].sql.contains("LIKE"));
    }
}
