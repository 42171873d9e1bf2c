//! User management.

use chrono::Utc;
use quill_common::{AppError, AppResult};
use quill_db::{entities::user, repositories::UserRepository};
use sea_orm::{IntoActiveModel, Set};
use serde::Deserialize;
use validator::Validate;

/// Input for updating a profile.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserInput {
    #[validate(length(min = 3, max = 50, message = "Username must be between 3 and 50 characters"))]
    pub username: String,

    #[validate(length(min = 1, max = 50, message = "First name is required"))]
    pub first_name: String,

    #[validate(length(min = 1, max = 50, message = "Last name is required"))]
    pub last_name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

/// User service for business logic.
#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub const fn new(user_repo: UserRepository) -> Self {
        Self { user_repo }
    }

    /// Get a user. Callers other than admins may only read themselves.
    pub async fn get(&self, actor: &user::Model, id: &str) -> AppResult<user::Model> {
        ensure_self_or_admin(actor, id)?;
        self.user_repo.get_by_id(id).await
    }

    /// List all users (admin).
    pub async fn list(&self, actor: &user::Model) -> AppResult<Vec<user::Model>> {
        ensure_admin(actor)?;
        self.user_repo.find_all().await
    }

    /// Update a profile. Admins may update anyone.
    pub async fn update(
        &self,
        actor: &user::Model,
        id: &str,
        input: UpdateUserInput,
    ) -> AppResult<user::Model> {
        ensure_self_or_admin(actor, id)?;
        input.validate()?;

        let existing = self.user_repo.get_by_id(id).await?;

        if existing.email != input.email && self.user_repo.exists_by_email(&input.email).await? {
            return Err(AppError::BadRequest(
                "Email is already taken by another user.".to_string(),
            ));
        }
        if existing.username != input.username
            && self.user_repo.exists_by_username(&input.username).await?
        {
            return Err(AppError::BadRequest("Username is already taken.".to_string()));
        }

        let mut model = existing.into_active_model();
        model.username = Set(input.username);
        model.first_name = Set(input.first_name);
        model.last_name = Set(input.last_name);
        model.email = Set(input.email);
        model.updated_at = Set(Some(Utc::now().into()));

        self.user_repo.update(model).await
    }

    /// Record a new profile picture.
    pub async fn set_profile_picture(
        &self,
        user_id: &str,
        url: String,
        file_name: String,
    ) -> AppResult<user::Model> {
        let mut model = self.user_repo.get_by_id(user_id).await?.into_active_model();
        model.profile_picture_url = Set(Some(url));
        model.profile_picture_filename = Set(Some(file_name));
        model.updated_at = Set(Some(Utc::now().into()));
        self.user_repo.update(model).await
    }

    /// Delete a user (admin).
    pub async fn delete(&self, actor: &user::Model, id: &str) -> AppResult<()> {
        ensure_admin(actor)?;
        if self.user_repo.delete(id).await? {
            tracing::info!(user_id = %id, by = %actor.id, "User deleted");
            Ok(())
        } else {
            Err(AppError::UserNotFound(id.to_string()))
        }
    }
}

/// Fail with 403 unless the actor is an admin.
pub fn ensure_admin(actor: &user::Model) -> AppResult<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Admin role required".to_string()))
    }
}

/// Fail with 403 unless the actor is admin or moderator.
pub fn ensure_staff(actor: &user::Model) -> AppResult<()> {
    if actor.is_staff() {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Admin or moderator role required".to_string(),
        ))
    }
}

fn ensure_self_or_admin(actor: &user::Model, id: &str) -> AppResult<()> {
    if actor.is_admin() || actor.id == id {
        Ok(())
    } else {
        Err(AppError::Forbidden("Access denied.".to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::test_support::{count, exec, user};
    use quill_db::entities::user::UserRole;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn service(db: MockDatabase) -> UserService {
        UserService::new(UserRepository::new(Arc::new(db.into_connection())))
    }

    fn input(username: &str, email: &str) -> UpdateUserInput {
        UpdateUserInput {
            username: username.to_string(),
            first_name: "New".to_string(),
            last_name: "Name".to_string(),
            email: email.to_string(),
        }
    }

    #[tokio::test]
    async fn test_get_other_user_forbidden() {
        let service = service(MockDatabase::new(DatabaseBackend::Postgres));
        let actor = user("u1", UserRole::User);
        assert!(matches!(
            service.get(&actor, "u2").await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_admin_gets_anyone() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[user("u2", UserRole::User)]]);
        let admin = user("a1", UserRole::Admin);
        assert_eq!(service(db).get(&admin, "u2").await.unwrap().id, "u2");
    }

    #[tokio::test]
    async fn test_update_rejects_taken_email() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[user("u1", UserRole::User)]])
            .append_query_results([[count(1)]]);
        let actor = user("u1", UserRole::User);

        let result = service(db)
            .update(&actor, "u1", input("user_u1", "taken@example.com"))
            .await;
        assert!(matches!(result, Err(AppError::BadRequest(msg)) if msg.contains("Email is already taken")));
    }

    #[tokio::test]
    async fn test_update_same_email_skips_uniqueness_check() {
        let mut updated = user("u1", UserRole::User);
        updated.first_name = "New".to_string();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[user("u1", UserRole::User)]])
            .append_query_results([[updated]]);
        let actor = user("u1", UserRole::User);

        let result = service(db)
            .update(&actor, "u1", input("user_u1", "u1@example.com"))
            .await
            .unwrap();
        assert_eq!(result.first_name, "New");
    }

    #[tokio::test]
    async fn test_delete_requires_admin_and_existing_user() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_exec_results([exec(0)]);
        let service = service(db);

        assert!(matches!(
            service.delete(&user("u1", UserRole::Moderator), "u2").await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            service.delete(&user("a1", UserRole::Admin), "u2").await,
            Err(AppError::UserNotFound(_))
        ));
    }
}
