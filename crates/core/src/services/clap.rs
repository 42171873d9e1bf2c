//! Clap service.

use chrono::Utc;
use quill_common::{AppError, AppResult, IdGenerator};
use quill_db::{
    entities::clap,
    repositories::{ClapRepository, PostRepository},
};
use sea_orm::Set;

/// Clap service.
#[derive(Clone)]
pub struct ClapService {
    clap_repo: ClapRepository,
    post_repo: PostRepository,
    id_gen: IdGenerator,
}

impl ClapService {
    /// Create a new clap service.
    #[must_use]
    pub const fn new(clap_repo: ClapRepository, post_repo: PostRepository) -> Self {
        Self {
            clap_repo,
            post_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Record one clap from `user_id` on `post_id`.
    pub async fn clap(&self, user_id: &str, post_id: &str) -> AppResult<clap::Model> {
        self.post_repo.get_by_id(post_id).await?;

        if self.clap_repo.has_clapped(user_id, post_id).await? {
            return Err(AppError::Conflict(
                "User has already clapped for this post.".to_string(),
            ));
        }

        let model = clap::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(user_id.to_string()),
            post_id: Set(post_id.to_string()),
            created_at: Set(Utc::now().into()),
        };
        let clap = self.clap_repo.create_and_increment(model).await?;

        tracing::debug!(user_id = %user_id, post_id = %post_id, "Clap recorded");
        Ok(clap)
    }

    /// Withdraw a clap.
    pub async fn unclap(&self, user_id: &str, post_id: &str) -> AppResult<()> {
        self.post_repo.get_by_id(post_id).await?;

        if !self.clap_repo.delete_and_decrement(user_id, post_id).await? {
            return Err(AppError::NotFound(
                "User has not clapped for this post.".to_string(),
            ));
        }
        Ok(())
    }

    /// Current clap count of a post.
    pub async fn count(&self, post_id: &str) -> AppResult<i64> {
        Ok(self.post_repo.get_by_id(post_id).await?.claps_count)
    }
}
