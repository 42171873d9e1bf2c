//! Notification log repository.

use std::sync::Arc;

use sea_orm::{ActiveModelTrait, DatabaseConnection};

use crate::entities::notification_log;
use quill_common::{AppError, AppResult};

/// Notification log repository.
#[derive(Clone)]
pub struct NotificationLogRepository {
    db: Arc<DatabaseConnection>,
}

impl NotificationLogRepository {
    /// Create a new repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Record a delivery attempt.
    pub async fn create(
        &self,
        model: notification_log::ActiveModel,
    ) -> AppResult<notification_log::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
