//! Subscription repository.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, prelude::DateTimeWithTimeZone, sea_query::Expr,
};

use crate::entities::{
    Subscription, subscription,
    subscription::{NotificationType, SubscriptionStatus},
};
use quill_common::{AppError, AppResult};

/// Subscription repository for database operations.
#[derive(Clone)]
pub struct SubscriptionRepository {
    db: Arc<DatabaseConnection>,
}

impl SubscriptionRepository {
    /// Create a new subscription repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a subscription by email.
    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<subscription::Model>> {
        Subscription::find()
            .filter(subscription::Column::Email.eq(email))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a subscription by its token.
    pub async fn find_by_token(&self, token: &str) -> AppResult<Option<subscription::Model>> {
        Subscription::find()
            .filter(subscription::Column::Token.eq(token))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a subscription.
    pub async fn create(&self, model: subscription::ActiveModel) -> AppResult<subscription::Model> {
        model.insert(self.db.as_ref()).await.map_err(|e| {
            if crate::is_unique_violation(&e) {
                AppError::BadRequest("Email is already subscribed".to_string())
            } else {
                AppError::Database(e.to_string())
            }
        })
    }

    /// Update a subscription.
    pub async fn update(&self, model: subscription::ActiveModel) -> AppResult<subscription::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Active subscriptions, newest first.
    pub async fn find_active(&self) -> AppResult<Vec<subscription::Model>> {
        Subscription::find()
            .filter(subscription::Column::Status.eq(SubscriptionStatus::Active))
            .filter(subscription::Column::Active.eq(true))
            .order_by_desc(subscription::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Active, verified subscriptions with a notification preference.
    pub async fn find_active_by_type(
        &self,
        notification_type: NotificationType,
    ) -> AppResult<Vec<subscription::Model>> {
        Subscription::find()
            .filter(subscription::Column::Status.eq(SubscriptionStatus::Active))
            .filter(subscription::Column::Active.eq(true))
            .filter(subscription::Column::EmailVerified.eq(true))
            .filter(subscription::Column::NotificationType.eq(notification_type))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Active subscriptions of a type not notified since `cutoff`.
    pub async fn find_due_for_digest(
        &self,
        notification_type: NotificationType,
        cutoff: DateTime<Utc>,
    ) -> AppResult<Vec<subscription::Model>> {
        let cutoff: DateTimeWithTimeZone = cutoff.into();
        Subscription::find()
            .filter(subscription::Column::Status.eq(SubscriptionStatus::Active))
            .filter(subscription::Column::Active.eq(true))
            .filter(subscription::Column::NotificationType.eq(notification_type))
            .filter(
                Condition::any()
                    .add(subscription::Column::LastNotificationSent.is_null())
                    .add(subscription::Column::LastNotificationSent.lt(cutoff)),
            )
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Stamp `last_notification_sent` on a set of subscriptions.
    pub async fn mark_notified(&self, ids: &[String], at: DateTime<Utc>) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let at: DateTimeWithTimeZone = at.into();
        let res = Subscription::update_many()
            .col_expr(
                subscription::Column::LastNotificationSent,
                Expr::value(at),
            )
            .filter(subscription::Column::Id.is_in(ids.to_vec()))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(res.rows_affected)
    }

    /// Count all subscriptions.
    pub async fn count_all(&self) -> AppResult<u64> {
        Subscription::find()
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count subscriptions in a status.
    pub async fn count_by_status(&self, status: SubscriptionStatus) -> AppResult<u64> {
        Subscription::find()
            .filter(subscription::Column::Status.eq(status))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count subscriptions with a notification preference.
    pub async fn count_by_type(&self, notification_type: NotificationType) -> AppResult<u64> {
        Subscription::find()
            .filter(subscription::Column::NotificationType.eq(notification_type))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_subscription(email: &str) -> subscription::Model {
        subscription::Model {
            id: "s1".to_string(),
            email: email.to_string(),
            token: "tok".to_string(),
            status: SubscriptionStatus::Active,
            notification_type: NotificationType::Weekly,
            email_verified: true,
            active: true,
            created_at: Utc::now().into(),
            verified_at: Some(Utc::now().into()),
            last_notification_sent: None,
        }
    }

    #[tokio::test]
    async fn test_find_by_token() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_subscription("a@example.com")]])
                .into_connection(),
        );

        let repo = SubscriptionRepository::new(db);
        let found = repo.find_by_token("tok").await.unwrap().unwrap();
        assert_eq!(found.email, "a@example.com");
    }

    #[tokio::test]
    async fn test_find_due_for_digest_includes_never_notified() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_subscription("a@example.com")]])
                .into_connection(),
        );

        let repo = SubscriptionRepository::new(Arc::clone(&db));
        let due = repo
            .find_due_for_digest(NotificationType::Weekly, Utc::now())
            .await
            .unwrap();
        assert_eq!(due.len(), 1);
        drop(repo);

        let log = Arc::try_unwrap(db).unwrap().into_transaction_log();
        let sql = &log[0].statements()[0].sql;
        assert!(sql.contains("\"last_notification_sent\" IS NULL OR"));
    }

    #[tokio::test]
    async fn test_mark_notified_empty_is_noop() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let repo = SubscriptionRepository::new(db);
        assert_eq!(repo.mark_notified(&[], Utc::now()).await.unwrap(), 0);
    }
}
