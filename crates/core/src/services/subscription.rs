//! Email subscriptions and new-post notifications.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use quill_common::{AppError, AppResult, IdGenerator, config::MagicLinkConfig};
use quill_db::{
    entities::{
        notification_log,
        notification_log::DeliveryStatus,
        post, subscription,
        subscription::{NotificationType, SubscriptionStatus},
    },
    repositories::{NotificationLogRepository, SubscriptionRepository},
};
use sea_orm::{IntoActiveModel, Set};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{
    mailer::{MailSender, OutgoingMail},
    templates,
};

const EXCERPT_CHARS: usize = 200;

/// Input for subscribing.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeInput {
    #[validate(email(message = "Please provide a valid email address"))]
    pub email: String,

    #[serde(default)]
    pub notification_type: Option<NotificationType>,
}

/// Subscription counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStatistics {
    pub total_subscriptions: u64,
    pub total_active: u64,
    pub total_pending: u64,
    pub total_inactive: u64,
    pub total_suspended: u64,
    pub instant: u64,
    pub daily: u64,
    pub weekly: u64,
    pub none: u64,
}

/// Result of a notification fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NotifySummary {
    pub sent: usize,
    pub failed: usize,
}

/// Subscription service.
#[derive(Clone)]
pub struct SubscriptionService {
    subscription_repo: SubscriptionRepository,
    log_repo: NotificationLogRepository,
    mailer: Arc<dyn MailSender>,
    id_gen: IdGenerator,
    site_url: String,
    blog_name: String,
}

impl SubscriptionService {
    /// Create a new subscription service.
    #[must_use]
    pub fn new(
        subscription_repo: SubscriptionRepository,
        log_repo: NotificationLogRepository,
        mailer: Arc<dyn MailSender>,
        config: &MagicLinkConfig,
    ) -> Self {
        Self {
            subscription_repo,
            log_repo,
            mailer,
            id_gen: IdGenerator::new(),
            site_url: config.base_url.trim_end_matches('/').to_string(),
            blog_name: config.blog_name.clone(),
        }
    }

    /// Create a pending subscription and mail a verification link.
    pub async fn subscribe(&self, input: SubscribeInput) -> AppResult<subscription::Model> {
        input.validate()?;

        if self
            .subscription_repo
            .find_by_email(&input.email)
            .await?
            .is_some()
        {
            return Err(AppError::BadRequest(format!(
                "Email is already subscribed: {}",
                input.email
            )));
        }

        let model = subscription::ActiveModel {
            id: Set(self.id_gen.generate()),
            email: Set(input.email),
            token: Set(self.id_gen.generate_token()),
            status: Set(SubscriptionStatus::Pending),
            notification_type: Set(input.notification_type.unwrap_or_default()),
            email_verified: Set(false),
            active: Set(true),
            created_at: Set(Utc::now().into()),
            verified_at: Set(None),
            last_notification_sent: Set(None),
        };
        let subscription = self.subscription_repo.create(model).await?;

        let url = format!("{}/subscriptions/verify/{}", self.site_url, subscription.token);
        self.send_logged(templates::subscription_verification(
            &subscription.email,
            &url,
            &self.blog_name,
        ))
        .await;

        tracing::info!(subscription_id = %subscription.id, "Subscription created");
        Ok(subscription)
    }

    /// Confirm a subscription from its emailed token.
    pub async fn verify(&self, token: &str) -> AppResult<subscription::Model> {
        let existing = self.get_by_token(token).await?;
        if existing.email_verified {
            return Err(AppError::BadRequest("Email is already verified".to_string()));
        }

        let mut model = existing.into_active_model();
        model.status = Set(SubscriptionStatus::Active);
        model.email_verified = Set(true);
        model.active = Set(true);
        model.verified_at = Set(Some(Utc::now().into()));
        let subscription = self.subscription_repo.update(model).await?;

        self.send_logged(templates::welcome(
            &subscription.email,
            notification_label(subscription.notification_type),
            &self.blog_name,
        ))
        .await;

        tracing::info!(subscription_id = %subscription.id, "Subscription verified");
        Ok(subscription)
    }

    /// Deactivate a subscription.
    pub async fn unsubscribe(&self, token: &str) -> AppResult<()> {
        let mut model = self.get_by_token(token).await?.into_active_model();
        model.status = Set(SubscriptionStatus::Inactive);
        model.active = Set(false);
        model.notification_type = Set(NotificationType::Disabled);
        let subscription = self.subscription_repo.update(model).await?;

        self.send_logged(templates::unsubscribed(&subscription.email, &self.blog_name))
            .await;
        tracing::info!(subscription_id = %subscription.id, "Unsubscribed");
        Ok(())
    }

    /// Change the notification preference.
    pub async fn update_preferences(
        &self,
        token: &str,
        notification_type: NotificationType,
    ) -> AppResult<subscription::Model> {
        let mut model = self.get_by_token(token).await?.into_active_model();
        model.notification_type = Set(notification_type);
        self.subscription_repo.update(model).await
    }

    /// Look up a subscription by token.
    pub async fn get_by_token(&self, token: &str) -> AppResult<subscription::Model> {
        self.subscription_repo
            .find_by_token(token)
            .await?
            .ok_or_else(|| AppError::NotFound("Subscription".to_string()))
    }

    /// Look up a subscription by email.
    pub async fn get_by_email(&self, email: &str) -> AppResult<subscription::Model> {
        self.subscription_repo
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::NotFound("Subscription".to_string()))
    }

    /// Active subscriptions.
    pub async fn list_active(&self) -> AppResult<Vec<subscription::Model>> {
        self.subscription_repo.find_active().await
    }

    /// Active subscriptions of `notification_type` not notified since `older_than`.
    pub async fn due_for_digest(
        &self,
        notification_type: NotificationType,
        older_than: DateTime<Utc>,
    ) -> AppResult<Vec<subscription::Model>> {
        self.subscription_repo
            .find_due_for_digest(notification_type, older_than)
            .await
    }

    /// Counts by status and by notification type.
    pub async fn statistics(&self) -> AppResult<SubscriptionStatistics> {
        let repo = &self.subscription_repo;
        Ok(SubscriptionStatistics {
            total_subscriptions: repo.count_all().await?,
            total_active: repo.count_by_status(SubscriptionStatus::Active).await?,
            total_pending: repo.count_by_status(SubscriptionStatus::Pending).await?,
            total_inactive: repo.count_by_status(SubscriptionStatus::Inactive).await?,
            total_suspended: repo.count_by_status(SubscriptionStatus::Suspended).await?,
            instant: repo.count_by_type(NotificationType::Instant).await?,
            daily: repo.count_by_type(NotificationType::Daily).await?,
            weekly: repo.count_by_type(NotificationType::Weekly).await?,
            none: repo.count_by_type(NotificationType::Disabled).await?,
        })
    }

    /// Mail every instant subscriber about a newly published post.
    ///
    /// Each attempt is recorded in the notification log. Only successful
    /// deliveries advance `last_notification_sent`.
    pub async fn notify_new_post(&self, post: &post::Model) -> AppResult<NotifySummary> {
        let subscribers = self
            .subscription_repo
            .find_active_by_type(NotificationType::Instant)
            .await?;

        let post_url = format!("{}/posts/{}", self.site_url, post.id);
        let excerpt = excerpt(&post.content);
        let mut summary = NotifySummary::default();
        let mut delivered = Vec::new();

        for subscriber in subscribers {
            let mail = templates::new_post(
                &subscriber.email,
                &post.title,
                &post_url,
                &excerpt,
                &self.blog_name,
            );
            let subject = mail.subject.clone();
            let content = mail.text_body.clone();

            let (status, error_message) = match self.mailer.send(mail).await {
                Ok(()) => {
                    summary.sent += 1;
                    delivered.push(subscriber.id.clone());
                    (DeliveryStatus::Sent, None)
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!(subscription_id = %subscriber.id, error = %e, "New post notification failed");
                    (DeliveryStatus::Failed, Some(e.to_string()))
                }
            };

            let now = Utc::now();
            self.log_repo
                .create(notification_log::ActiveModel {
                    id: Set(self.id_gen.generate()),
                    subscription_id: Set(subscriber.id.clone()),
                    email: Set(subscriber.email.clone()),
                    notification_type: Set(subscriber.notification_type),
                    subject: Set(subject),
                    content: Set(Some(content)),
                    sent_at: Set((status == DeliveryStatus::Sent).then(|| now.into())),
                    status: Set(status),
                    error_message: Set(error_message),
                    post_id: Set(Some(post.id.clone())),
                    created_at: Set(now.into()),
                })
                .await?;
        }

        self.subscription_repo
            .mark_notified(&delivered, Utc::now())
            .await?;

        tracing::info!(
            post_id = %post.id,
            sent = summary.sent,
            failed = summary.failed,
            "New post notifications processed"
        );
        Ok(summary)
    }

    async fn send_logged(&self, mail: OutgoingMail) {
        let to = mail.to.clone();
        if let Err(e) = self.mailer.send(mail).await {
            tracing::error!(to = %to, error = %e, "Failed to send subscription email");
        }
    }
}

const fn notification_label(notification_type: NotificationType) -> &'static str {
    match notification_type {
        NotificationType::Instant => "INSTANT",
        NotificationType::Daily => "DAILY",
        NotificationType::Weekly => "WEEKLY",
        NotificationType::Disabled => "NONE",
    }
}

fn excerpt(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(EXCERPT_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head.trim_end())
    } else {
        head
    }
}
