//! Create notification log table migration.

use sea_orm_migration::prelude::*;

use super::m20250101_000006_create_subscription_table::Subscription;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(NotificationLog::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(NotificationLog::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(NotificationLog::SubscriptionId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(NotificationLog::Email).string_len(255).not_null())
                    .col(
                        ColumnDef::new(NotificationLog::NotificationType)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(NotificationLog::Subject).string_len(255).not_null())
                    .col(ColumnDef::new(NotificationLog::Content).text().null())
                    .col(
                        ColumnDef::new(NotificationLog::Status)
                            .string_len(16)
                            .not_null()
                            .default("PENDING"),
                    )
                    .col(ColumnDef::new(NotificationLog::ErrorMessage).text().null())
                    .col(ColumnDef::new(NotificationLog::PostId).string_len(32).null())
                    .col(
                        ColumnDef::new(NotificationLog::SentAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(NotificationLog::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notification_log_subscription")
                            .from(NotificationLog::Table, NotificationLog::SubscriptionId)
                            .to(Subscription::Table, Subscription::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_notification_log_subscription_id")
                    .table(NotificationLog::Table)
                    .col(NotificationLog::SubscriptionId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(NotificationLog::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum NotificationLog {
    Table,
    Id,
    SubscriptionId,
    Email,
    NotificationType,
    Subject,
    Content,
    Status,
    ErrorMessage,
    PostId,
    SentAt,
    CreatedAt,
}
