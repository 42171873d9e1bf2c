//! Create magic link token table migration (email-service schema).

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MagicLinkToken::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MagicLinkToken::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(MagicLinkToken::Token)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(MagicLinkToken::Email).string_len(255).not_null())
                    .col(
                        ColumnDef::new(MagicLinkToken::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MagicLinkToken::UsedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(MagicLinkToken::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_magic_link_token_email")
                    .table(MagicLinkToken::Table)
                    .col(MagicLinkToken::Email)
                    .to_owned(),
            )
            .await?;

        // The cleanup sweep deletes by expiry
        manager
            .create_index(
                Index::create()
                    .name("idx_magic_link_token_expires_at")
                    .table(MagicLinkToken::Table)
                    .col(MagicLinkToken::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MagicLinkToken::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum MagicLinkToken {
    Table,
    Id,
    Token,
    Email,
    ExpiresAt,
    UsedAt,
    CreatedAt,
}
