//! Create clap table migration.

use sea_orm_migration::prelude::*;

use super::m20250101_000001_create_user_table::User;
use super::m20250101_000002_create_post_table::Post;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Clap::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Clap::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Clap::UserId).string_len(32).not_null())
                    .col(ColumnDef::new(Clap::PostId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Clap::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_clap_user")
                            .from(Clap::Table, Clap::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_clap_post")
                            .from(Clap::Table, Clap::PostId)
                            .to(Post::Table, Post::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (user_id, post_id) - one clap per user per post
        manager
            .create_index(
                Index::create()
                    .name("idx_clap_user_post")
                    .table(Clap::Table)
                    .col(Clap::UserId)
                    .col(Clap::PostId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_clap_post_id")
                    .table(Clap::Table)
                    .col(Clap::PostId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Clap::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Clap {
    Table,
    Id,
    UserId,
    PostId,
    CreatedAt,
}
