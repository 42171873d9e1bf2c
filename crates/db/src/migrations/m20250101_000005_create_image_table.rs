//! Create image table migration.

use sea_orm_migration::prelude::*;

use super::m20250101_000001_create_user_table::User;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Image::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Image::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Image::FileName).string_len(255).not_null())
                    .col(
                        ColumnDef::new(Image::StoredFileName)
                            .string_len(255)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Image::FilePath).string_len(512).not_null())
                    .col(ColumnDef::new(Image::ContentType).string_len(64).not_null())
                    .col(ColumnDef::new(Image::FileSize).big_integer().not_null())
                    .col(ColumnDef::new(Image::Width).integer().null())
                    .col(ColumnDef::new(Image::Height).integer().null())
                    .col(ColumnDef::new(Image::ImageType).string_len(32).not_null())
                    .col(ColumnDef::new(Image::UploaderId).string_len(32).not_null())
                    .col(ColumnDef::new(Image::AltText).string_len(255).null())
                    .col(ColumnDef::new(Image::Description).string_len(1000).null())
                    .col(
                        ColumnDef::new(Image::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Image::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Image::UpdatedAt).timestamp_with_time_zone().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_image_uploader")
                            .from(Image::Table, Image::UploaderId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_image_uploader_type")
                    .table(Image::Table)
                    .col(Image::UploaderId)
                    .col(Image::ImageType)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Image::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Image {
    Table,
    Id,
    FileName,
    StoredFileName,
    FilePath,
    ContentType,
    FileSize,
    Width,
    Height,
    ImageType,
    UploaderId,
    AltText,
    Description,
    IsActive,
    CreatedAt,
    UpdatedAt,
}
