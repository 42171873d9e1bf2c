//! Image entity (uploaded files).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// What an image is used for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImageType {
    #[sea_orm(string_value = "PROFILE_PICTURE")]
    ProfilePicture,
    #[sea_orm(string_value = "FEATURED_IMAGE")]
    FeaturedImage,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "image")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Original file name as uploaded.
    pub file_name: String,

    #[sea_orm(unique)]
    pub stored_file_name: String,

    pub file_path: String,

    pub content_type: String,

    pub file_size: i64,

    pub width: Option<i32>,

    pub height: Option<i32>,

    pub image_type: ImageType,

    pub uploader_id: String,

    pub alt_text: Option<String>,

    pub description: Option<String>,

    /// Soft delete flag.
    pub is_active: bool,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Featured images are served without authentication.
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.image_type == ImageType::FeaturedImage
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UploaderId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Uploader,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Uploader.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
