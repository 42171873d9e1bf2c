//! Comment entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Moderation status of a comment.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, EnumIter,
    DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommentStatus {
    #[sea_orm(string_value = "PENDING")]
    #[default]
    Pending,
    #[sea_orm(string_value = "APPROVED")]
    Approved,
    #[sea_orm(string_value = "SPAM")]
    Spam,
    #[sea_orm(string_value = "DELETED")]
    Deleted,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "comment")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(column_type = "Text")]
    pub content: String,

    pub author_id: String,

    pub post_id: String,

    /// Parent comment when this is a reply.
    pub parent_id: Option<String>,

    pub status: CommentStatus,

    pub moderated_by: Option<String>,

    pub moderated_at: Option<DateTimeWithTimeZone>,

    pub moderation_note: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Only pending comments go through moderation.
    #[must_use]
    pub fn can_be_moderated(&self) -> bool {
        self.status == CommentStatus::Pending
    }

    /// Readers only see approved comments.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.status == CommentStatus::Approved
    }

    #[must_use]
    pub const fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::AuthorId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Author,

    #[sea_orm(
        belongs_to = "super::post::Entity",
        from = "Column::PostId",
        to = "super::post::Column::Id",
        on_delete = "Cascade"
    )]
    Post,

    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::ParentId",
        to = "Column::Id",
        on_delete = "Cascade"
    )]
    Parent,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Author.def()
    }
}

impl Related<super::post::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Post.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn comment(status: CommentStatus, parent_id: Option<&str>) -> Model {
        Model {
            id: "c1".to_string(),
            content: "hello".to_string(),
            author_id: "u1".to_string(),
            post_id: "p1".to_string(),
            parent_id: parent_id.map(ToString::to_string),
            status,
            moderated_by: None,
            moderated_at: None,
            moderation_note: None,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    #[test]
    fn test_only_pending_can_be_moderated() {
        assert!(comment(CommentStatus::Pending, None).can_be_moderated());
        assert!(!comment(CommentStatus::Approved, None).can_be_moderated());
        assert!(!comment(CommentStatus::Spam, None).can_be_moderated());
        assert!(!comment(CommentStatus::Deleted, None).can_be_moderated());
    }

    #[test]
    fn test_visibility_and_reply() {
        assert!(comment(CommentStatus::Approved, None).is_visible());
        assert!(!comment(CommentStatus::Pending, None).is_visible());
        assert!(comment(CommentStatus::Pending, Some("c0")).is_reply());
        assert!(!comment(CommentStatus::Pending, None).is_reply());
    }
}
