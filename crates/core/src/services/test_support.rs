//! Fixtures shared by service tests.

use std::collections::BTreeMap;

use chrono::Utc;
use maplit::btreemap;
use quill_db::entities::{
    comment, comment::CommentStatus, image, image::ImageType, post, post::PostStatus,
    subscription,
    subscription::{NotificationType, SubscriptionStatus},
    user,
    user::UserRole,
};
use sea_orm::{MockExecResult, Value};

pub fn user(id: &str, role: UserRole) -> user::Model {
    user::Model {
        id: id.to_string(),
        username: format!("user_{id}"),
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        email: format!("{id}@example.com"),
        password: None,
        role,
        profile_picture_url: None,
        profile_picture_filename: None,
        created_at: Utc::now().into(),
        updated_at: None,
    }
}

pub fn post(id: &str, author_id: &str, status: PostStatus) -> post::Model {
    post::Model {
        id: id.to_string(),
        title: format!("Post {id}"),
        content: "Content".to_string(),
        author_id: author_id.to_string(),
        status,
        image_url: None,
        featured_image_id: None,
        claps_count: 0,
        created_at: Utc::now().into(),
        updated_at: None,
    }
}

pub fn comment(
    id: &str,
    post_id: &str,
    author_id: &str,
    parent_id: Option<&str>,
    status: CommentStatus,
) -> comment::Model {
    comment::Model {
        id: id.to_string(),
        content: format!("Comment {id}"),
        author_id: author_id.to_string(),
        post_id: post_id.to_string(),
        parent_id: parent_id.map(str::to_string),
        status,
        moderated_by: None,
        moderated_at: None,
        moderation_note: None,
        created_at: Utc::now().into(),
        updated_at: None,
    }
}

pub fn image(id: &str, uploader_id: &str, image_type: ImageType) -> image::Model {
    image::Model {
        id: id.to_string(),
        file_name: "photo.png".to_string(),
        stored_file_name: format!("20240101_000000_{id}.png"),
        file_path: format!("uploads/images/20240101_000000_{id}.png"),
        content_type: "image/png".to_string(),
        file_size: 1024,
        width: Some(4),
        height: Some(4),
        image_type,
        uploader_id: uploader_id.to_string(),
        alt_text: None,
        description: None,
        is_active: true,
        created_at: Utc::now().into(),
        updated_at: None,
    }
}

pub fn subscription(
    id: &str,
    status: SubscriptionStatus,
    notification_type: NotificationType,
) -> subscription::Model {
    subscription::Model {
        id: id.to_string(),
        email: format!("{id}@example.com"),
        token: format!("token-{id}"),
        status,
        notification_type,
        email_verified: status == SubscriptionStatus::Active,
        active: status != SubscriptionStatus::Inactive,
        created_at: Utc::now().into(),
        verified_at: None,
        last_notification_sent: None,
    }
}

/// Row returned by `PaginatorTrait::count`.
pub fn count(n: i64) -> BTreeMap<&'static str, Value> {
    btreemap! { "num_items" => Value::BigInt(Some(n)) }
}

pub const fn exec(rows_affected: u64) -> MockExecResult {
    MockExecResult {
        last_insert_id: 0,
        rows_affected,
    }
}
