//! Database entities.

#![allow(missing_docs)]

pub mod clap;
pub mod comment;
pub mod image;
pub mod magic_link_token;
pub mod notification_log;
pub mod post;
pub mod subscription;
pub mod user;

pub use clap::Entity as Clap;
pub use comment::Entity as Comment;
pub use image::Entity as Image;
pub use magic_link_token::Entity as MagicLinkToken;
pub use notification_log::Entity as NotificationLog;
pub use post::Entity as Post;
pub use subscription::Entity as Subscription;
pub use user::Entity as User;
