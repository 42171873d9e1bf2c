//! Repositories: one per entity, exposing the queries the services use.

mod clap;
mod comment;
mod image;
mod magic_link_token;
mod notification_log;
mod post;
mod subscription;
mod user;

pub use clap::ClapRepository;
pub use comment::{CommentRepository, ParentLink, RankedId};
pub use image::{ImageRepository, ImageStats};
pub use magic_link_token::MagicLinkTokenRepository;
pub use notification_log::NotificationLogRepository;
pub use post::PostRepository;
pub use subscription::SubscriptionRepository;
pub use user::UserRepository;

/// Escape LIKE wildcards so user input matches literally.
pub(crate) fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
