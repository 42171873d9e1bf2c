//! Business logic services.

#![allow(missing_docs)]

pub mod auth;
pub mod clap;
pub mod comment;
pub mod comment_tree;
pub mod email_client;
pub mod image;
pub mod jwt;
pub mod magic_link;
pub mod mailer;
pub mod post;
pub mod subscription;
pub mod templates;
pub mod token_cleanup;
pub mod user;

#[cfg(test)]
mod test_support;

pub use auth::{AuthService, AuthToken, LoginInput, RegisterInput};
pub use clap::ClapService;
pub use comment::{
    CommentService, CommentStatistics, CreateCommentInput, ModerationInput, UpdateCommentInput,
};
pub use comment_tree::{CommentTree, CommentView, CycleDetected};
pub use email_client::{EmailServiceClient, MagicLinkClient};
pub use self::image::{ImageService, ImageUpload, ProcessedImage, UpdateImageInput};
pub use jwt::{Claims, JwtService};
pub use magic_link::{IssuedMagicLink, MagicLinkRequest, MagicLinkService, mask_token};
pub use mailer::{LogMailer, MailSender, OutgoingMail, SmtpMailer, mailer_from_config};
pub use post::{CreatePostInput, PostService, UpdatePostInput};
pub use subscription::{NotifySummary, SubscribeInput, SubscriptionService, SubscriptionStatistics};
pub use token_cleanup::TokenCleanupTask;
pub use user::{UpdateUserInput, UserService, ensure_admin, ensure_staff};
