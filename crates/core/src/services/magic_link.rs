//! Magic link token lifecycle (email-service).

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use quill_common::{AppResult, IdGenerator, config::MagicLinkConfig};
use quill_db::{entities::magic_link_token, repositories::MagicLinkTokenRepository};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{mailer::MailSender, templates};

/// Request to issue a magic link.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MagicLinkRequest {
    #[validate(email(message = "Email should be valid"))]
    pub email: String,

    pub username: Option<String>,
}

/// Outcome of issuing a magic link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedMagicLink {
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

/// Mask a token for logging: first 4 and last 4 characters.
#[must_use]
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() < 8 {
        return "***".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// Issues, validates and redeems magic link tokens.
#[derive(Clone)]
pub struct MagicLinkService {
    token_repo: MagicLinkTokenRepository,
    mailer: Arc<dyn MailSender>,
    id_gen: IdGenerator,
    config: MagicLinkConfig,
}

impl MagicLinkService {
    /// Create a new magic link service.
    #[must_use]
    pub fn new(
        token_repo: MagicLinkTokenRepository,
        mailer: Arc<dyn MailSender>,
        config: MagicLinkConfig,
    ) -> Self {
        Self {
            token_repo,
            mailer,
            id_gen: IdGenerator::new(),
            config,
        }
    }

    /// Issue a token for the email and mail the link.
    ///
    /// Earlier unused tokens for the same email are discarded first, so only
    /// the most recent link works.
    pub async fn issue(&self, request: MagicLinkRequest) -> AppResult<IssuedMagicLink> {
        request.validate()?;

        let removed = self.token_repo.delete_unused_by_email(&request.email).await?;
        if removed > 0 {
            tracing::debug!(email = %request.email, removed, "Discarded previous magic links");
        }

        let now = Utc::now();
        let expires_at = now + Duration::minutes(self.config.expiration_minutes);
        let token = self.id_gen.generate_token();

        let model = magic_link_token::ActiveModel {
            id: Set(self.id_gen.generate()),
            token: Set(token.clone()),
            email: Set(request.email.clone()),
            expires_at: Set(expires_at.into()),
            used_at: Set(None),
            created_at: Set(now.into()),
        };
        let row = self.token_repo.create(model).await?;

        let mail = templates::magic_link(
            &request.email,
            request.username.as_deref(),
            &self.magic_link_url(&token),
            &self.config.blog_name,
            self.config.expiration_minutes,
        );
        if let Err(e) = self.mailer.send(mail).await {
            // A link nobody received must not stay redeemable.
            if let Err(cleanup) = self.token_repo.delete(&row.id).await {
                tracing::error!(token = %mask_token(&token), error = %cleanup, "Failed to discard unsent magic link");
            }
            return Err(e);
        }

        tracing::info!(email = %request.email, token = %mask_token(&token), "Magic link issued");

        Ok(IssuedMagicLink {
            email: request.email,
            expires_at,
        })
    }

    /// Link embedded in the email.
    #[must_use]
    pub fn magic_link_url(&self, token: &str) -> String {
        format!(
            "{}/login?token={}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(token)
        )
    }

    /// Whether the token exists, is unused and has not expired. No side effects.
    pub async fn is_valid(&self, token: &str) -> bool {
        match self.token_repo.find_by_token(token).await {
            Ok(Some(row)) => row.is_valid_at(Utc::now()),
            Ok(None) => false,
            Err(e) => {
                tracing::error!(token = %mask_token(token), error = %e, "Token lookup failed");
                false
            }
        }
    }

    /// Redeem the token. Returns true for exactly one caller per token.
    pub async fn redeem(&self, token: &str) -> bool {
        match self.token_repo.redeem(token, Utc::now()).await {
            Ok(true) => {
                tracing::info!(token = %mask_token(token), "Magic link redeemed");
                true
            }
            Ok(false) => {
                tracing::warn!(token = %mask_token(token), "Magic link missing, used or expired");
                false
            }
            Err(e) => {
                tracing::error!(token = %mask_token(token), error = %e, "Failed to redeem magic link");
                false
            }
        }
    }

    /// Email the token was issued for.
    pub async fn email_from_token(&self, token: &str) -> AppResult<Option<String>> {
        Ok(self
            .token_repo
            .find_by_token(token)
            .await?
            .map(|row| row.email))
    }

    /// Delete every expired token. Returns the number removed.
    pub async fn cleanup_expired(&self) -> AppResult<u64> {
        self.token_repo.delete_expired(Utc::now()).await
    }
}
