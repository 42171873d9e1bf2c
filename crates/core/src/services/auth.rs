//! Registration and magic-link login (blog-service).

use std::sync::Arc;

use chrono::Utc;
use quill_common::{AppError, AppResult, IdGenerator};
use quill_db::{
    entities::{user, user::UserRole},
    repositories::UserRepository,
};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{email_client::MagicLinkClient, jwt::JwtService};

/// Input for registering a user.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInput {
    #[validate(length(min = 3, max = 50, message = "Username must be between 3 and 50 characters"))]
    pub username: String,

    #[validate(length(min = 1, max = 50, message = "First name is required"))]
    pub first_name: String,

    #[validate(length(min = 1, max = 50, message = "Last name is required"))]
    pub last_name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

/// Input for requesting a magic link.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginInput {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

/// Session token handed out after a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthToken {
    pub token: String,
    pub token_type: String,
    pub email: String,
    pub username: String,
    pub role: String,
}

impl AuthToken {
    fn bearer(token: String, user: &user::Model) -> Self {
        Self {
            token,
            token_type: "Bearer".to_string(),
            email: user.email.clone(),
            username: user.username.clone(),
            role: user.role.as_str().to_string(),
        }
    }
}

/// Authentication service.
#[derive(Clone)]
pub struct AuthService {
    user_repo: UserRepository,
    magic_links: Arc<dyn MagicLinkClient>,
    jwt: JwtService,
    id_gen: IdGenerator,
}

impl AuthService {
    /// Create a new auth service.
    #[must_use]
    pub fn new(
        user_repo: UserRepository,
        magic_links: Arc<dyn MagicLinkClient>,
        jwt: JwtService,
    ) -> Self {
        Self {
            user_repo,
            magic_links,
            jwt,
            id_gen: IdGenerator::new(),
        }
    }

    /// Register a new user with role USER and no password.
    pub async fn register(&self, input: RegisterInput) -> AppResult<user::Model> {
        input.validate()?;

        if self.user_repo.exists_by_email(&input.email).await? {
            return Err(AppError::BadRequest(
                "User with this email already exists.".to_string(),
            ));
        }
        if self.user_repo.exists_by_username(&input.username).await? {
            return Err(AppError::BadRequest("Username is already taken.".to_string()));
        }

        let model = user::ActiveModel {
            id: Set(self.id_gen.generate()),
            username: Set(input.username),
            first_name: Set(input.first_name),
            last_name: Set(input.last_name),
            email: Set(input.email),
            password: Set(None),
            role: Set(UserRole::User),
            profile_picture_url: Set(None),
            profile_picture_filename: Set(None),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };

        let user = self.user_repo.create(model).await?;
        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Ask the email-service to mail a magic link to a registered user.
    pub async fn login(&self, input: LoginInput) -> AppResult<()> {
        input.validate()?;

        let user = self
            .user_repo
            .find_by_email(&input.email)
            .await?
            .ok_or_else(|| AppError::BadRequest("User not found".to_string()))?;

        self.magic_links
            .send_magic_link(&user.email, Some(&user.username))
            .await
            .map_err(|e| {
                tracing::error!(email = %user.email, error = %e, "Magic link request failed");
                AppError::Mail("Failed to send magic link".to_string())
            })
    }

    /// Redeem a magic link token and issue a session token.
    pub async fn verify_magic_link(&self, token: &str) -> AppResult<AuthToken> {
        let invalid = || AppError::BadRequest("Invalid or expired magic link token".to_string());

        let redeemed = self.magic_links.validate_token(token).await.map_err(|e| {
            tracing::warn!(error = %e, "Token validation call failed");
            invalid()
        })?;
        if !redeemed {
            return Err(invalid());
        }

        let email = self
            .magic_links
            .email_from_token(token)
            .await
            .ok()
            .flatten()
            .ok_or_else(invalid)?;

        let user = self
            .user_repo
            .find_by_email(&email)
            .await?
            .ok_or_else(invalid)?;

        let jwt = self.jwt.issue(&user.email, user.role.as_str())?;
        tracing::info!(user_id = %user.id, "Magic link login completed");
        Ok(AuthToken::bearer(jwt, &user))
    }

    /// Issue a fresh session token for an authenticated user.
    pub fn refresh(&self, user: &user::Model) -> AppResult<AuthToken> {
        let jwt = self.jwt.issue(&user.email, user.role.as_str())?;
        Ok(AuthToken::bearer(jwt, user))
    }

    /// Resolve a bearer token to its user.
    pub async fn authenticate(&self, token: &str) -> AppResult<user::Model> {
        let claims = self.jwt.verify(token)?;
        self.user_repo
            .find_by_email(&claims.sub)
            .await?
            .ok_or(AppError::Unauthorized)
    }
}
