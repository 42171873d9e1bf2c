//! HTTP client for the email-service.

use std::time::Duration;

use async_trait::async_trait;
use quill_common::{AppError, AppResult, config::EmailServiceConfig};
use serde::Serialize;
use url::Url;

/// Magic link operations the blog-service delegates to the email-service.
#[async_trait]
pub trait MagicLinkClient: Send + Sync {
    /// Ask the email-service to issue and mail a magic link.
    async fn send_magic_link(&self, email: &str, username: Option<&str>) -> AppResult<()>;

    /// Redeem a token. True only for the first successful call.
    async fn validate_token(&self, token: &str) -> AppResult<bool>;

    /// Email bound to a token, if the token exists.
    async fn email_from_token(&self, token: &str) -> AppResult<Option<String>>;
}

#[derive(Serialize)]
struct MagicLinkBody<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
}

/// `reqwest` implementation of [`MagicLinkClient`].
#[derive(Clone)]
pub struct EmailServiceClient {
    http: reqwest::Client,
    base_url: Url,
}

impl EmailServiceClient {
    /// Create a client for the configured email-service.
    pub fn new(config: &EmailServiceConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {e}")))?;

        let base = format!("{}/api/v1/email/", config.base_url.trim_end_matches('/'));
        let base_url = Url::parse(&base)
            .map_err(|e| AppError::Config(format!("Invalid email service URL {base}: {e}")))?;

        Ok(Self { http, base_url })
    }

    fn url(&self, path: &str) -> AppResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| AppError::Internal(format!("Invalid email service path {path}: {e}")))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str, token: &str) -> AppResult<T> {
        let response = self
            .http
            .get(self.url(path)?)
            .query(&[("token", token)])
            .send()
            .await
            .map_err(|e| AppError::EmailService(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::EmailService(format!(
                "{path} returned {}",
                response.status()
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AppError::EmailService(format!("Invalid {path} response: {e}")))
    }
}

#[async_trait]
impl MagicLinkClient for EmailServiceClient {
    async fn send_magic_link(&self, email: &str, username: Option<&str>) -> AppResult<()> {
        let response = self
            .http
            .post(self.url("magic-link")?)
            .json(&MagicLinkBody { email, username })
            .send()
            .await
            .map_err(|e| AppError::EmailService(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(email, "Magic link requested");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(AppError::EmailService(format!(
                "magic-link returned {status}: {body}"
            )))
        }
    }

    async fn validate_token(&self, token: &str) -> AppResult<bool> {
        self.get_json("validate-token", token).await
    }

    async fn email_from_token(&self, token: &str) -> AppResult<Option<String>> {
        self.get_json("email-from-token", token).await
    }
}
