//! Session tokens (HS256 JWT).

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use quill_common::{AppError, AppResult, config::JwtConfig};
use serde::{Deserialize, Serialize};

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Email of the user.
    pub sub: String,
    /// Role name (`USER`, `ADMIN`, `MODERATOR`).
    pub role: String,
    /// Issued at (seconds since epoch).
    pub iat: i64,
    /// Expiry (seconds since epoch).
    pub exp: i64,
}

/// Issues and verifies session tokens.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_secs: i64,
}

impl JwtService {
    /// Create a JWT service from configuration.
    #[must_use]
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            expiration_secs: config.expiration_secs,
        }
    }

    /// Issue a token for `email` with `role`.
    pub fn issue(&self, email: &str, role: &str) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: email.to_string(),
            role: role.to_string(),
            iat: now,
            exp: now + self.expiration_secs,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {e}")))
    }

    /// Verify a token and return its claims.
    ///
    /// Any failure (bad signature, malformed, expired) is `Unauthorized`.
    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected session token");
                AppError::Unauthorized
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn service(secret: &str, expiration_secs: i64) -> JwtService {
        JwtService::new(&JwtConfig {
            secret: secret.to_string(),
            expiration_secs,
        })
    }

    #[test]
    fn test_issue_and_verify() {
        let jwt = service("secret", 3600);
        let token = jwt.issue("a@example.com", "ADMIN").unwrap();

        let claims = jwt.verify(&token).unwrap();
        assert_eq!(claims.sub, "a@example.com");
        assert_eq!(claims.role, "ADMIN");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_wrong_secret_is_unauthorized() {
        let token = service("one", 3600).issue("a@example.com", "USER").unwrap();
        assert!(matches!(
            service("two", 3600).verify(&token),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn test_expired_token_is_unauthorized() {
        // Past the default 60s leeway.
        let jwt = service("secret", -120);
        let token = jwt.issue("a@example.com", "USER").unwrap();
        assert!(matches!(jwt.verify(&token), Err(AppError::Unauthorized)));
    }

    #[test]
    fn test_garbage_is_unauthorized() {
        assert!(service("secret", 60).verify("not.a.jwt").is_err());
    }
}
