use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::MAX_JWT_EXPIRY_HOURS;

/// Claims carried by admin session tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    // Accounts are keyed by UUID. Tokens whose `userId` is a 24-hex document
    // id from the legacy admin backend fail to decode here and are rejected.
    #[serde(rename = "userId", alias = "id")]
    pub user_id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default = "default_role")]
    pub role: String,
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
}

fn default_role() -> String {
    "user".to_string()
}

impl Claims {
    pub fn new(user: &AuthUser, expiry_hours: u64) -> Self {
        let now = Utc::now();
        let exp = (now + Duration::hours(expiry_hours.min(MAX_JWT_EXPIRY_HOURS) as i64)).timestamp();

        Self {
            user_id: user.user_id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role.clone(),
            exp,
            iat: now.timestamp(),
        }
    }
}

/// Authenticated user context extracted from a verified token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            name: claims.name,
            email: claims.email,
            role: claims.role,
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("JWT secret not configured")]
    MissingSecret,

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
}

/// Verifies (and, for tooling, issues) HS256 tokens against one shared secret.
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    encoding_key: EncodingKey,
    expiry_hours: u64,
    configured: bool,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("expiry_hours", &self.expiry_hours)
            .field("configured", &self.configured)
            .finish_non_exhaustive()
    }
}

impl TokenVerifier {
    pub fn new(secret: &str, expiry_hours: u64) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            expiry_hours,
            configured: !secret.is_empty(),
        }
    }

    /// Check signature and expiry, returning the caller's identity.
    pub fn verify(&self, token: &str) -> Result<AuthUser, AuthError> {
        if !self.configured {
            return Err(AuthError::MissingSecret);
        }

        let token_data = decode::<Claims>(token.trim(), &self.decoding_key, &Validation::default())?;
        Ok(AuthUser::from(token_data.claims))
    }

    pub fn issue(&self, user: &AuthUser) -> Result<String, AuthError> {
        if !self.configured {
            return Err(AuthError::MissingSecret);
        }

        let claims = Claims::new(user, self.expiry_hours);
        Ok(encode(&Header::default(), &claims, &self.encoding_key)?)
    }
}
