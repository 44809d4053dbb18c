//! JWT token generation and validation

use async_trait::async_trait;
use investhub_entitlements::{FetchError, IdentitySource};
use investhub_shared::types::{AppRole, User, UserId};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

/// JWT claims carried by InvestHub session tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Platform role (`user`, `advisor`, `admin`, ...)
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Issued at
    pub iat: i64,
    /// Expiration
    pub exp: i64,
}

impl From<Claims> for User {
    fn from(claims: Claims) -> Self {
        Self {
            id: UserId(claims.sub),
            email: claims.email,
            full_name: claims.name,
            app_role: AppRole::from(claims.role),
        }
    }
}

/// JWT manager for token operations
#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry_hours: i64,
}

impl JwtManager {
    /// Create a new JWT manager
    pub fn new(secret: &str, expiry_hours: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiry_hours,
        }
    }

    /// Issue a session token for `user`
    pub fn generate_token(&self, user: &User) -> Result<String, JwtError> {
        let now = OffsetDateTime::now_utc();
        let exp = now + Duration::hours(self.expiry_hours);

        let claims = Claims {
            sub: user.id.to_string(),
            role: user.app_role.to_string(),
            email: user.email.clone(),
            name: user.full_name.clone(),
            iat: now.unix_timestamp(),
            exp: exp.unix_timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| JwtError::Encoding(e.to_string()))
    }

    /// Validate and decode a token
    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 60; // 60 second clock skew tolerance

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
                jsonwebtoken::errors::ErrorKind::InvalidToken => JwtError::Invalid,
                jsonwebtoken::errors::ErrorKind::InvalidAlgorithm => JwtError::Invalid,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => JwtError::Invalid,
                _ => JwtError::Validation(e.to_string()),
            })
    }

    pub fn expiry_seconds(&self) -> i64 {
        self.expiry_hours * 3600
    }
}

#[async_trait]
impl IdentitySource for JwtManager {
    async fn current_user(&self, access_token: &str) -> Result<Option<User>, FetchError> {
        match self.validate_token(access_token) {
            Ok(claims) => Ok(Some(claims.into())),
            Err(e) => {
                tracing::debug!(error = %e, "Rejected session token, treating request as guest");
                Ok(None)
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Token has expired")]
    Expired,
    #[error("Invalid token")]
    Invalid,
    #[error("Token encoding failed: {0}")]
    Encoding(String),
    #[error("Token validation failed: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-chars!";

    #[test]
    fn test_token_generation_and_validation() {
        let jwt = JwtManager::new(SECRET, 24);
        let mut user = User::new("u1", AppRole::Advisor);
        user.email = Some("advisor@example.com".to_string());

        let token = jwt.generate_token(&user).expect("Failed to generate token");
        let claims = jwt.validate_token(&token).expect("Invalid token");

        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.role, "advisor");
        assert_eq!(claims.exp - claims.iat, jwt.expiry_seconds());

        let decoded = User::from(claims);
        assert_eq!(decoded, user);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issuer = JwtManager::new(SECRET, 24);
        let other = JwtManager::new("another-secret-key-at-least-32-chars", 24);
        let token = issuer
            .generate_token(&User::new("u1", AppRole::User))
            .expect("Failed to generate token");

        assert!(matches!(other.validate_token(&token), Err(JwtError::Invalid)));
    }

    #[test]
    fn test_expired_token_rejected() {
        let jwt = JwtManager::new(SECRET, -1);
        let token = jwt
            .generate_token(&User::new("u1", AppRole::User))
            .expect("Failed to generate token");

        assert!(matches!(jwt.validate_token(&token), Err(JwtError::Expired)));
    }

    #[tokio::test]
    async fn test_identity_source() {
        let jwt = JwtManager::new(SECRET, 24);
        let token = jwt
            .generate_token(&User::new("a1", AppRole::SuperAdmin))
            .expect("Failed to generate token");

        let user = jwt.current_user(&token).await.unwrap().unwrap();
        assert!(user.app_role.is_admin());
        assert!(jwt.current_user("garbage").await.unwrap().is_none());
    }
}
