//! HS256 access tokens.

use crate::auth::models::JwtClaims;
use crate::constants::TOKEN_ISSUER;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tubely_core::AppError;
use uuid::Uuid;

/// Resolves bearer credentials to user identities.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[TOKEN_ISSUER]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verify a token and return the user it was issued to.
    pub fn resolve(&self, token: &str) -> Result<Uuid, AppError> {
        decode::<JwtClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims.sub)
            .map_err(|e| {
                tracing::debug!(error = %e, "JWT validation failed");
                AppError::Unauthorized("Couldn't validate JWT".to_string())
            })
    }

    /// Issue a token for `user_id` valid for `expires_in`.
    pub fn issue(&self, user_id: Uuid, expires_in: Duration) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = JwtClaims {
            sub: user_id,
            iss: TOKEN_ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-jwt-secret-at-least-32-characters";

    #[test]
    fn test_issue_and_resolve() {
        let jwt = JwtService::new(SECRET);
        let user_id = Uuid::new_v4();
        let token = jwt.issue(user_id, Duration::hours(1)).unwrap();
        assert_eq!(jwt.resolve(&token).unwrap(), user_id);
    }

    #[test]
    fn test_rejects_wrong_secret() {
        let token = JwtService::new(SECRET)
            .issue(Uuid::new_v4(), Duration::hours(1))
            .unwrap();
        let other = JwtService::new("another-secret-that-is-32-characters-long");
        assert!(matches!(
            other.resolve(&token),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_rejects_expired_token() {
        let jwt = JwtService::new(SECRET);
        // Past the default 60s leeway.
        let token = jwt.issue(Uuid::new_v4(), Duration::minutes(-5)).unwrap();
        assert!(jwt.resolve(&token).is_err());
    }

    #[test]
    fn test_rejects_garbage() {
        let jwt = JwtService::new(SECRET);
        assert!(jwt.resolve("not.a.jwt").is_err());
        assert!(jwt.resolve("").is_err());
    }
}
