use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::error::AppError;

/// JWT service for access token generation and validation (HS256).
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expiry_minutes: i64,
}

/// Claims carried by access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Email
    pub email: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// JWT ID
    pub jti: String,
}

impl AccessTokenClaims {
    /// The acting user id; tokens are only issued with UUID subjects.
    pub fn user_id(&self) -> Result<Uuid, AppError> {
        self.sub
            .parse()
            .map_err(|e| AppError::Unauthorized(anyhow::anyhow!("Invalid token subject: {}", e)))
    }
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            access_token_expiry_minutes: config.access_token_expiry_minutes,
        }
    }

    /// Generate an access token for a user.
    pub fn generate_access_token(&self, user_id: Uuid, email: &str) -> Result<String, AppError> {
        let now = Utc::now();
        let exp = now + Duration::minutes(self.access_token_expiry_minutes);

        let claims = AccessTokenClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok(token)
    }

    /// Validate an access token and return its claims.
    pub fn validate_access_token(&self, token: &str) -> Result<AccessTokenClaims, AppError> {
        let data = decode::<AccessTokenClaims>(
            token,
            &self.decoding_key,
            &Validation::new(Algorithm::HS256),
        )?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        JwtService::new(&JwtConfig {
            secret: "test-secret".to_string(),
            access_token_expiry_minutes: 60,
        })
    }

    #[test]
    fn token_round_trips() {
        let svc = service();
        let user_id = Uuid::new_v4();

        let token = svc
            .generate_access_token(user_id, "user@example.com")
            .expect("Failed to generate token");
        let claims = svc
            .validate_access_token(&token)
            .expect("Failed to validate token");

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.email, "user@example.com");
        assert_eq!(claims.user_id().unwrap(), user_id);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let svc = service();
        let token = svc
            .generate_access_token(Uuid::new_v4(), "user@example.com")
            .expect("Failed to generate token");

        let mut tampered = token.clone();
        tampered.push('x');
        assert!(svc.validate_access_token(&tampered).is_err());
    }

    #[test]
    fn token_from_another_secret_is_rejected() {
        let svc = service();
        let other = JwtService::new(&JwtConfig {
            secret: "other-secret".to_string(),
            access_token_expiry_minutes: 60,
        });

        let token = other
            .generate_access_token(Uuid::new_v4(), "user@example.com")
            .expect("Failed to generate token");
        assert!(svc.validate_access_token(&token).is_err());
    }
}
