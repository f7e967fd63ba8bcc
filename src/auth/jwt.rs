use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;

/// JWT payload; `sub` is the marketplace user id.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("token subject is not a user id")]
    InvalidSubject,
}

/// Signs an HS256 token for `user_id` that expires after
/// `jwt.expiration_days`.
///
/// # Errors
/// Returns `jsonwebtoken::errors::Error` if encoding fails
pub fn generate_token(
    config: &Config,
    user_id: Uuid,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = usize::try_from(Utc::now().timestamp()).unwrap_or_default();
    let lifetime = usize::try_from(config.jwt.expiration_days * 86_400).unwrap_or(usize::MAX);

    let claims = Claims {
        sub: user_id.to_string(),
        exp: now.saturating_add(lifetime),
        iat: now,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt.secret.as_bytes()),
    )
}

/// Checks signature and expiry and returns the claims.
///
/// # Errors
/// Returns `jsonwebtoken::errors::Error` if the token is invalid, expired or malformed
pub fn verify_token(config: &Config, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt.secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

pub fn verify_user(config: &Config, token: &str) -> Result<Uuid, TokenError> {
    let claims = verify_token(config, token)?;
    Uuid::parse_str(&claims.sub).map_err(|_| TokenError::InvalidSubject)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{boot::read_config, environment::Environment};

    #[test]
    fn test_issued_token_verifies_to_same_user() {
        let config = read_config(&Environment::Test).unwrap();
        let user_id = Uuid::new_v4();

        let token = generate_token(&config, user_id).unwrap();

        assert_eq!(verify_user(&config, &token).unwrap(), user_id);
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let config = read_config(&Environment::Test).unwrap();
        let mut other = config.clone();
        other.jwt.secret = "another-secret".to_string();

        let token = generate_token(&other, Uuid::new_v4()).unwrap();

        assert!(verify_user(&config, &token).is_err());
    }
}
