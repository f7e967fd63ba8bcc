use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use uuid::Uuid;

use crate::{api::error::ApiError, auth::jwt, config::Config};

/// The caller identified by the `Authorization: Bearer` token.
///
/// Users live in the marketplace's own database, so only the id from the
/// token is available.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser {
    pub id: Uuid,
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    Config: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized)?;

        let config = Config::from_ref(state);
        let id = jwt::verify_user(&config, token).map_err(|_| ApiError::Unauthorized)?;

        Ok(Self { id })
    }
}
