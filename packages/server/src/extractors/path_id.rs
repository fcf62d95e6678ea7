use axum::{
    extract::{FromRequestParts, Path},
    http::request::Parts,
};
use uuid::Uuid;

use crate::error::AppError;

/// Single `{id}` path segment parsed as a UUID.
///
/// A segment that is not a UUID cannot name an existing row, so it is
/// reported as `NOT_FOUND` rather than a validation error.
#[derive(Debug, Clone, Copy)]
pub struct PathId(pub Uuid);

impl<S> FromRequestParts<S> for PathId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::NotFound("Resource not found".into()))?;
        Uuid::parse_str(raw.trim())
            .map(PathId)
            .map_err(|_| AppError::NotFound("Resource not found".into()))
    }
}
