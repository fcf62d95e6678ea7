use axum::Json;
use axum::extract::State;
use sea_orm::EntityTrait;
use tracing::instrument;
use uuid::Uuid;

use crate::entity::image;
use crate::error::{AppError, ErrorBody};
use crate::extractors::path_id::PathId;
use crate::models::image::ImageResponse;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Images",
    operation_id = "getImage",
    summary = "Get an image by ID",
    params(("id" = Uuid, Path, description = "Image ID")),
    responses(
        (status = 200, description = "Image details", body = ImageResponse),
        (status = 404, description = "Image not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(id = %id))]
pub async fn get_image(
    State(state): State<AppState>,
    PathId(id): PathId,
) -> Result<Json<ImageResponse>, AppError> {
    let model = image::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Image not found".into()))?;
    Ok(Json(model.into()))
}
