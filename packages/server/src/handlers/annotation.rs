use axum::Json;
use axum::extract::State;
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::models::cluster::WorkflowResponse;
use crate::models::image::OutlierAnnotation;
use crate::state::AppState;
use crate::workflow::WorkflowService;

#[utoipa::path(
    post,
    path = "/annotate-outliers",
    tag = "Annotations",
    operation_id = "annotateOutliers",
    summary = "Label outlier images individually",
    description = "Each entry gives one outlier image its own person name, custom-label flag, and quality tags. All images must be outliers of the same cluster; otherwise nothing is changed. An empty list is accepted and changes nothing. `count` is the number of images labeled.",
    request_body = Vec<OutlierAnnotation>,
    responses(
        (status = 200, description = "Outliers annotated", body = WorkflowResponse),
        (status = 400, description = "Mixed clusters, non-outlier image, duplicate ID, or invalid name (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Image not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(items = payload.len()))]
pub async fn annotate_outliers(
    State(state): State<AppState>,
    AppJson(payload): AppJson<Vec<OutlierAnnotation>>,
) -> Result<Json<WorkflowResponse>, AppError> {
    let count = WorkflowService::new(&state.db)
        .annotate_outliers(&payload)
        .await?;
    Ok(Json(WorkflowResponse {
        status: "outliers_annotated",
        count,
    }))
}
