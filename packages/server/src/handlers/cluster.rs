use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::instrument;
use uuid::Uuid;

use crate::error::{AppError, ErrorBody};
use crate::extractors::json::{AppJson, AppQuery};
use crate::extractors::path_id::PathId;
use crate::models::cluster::*;
use crate::models::image::ImageResponse;
use crate::models::shared::PageQuery;
use crate::state::AppState;
use crate::workflow::WorkflowService;
use crate::workflow::service::find_cluster;

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Clusters",
    operation_id = "getCluster",
    summary = "Get a cluster by ID",
    params(("id" = Uuid, Path, description = "Cluster ID")),
    responses(
        (status = 200, description = "Cluster details", body = ClusterResponse),
        (status = 404, description = "Cluster not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(id = %id))]
pub async fn get_cluster(
    State(state): State<AppState>,
    PathId(id): PathId,
) -> Result<Json<ClusterResponse>, AppError> {
    let model = find_cluster(&state.db, id).await?;
    Ok(Json(model.into()))
}

#[utoipa::path(
    get,
    path = "/{id}/images",
    tag = "Clusters",
    operation_id = "listClusterImages",
    summary = "All images of a cluster, grouped by scene and track",
    description = "Returns every image of the cluster regardless of status. `scene_tracks` groups the images whose file name contains `scene_<n>_track_<m>`, for building split annotations.",
    params(("id" = Uuid, Path, description = "Cluster ID")),
    responses(
        (status = 200, description = "Cluster images", body = ClusterImagesResponse),
        (status = 404, description = "Cluster not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(id = %id))]
pub async fn list_images(
    State(state): State<AppState>,
    PathId(id): PathId,
) -> Result<Json<ClusterImagesResponse>, AppError> {
    let images = WorkflowService::new(&state.db).cluster_images(id).await?;
    Ok(Json(images))
}

#[utoipa::path(
    get,
    path = "/{id}/images/paginated",
    tag = "Clusters",
    operation_id = "listReviewImages",
    summary = "Page through the images under review",
    description = "Pending and outlier images of the cluster in a stable order. Outliers stay listed so they can be deselected. `page_size` is clamped to 1-100.",
    params(("id" = Uuid, Path, description = "Cluster ID"), PageQuery),
    responses(
        (status = 200, description = "One page of images", body = PaginatedImagesResponse),
        (status = 400, description = "Invalid query (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Cluster not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, query), fields(id = %id))]
pub async fn list_review_images(
    State(state): State<AppState>,
    PathId(id): PathId,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<PaginatedImagesResponse>, AppError> {
    let (page, page_size) = query.resolve();
    let page = WorkflowService::new(&state.db)
        .review_page(id, page, page_size)
        .await?;
    Ok(Json(page))
}

#[utoipa::path(
    get,
    path = "/{id}/outliers",
    tag = "Clusters",
    operation_id = "listOutliers",
    summary = "Images currently marked as outliers",
    params(("id" = Uuid, Path, description = "Cluster ID")),
    responses(
        (status = 200, description = "Outlier images", body = Vec<ImageResponse>),
        (status = 404, description = "Cluster not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(id = %id))]
pub async fn list_outliers(
    State(state): State<AppState>,
    PathId(id): PathId,
) -> Result<Json<Vec<ImageResponse>>, AppError> {
    let images = WorkflowService::new(&state.db).outliers(id).await?;
    Ok(Json(images.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/{id}/outliers",
    tag = "Clusters",
    operation_id = "markOutliers",
    summary = "Set the outlier selection of a cluster",
    description = "Marks the listed pending images as outliers and returns every other outlier of the cluster to pending. An empty list clears the selection. Images of other clusters are ignored. `count` is the resulting number of outliers.",
    params(("id" = Uuid, Path, description = "Cluster ID")),
    request_body = MarkOutliersRequest,
    responses(
        (status = 200, description = "Selection saved", body = WorkflowResponse),
        (status = 400, description = "Body cluster_id differs from the path (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Cluster not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(id = %id, selected = payload.outlier_image_ids.len()))]
pub async fn mark_outliers(
    State(state): State<AppState>,
    PathId(id): PathId,
    AppJson(payload): AppJson<MarkOutliersRequest>,
) -> Result<Json<WorkflowResponse>, AppError> {
    let count = WorkflowService::new(&state.db)
        .mark_outliers(id, payload.cluster_id, &payload.outlier_image_ids)
        .await?;
    Ok(Json(WorkflowResponse {
        status: "outliers_marked",
        count,
    }))
}

#[utoipa::path(
    post,
    path = "/{id}/annotate-batch",
    tag = "Clusters",
    operation_id = "batchAnnotateCluster",
    summary = "Label every pending image and complete the cluster",
    description = "Gives all pending images of the cluster the same person name and marks the cluster completed. Outliers and already annotated images are not touched. Repeating the call relabels nothing new and does not count the cluster twice. `count` is the number of images labeled.",
    params(("id" = Uuid, Path, description = "Cluster ID")),
    request_body = BatchAnnotateRequest,
    responses(
        (status = 200, description = "Cluster annotated", body = WorkflowResponse),
        (status = 400, description = "Invalid person name (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Cluster not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(id = %id))]
pub async fn batch_annotate(
    State(state): State<AppState>,
    PathId(id): PathId,
    AppJson(payload): AppJson<BatchAnnotateRequest>,
) -> Result<Json<WorkflowResponse>, AppError> {
    let count = WorkflowService::new(&state.db)
        .batch_annotate(id, &payload.person_name, payload.is_custom_label)
        .await?;
    Ok(Json(WorkflowResponse {
        status: "cluster_annotated",
        count,
    }))
}

#[utoipa::path(
    post,
    path = "/{id}/annotate",
    tag = "Clusters",
    operation_id = "annotateCluster",
    summary = "Annotate a cluster in one call",
    description = "With `is_single_person` true this is a batch annotation with `person_name`. Otherwise the cluster is flagged as multi-person and stays in progress until split annotations are saved.",
    params(("id" = Uuid, Path, description = "Cluster ID")),
    request_body = AnnotateClusterRequest,
    responses(
        (status = 200, description = "Cluster updated", body = WorkflowResponse),
        (status = 400, description = "Missing or invalid person name (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Cluster not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(id = %id, single = payload.is_single_person))]
pub async fn annotate_cluster(
    State(state): State<AppState>,
    PathId(id): PathId,
    AppJson(payload): AppJson<AnnotateClusterRequest>,
) -> Result<Json<WorkflowResponse>, AppError> {
    let count = WorkflowService::new(&state.db)
        .annotate_cluster(id, &payload)
        .await?;
    let status = if payload.is_single_person {
        "cluster_annotated"
    } else {
        "awaiting_split"
    };
    Ok(Json(WorkflowResponse { status, count }))
}

#[utoipa::path(
    post,
    path = "/{id}/split",
    tag = "Clusters",
    operation_id = "splitCluster",
    summary = "Save split annotations for a multi-person cluster",
    description = "Each entry labels the images of one scene/track with its own person name. Every path must be an image of this cluster. Completes the cluster.",
    params(("id" = Uuid, Path, description = "Cluster ID")),
    request_body = Vec<SplitAnnotationInput>,
    responses(
        (status = 201, description = "Split annotations created", body = Vec<SplitAnnotationResponse>),
        (status = 400, description = "Empty list, invalid name, or foreign image path (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Cluster not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(id = %id, splits = payload.len()))]
pub async fn split_cluster(
    State(state): State<AppState>,
    PathId(id): PathId,
    AppJson(payload): AppJson<Vec<SplitAnnotationInput>>,
) -> Result<impl IntoResponse, AppError> {
    let created = WorkflowService::new(&state.db)
        .split_cluster(id, &payload)
        .await?;
    let body: Vec<SplitAnnotationResponse> = created.into_iter().map(Into::into).collect();
    Ok((StatusCode::CREATED, Json(body)))
}
