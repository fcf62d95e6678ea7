use std::collections::BTreeSet;

use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use sea_orm::*;
use tracing::instrument;
use uuid::Uuid;

use crate::entity::{cluster, episode, episode_speaker, image};
use crate::error::{AppError, ErrorBody};
use crate::export::ExportService;
use crate::extractors::path_id::PathId;
use crate::harmonize::{self, LabeledImage};
use crate::ingest::IngestService;
use crate::ingest::service::find_episode;
use crate::models::cluster::ClusterResponse;
use crate::models::episode::*;
use crate::models::export::ExportDocument;
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/upload",
    tag = "Episodes",
    operation_id = "uploadEpisode",
    summary = "Upload an episode archive",
    description = "Creates an episode from a ZIP archive sent as the multipart field `file`. Each top-level folder of the archive becomes a cluster and its image files become pending images. The episode name is the sanitized archive file name without `.zip`.",
    request_body(content_type = "multipart/form-data", description = "ZIP archive with one folder per cluster"),
    responses(
        (status = 201, description = "Episode created", body = EpisodeResponse),
        (status = 400, description = "Not a ZIP archive, or no cluster folders (VALIDATION_ERROR)", body = ErrorBody),
        (status = 409, description = "Episode name already taken (EPISODE_EXISTS)", body = ErrorBody),
        (status = 413, description = "Archive too large (PAYLOAD_TOO_LARGE)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, multipart))]
pub async fn upload_episode(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let (file_name, data) = read_archive_field(multipart).await?;
    let model = IngestService::new(&state.db, state.store.as_ref(), &state.config.storage)
        .upload(&file_name, data)
        .await?;
    Ok((StatusCode::CREATED, Json(EpisodeResponse::from(model))))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Episodes",
    operation_id = "listEpisodes",
    summary = "List episodes",
    description = "Returns every episode, most recently uploaded first.",
    responses(
        (status = 200, description = "Episodes", body = Vec<EpisodeResponse>),
    ),
)]
#[instrument(skip(state))]
pub async fn list_episodes(
    State(state): State<AppState>,
) -> Result<Json<Vec<EpisodeResponse>>, AppError> {
    let episodes = episode::Entity::find()
        .order_by_desc(episode::Column::UploadTimestamp)
        .order_by_desc(episode::Column::Id)
        .all(&state.db)
        .await?;
    Ok(Json(episodes.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Episodes",
    operation_id = "getEpisode",
    summary = "Get an episode by ID",
    params(("id" = Uuid, Path, description = "Episode ID")),
    responses(
        (status = 200, description = "Episode details", body = EpisodeResponse),
        (status = 404, description = "Episode not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(id = %id))]
pub async fn get_episode(
    State(state): State<AppState>,
    PathId(id): PathId,
) -> Result<Json<EpisodeResponse>, AppError> {
    let model = find_episode(&state.db, id).await?;
    Ok(Json(model.into()))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Episodes",
    operation_id = "deleteEpisode",
    summary = "Delete an episode",
    description = "Deletes the episode with its clusters, images, and split annotations, then removes its files. A failed file cleanup is logged and does not fail the request.",
    params(("id" = Uuid, Path, description = "Episode ID")),
    responses(
        (status = 204, description = "Episode deleted"),
        (status = 404, description = "Episode not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(id = %id))]
pub async fn delete_episode(
    State(state): State<AppState>,
    PathId(id): PathId,
) -> Result<StatusCode, AppError> {
    IngestService::new(&state.db, state.store.as_ref(), &state.config.storage)
        .delete(id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/{id}/replace",
    tag = "Episodes",
    operation_id = "replaceEpisode",
    summary = "Replace an episode with a new archive",
    description = "Discards every cluster, image, and annotation of the episode and ingests the uploaded archive in their place. The archive content is checked before anything is touched. The replacement gets a new episode ID.",
    params(("id" = Uuid, Path, description = "Episode ID")),
    request_body(content_type = "multipart/form-data", description = "ZIP archive with one folder per cluster"),
    responses(
        (status = 200, description = "Episode replaced", body = EpisodeResponse),
        (status = 400, description = "Not a valid ZIP archive (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Episode not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Name taken by another episode (EPISODE_EXISTS)", body = ErrorBody),
        (status = 413, description = "Archive too large (PAYLOAD_TOO_LARGE)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, multipart), fields(id = %id))]
pub async fn replace_episode(
    State(state): State<AppState>,
    PathId(id): PathId,
    multipart: Multipart,
) -> Result<Json<EpisodeResponse>, AppError> {
    let (file_name, data) = read_archive_field(multipart).await?;
    let model = IngestService::new(&state.db, state.store.as_ref(), &state.config.storage)
        .replace(id, &file_name, data)
        .await?;
    Ok(Json(model.into()))
}

#[utoipa::path(
    get,
    path = "/{id}/clusters",
    tag = "Episodes",
    operation_id = "listEpisodeClusters",
    summary = "List the clusters of an episode",
    description = "Clusters in archive folder order.",
    params(("id" = Uuid, Path, description = "Episode ID")),
    responses(
        (status = 200, description = "Clusters", body = Vec<ClusterResponse>),
        (status = 404, description = "Episode not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(id = %id))]
pub async fn list_clusters(
    State(state): State<AppState>,
    PathId(id): PathId,
) -> Result<Json<Vec<ClusterResponse>>, AppError> {
    find_episode(&state.db, id).await?;
    let clusters = cluster::Entity::find()
        .filter(cluster::Column::EpisodeId.eq(id))
        .order_by_asc(cluster::Column::Id)
        .all(&state.db)
        .await?;
    Ok(Json(clusters.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/{id}/export",
    tag = "Episodes",
    operation_id = "exportEpisode",
    summary = "Export the episode's annotations",
    description = "Builds the annotation document from the current image labels of every completed cluster. Each cluster's label is the majority label of its images; images with other labels are listed as outliers.",
    params(("id" = Uuid, Path, description = "Episode ID")),
    responses(
        (status = 200, description = "Export document", body = ExportDocument),
        (status = 404, description = "Episode not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(id = %id))]
pub async fn export_episode(
    State(state): State<AppState>,
    PathId(id): PathId,
) -> Result<Json<ExportDocument>, AppError> {
    let doc = ExportService::new(&state.db, &state.config.export)
        .export_episode(id)
        .await?;
    Ok(Json(doc))
}

#[utoipa::path(
    get,
    path = "/{id}/speakers",
    tag = "Episodes",
    operation_id = "listEpisodeSpeakers",
    summary = "Reference speakers of an episode",
    description = "Speaker names for the episode's season and episode number, most utterances first. Empty when the episode has no season/episode metadata.",
    params(("id" = Uuid, Path, description = "Episode ID")),
    responses(
        (status = 200, description = "Speakers", body = SpeakersResponse),
        (status = 404, description = "Episode not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(id = %id))]
pub async fn list_speakers(
    State(state): State<AppState>,
    PathId(id): PathId,
) -> Result<Json<SpeakersResponse>, AppError> {
    let episode = find_episode(&state.db, id).await?;

    let speakers = match (episode.season, episode.episode_number) {
        (Some(season), Some(number)) => {
            episode_speaker::Entity::find()
                .filter(episode_speaker::Column::Season.eq(season))
                .filter(episode_speaker::Column::EpisodeNumber.eq(number))
                .order_by_desc(episode_speaker::Column::Utterances)
                .order_by_asc(episode_speaker::Column::SpeakerName)
                .select_only()
                .column(episode_speaker::Column::SpeakerName)
                .into_tuple::<String>()
                .all(&state.db)
                .await?
        }
        _ => Vec::new(),
    };

    Ok(Json(SpeakersResponse {
        episode_id: episode.id,
        season: episode.season,
        episode_number: episode.episode_number,
        speakers,
    }))
}

#[utoipa::path(
    get,
    path = "/{id}/labels",
    tag = "Episodes",
    operation_id = "listEpisodeLabels",
    summary = "Distinct labels used in an episode",
    description = "Sorted, distinct initial and current labels of the episode's images.",
    params(("id" = Uuid, Path, description = "Episode ID")),
    responses(
        (status = 200, description = "Labels", body = LabelsResponse),
        (status = 404, description = "Episode not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(id = %id))]
pub async fn list_labels(
    State(state): State<AppState>,
    PathId(id): PathId,
) -> Result<Json<LabelsResponse>, AppError> {
    find_episode(&state.db, id).await?;

    let mut labels = BTreeSet::new();
    for column in [image::Column::InitialLabel, image::Column::CurrentLabel] {
        let found = image::Entity::find()
            .filter(image::Column::EpisodeId.eq(id))
            .filter(column.is_not_null())
            .select_only()
            .column(column)
            .distinct()
            .into_tuple::<String>()
            .all(&state.db)
            .await?;
        labels.extend(found.into_iter().filter(|l| !l.trim().is_empty()));
    }

    Ok(Json(LabelsResponse {
        episode_id: id,
        labels: labels.into_iter().collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/{id}/piles",
    tag = "Episodes",
    operation_id = "listEpisodePiles",
    summary = "Group labeled images by label",
    description = "Groups every image with a label, across all clusters of the episode, by lowercased label. Used to harmonize names before export.",
    params(("id" = Uuid, Path, description = "Episode ID")),
    responses(
        (status = 200, description = "Piles sorted by label", body = PilesResponse),
        (status = 404, description = "Episode not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(id = %id))]
pub async fn list_piles(
    State(state): State<AppState>,
    PathId(id): PathId,
) -> Result<Json<PilesResponse>, AppError> {
    find_episode(&state.db, id).await?;

    let images = image::Entity::find()
        .filter(image::Column::EpisodeId.eq(id))
        .filter(image::Column::CurrentLabel.is_not_null())
        .order_by_asc(image::Column::Id)
        .select_only()
        .columns([
            image::Column::Id,
            image::Column::ClusterId,
            image::Column::CurrentLabel,
        ])
        .into_model::<LabeledImage>()
        .all(&state.db)
        .await?;

    Ok(Json(PilesResponse {
        episode_id: id,
        piles: harmonize::piles(&images),
    }))
}

/// Body limit layer for archive upload routes.
pub fn upload_body_limit(max_upload_size: usize) -> DefaultBodyLimit {
    DefaultBodyLimit::max(max_upload_size)
}

/// File name and bytes of the multipart `file` field.
async fn read_archive_field(mut multipart: Multipart) -> Result<(String, Vec<u8>), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(multipart_error)?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(multipart_error)?;
        return Ok((file_name, data.to_vec()));
    }
    Err(AppError::Validation("Missing multipart field 'file'".into()))
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::Validation(format!("Multipart error: {}", err.body_text()))
    }
}
