use std::collections::{BTreeMap, HashSet};

use chrono::Utc;
use common::{ClusterStatus, EpisodeStatus, ImageStatus};
use sea_orm::prelude::Expr;
use sea_orm::sea_query::LockType;
use sea_orm::*;
use tracing::{debug, info};
use uuid::Uuid;

use super::scene::scene_track_key;
use crate::entity::{cluster, image, split_annotation};
use crate::error::AppError;
use crate::ingest::service::lock_episode;
use crate::models::cluster::{
    AnnotateClusterRequest, ClusterImagesResponse, PaginatedImagesResponse, SplitAnnotationInput,
};
use crate::models::image::{ImageResponse, OutlierAnnotation};
use crate::models::shared::{validate_person_name, validate_unique_ids};

/// Review and labeling operations on clusters and their images.
///
/// Every mutation runs in its own transaction and takes the cluster row lock
/// before touching images, so concurrent calls on one cluster serialize.
pub struct WorkflowService<'a, C: ConnectionTrait + TransactionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait + TransactionTrait<Transaction = DatabaseTransaction>> WorkflowService<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// One page of the images still under review (pending or outlier), in id order.
    pub async fn review_page(
        &self,
        cluster_id: Uuid,
        page: u64,
        page_size: u64,
    ) -> Result<PaginatedImagesResponse, AppError> {
        let offset = page_offset(page, page_size)
            .ok_or_else(|| AppError::Validation(format!("page {page} is out of range")))?;
        let cluster = find_cluster(self.conn, cluster_id).await?;

        let select = image::Entity::find()
            .filter(image::Column::ClusterId.eq(cluster_id))
            .filter(image::Column::AnnotationStatus.is_in(ImageStatus::REVIEWABLE.to_vec()));

        let total_count = select.clone().count(self.conn).await?;
        let images = select
            .order_by_asc(image::Column::Id)
            .offset(Some(offset))
            .limit(Some(page_size))
            .all(self.conn)
            .await?;

        Ok(PaginatedImagesResponse {
            cluster_id,
            cluster_name: cluster.cluster_name,
            initial_label: cluster.initial_label,
            images: images.into_iter().map(Into::into).collect(),
            total_count,
            page,
            page_size,
            has_next: offset + page_size < total_count,
            has_prev: page > 1,
        })
    }

    /// Replace the cluster's outlier selection with `selected`.
    ///
    /// Only pending images of this cluster are flagged; ids of other clusters'
    /// images are ignored. Returns the recounted outlier total.
    pub async fn mark_outliers(
        &self,
        cluster_id: Uuid,
        body_cluster_id: Option<Uuid>,
        selected: &[Uuid],
    ) -> Result<u64, AppError> {
        if let Some(body_id) = body_cluster_id
            && body_id != cluster_id
        {
            return Err(AppError::Validation(
                "cluster_id in body does not match the path".into(),
            ));
        }

        let txn = self.conn.begin().await?;
        let cluster = lock_cluster(&txn, cluster_id).await?;

        if !selected.is_empty() {
            image::Entity::update_many()
                .col_expr(
                    image::Column::AnnotationStatus,
                    Expr::value(ImageStatus::Outlier),
                )
                .filter(image::Column::ClusterId.eq(cluster_id))
                .filter(image::Column::AnnotationStatus.eq(ImageStatus::Pending))
                .filter(image::Column::Id.is_in(selected.to_vec()))
                .exec(&txn)
                .await?;
        }

        let mut deselect = image::Entity::update_many()
            .col_expr(
                image::Column::AnnotationStatus,
                Expr::value(ImageStatus::Pending),
            )
            .filter(image::Column::ClusterId.eq(cluster_id))
            .filter(image::Column::AnnotationStatus.eq(ImageStatus::Outlier));
        if !selected.is_empty() {
            deselect = deselect.filter(image::Column::Id.is_not_in(selected.to_vec()));
        }
        let reset = deselect.exec(&txn).await?.rows_affected;

        let outliers = count_outliers(&txn, cluster_id).await?;
        let mut active = cluster.clone().into_active_model();
        set_outlier_totals(&mut active, outliers);
        if cluster.annotation_status == ClusterStatus::Pending {
            active.annotation_status = Set(ClusterStatus::InProgress);
        }
        active.update(&txn).await?;
        txn.commit().await?;

        debug!(%cluster_id, outliers, reset, "Outlier selection updated");
        Ok(outliers)
    }

    /// Label every pending image of the cluster and complete it.
    ///
    /// Outliers and already annotated images are left alone. The episode counter
    /// moves only on the call that completes the cluster.
    pub async fn batch_annotate(
        &self,
        cluster_id: Uuid,
        person_name: &str,
        is_custom_label: bool,
    ) -> Result<u64, AppError> {
        let person_name = validate_person_name(person_name)?;

        let txn = self.conn.begin().await?;
        let cluster = lock_cluster(&txn, cluster_id).await?;
        let was_completed = cluster.annotation_status == ClusterStatus::Completed;

        let updated = image::Entity::update_many()
            .col_expr(
                image::Column::CurrentLabel,
                Expr::value(Some(person_name.clone())),
            )
            .col_expr(
                image::Column::AnnotationStatus,
                Expr::value(ImageStatus::Annotated),
            )
            .col_expr(image::Column::AnnotatedAt, Expr::value(Some(Utc::now())))
            .col_expr(image::Column::IsCustomLabel, Expr::value(is_custom_label))
            .filter(image::Column::ClusterId.eq(cluster_id))
            .filter(image::Column::AnnotationStatus.eq(ImageStatus::Pending))
            .exec(&txn)
            .await?
            .rows_affected;

        let outliers = count_outliers(&txn, cluster_id).await?;
        let episode_id = cluster.episode_id;
        let mut active = cluster.into_active_model();
        active.person_name = Set(Some(person_name.clone()));
        active.is_single_person = Set(Some(true));
        active.annotation_status = Set(ClusterStatus::Completed);
        set_outlier_totals(&mut active, outliers);
        active.update(&txn).await?;

        if !was_completed {
            record_completion(&txn, episode_id).await?;
        }
        txn.commit().await?;

        info!(%cluster_id, %person_name, updated, was_completed, "Cluster batch annotated");
        Ok(updated)
    }

    /// Give individual labels to outlier images of a single cluster.
    ///
    /// All images must be outliers of one cluster. One bad image rejects the
    /// whole batch before anything is written.
    pub async fn annotate_outliers(&self, items: &[OutlierAnnotation]) -> Result<u64, AppError> {
        if items.is_empty() {
            return Ok(0);
        }
        validate_unique_ids(items.iter().map(|i| i.image_id), "image")?;

        let mut groups: BTreeMap<(String, bool, Vec<String>), Vec<Uuid>> = BTreeMap::new();
        for item in items {
            let name = validate_person_name(&item.person_name)?;
            let quality = normalize_quality(&item.quality_attributes);
            groups
                .entry((name, item.is_custom_label, quality))
                .or_default()
                .push(item.image_id);
        }
        let ids: Vec<Uuid> = items.iter().map(|i| i.image_id).collect();

        let txn = self.conn.begin().await?;

        let owners: Vec<(Uuid, Uuid)> = image::Entity::find()
            .filter(image::Column::Id.is_in(ids.clone()))
            .select_only()
            .columns([image::Column::Id, image::Column::ClusterId])
            .into_tuple()
            .all(&txn)
            .await?;
        if owners.len() != ids.len() {
            let found: HashSet<Uuid> = owners.iter().map(|(id, _)| *id).collect();
            let missing = ids.iter().find(|id| !found.contains(id)).copied();
            return Err(AppError::NotFound(match missing {
                Some(id) => format!("Image {id} not found"),
                None => "Image not found".into(),
            }));
        }
        let cluster_id = owners[0].1;
        if owners.iter().any(|(_, c)| *c != cluster_id) {
            return Err(AppError::Validation(
                "All images must belong to the same cluster".into(),
            ));
        }

        let cluster = lock_cluster(&txn, cluster_id).await?;

        let not_outlier: Option<Uuid> = image::Entity::find()
            .filter(image::Column::Id.is_in(ids.clone()))
            .filter(image::Column::AnnotationStatus.ne(ImageStatus::Outlier))
            .select_only()
            .column(image::Column::Id)
            .into_tuple()
            .one(&txn)
            .await?;
        if let Some(id) = not_outlier {
            return Err(AppError::Validation(format!(
                "Image {id} is not marked as an outlier"
            )));
        }

        let now = Utc::now();
        let mut updated = 0;
        for ((name, is_custom_label, quality), group_ids) in groups {
            updated += image::Entity::update_many()
                .col_expr(image::Column::CurrentLabel, Expr::value(Some(name)))
                .col_expr(
                    image::Column::AnnotationStatus,
                    Expr::value(ImageStatus::Annotated),
                )
                .col_expr(image::Column::AnnotatedAt, Expr::value(Some(now)))
                .col_expr(image::Column::IsCustomLabel, Expr::value(is_custom_label))
                .col_expr(image::Column::QualityAttributes, Expr::value(quality))
                .filter(image::Column::Id.is_in(group_ids))
                .filter(image::Column::AnnotationStatus.eq(ImageStatus::Outlier))
                .exec(&txn)
                .await?
                .rows_affected;
        }

        let outliers = count_outliers(&txn, cluster_id).await?;
        let status = cluster.annotation_status;
        let mut active = cluster.into_active_model();
        set_outlier_totals(&mut active, outliers);
        if status == ClusterStatus::Pending {
            active.annotation_status = Set(ClusterStatus::InProgress);
        }
        active.update(&txn).await?;
        txn.commit().await?;

        info!(%cluster_id, updated, "Outliers annotated");
        Ok(updated)
    }

    /// Images currently flagged as outliers, for resuming a review.
    pub async fn outliers(&self, cluster_id: Uuid) -> Result<Vec<image::Model>, AppError> {
        find_cluster(self.conn, cluster_id).await?;
        Ok(image::Entity::find()
            .filter(image::Column::ClusterId.eq(cluster_id))
            .filter(image::Column::AnnotationStatus.eq(ImageStatus::Outlier))
            .order_by_asc(image::Column::Id)
            .all(self.conn)
            .await?)
    }

    /// Single-call annotation: a single-person cluster is batch annotated, a
    /// multi-person cluster is left in progress for split annotations.
    pub async fn annotate_cluster(
        &self,
        cluster_id: Uuid,
        req: &AnnotateClusterRequest,
    ) -> Result<u64, AppError> {
        if req.is_single_person {
            let name = req.person_name.as_deref().ok_or_else(|| {
                AppError::Validation("person_name is required for a single-person cluster".into())
            })?;
            return self
                .batch_annotate(cluster_id, name, req.is_custom_label)
                .await;
        }

        let txn = self.conn.begin().await?;
        let cluster = lock_cluster(&txn, cluster_id).await?;
        let status = cluster.annotation_status;
        let mut active = cluster.into_active_model();
        active.is_single_person = Set(Some(false));
        if status == ClusterStatus::Pending {
            active.annotation_status = Set(ClusterStatus::InProgress);
        }
        active.update(&txn).await?;
        txn.commit().await?;

        debug!(%cluster_id, "Cluster marked as multi-person");
        Ok(0)
    }

    /// Record the scene/track split of a multi-person cluster and complete it.
    pub async fn split_cluster(
        &self,
        cluster_id: Uuid,
        inputs: &[SplitAnnotationInput],
    ) -> Result<Vec<split_annotation::Model>, AppError> {
        if inputs.is_empty() {
            return Err(AppError::Validation(
                "At least one split annotation is required".into(),
            ));
        }
        let mut splits = Vec::with_capacity(inputs.len());
        for input in inputs {
            let pattern = input.scene_track_pattern.trim();
            if pattern.is_empty() {
                return Err(AppError::Validation(
                    "scene_track_pattern cannot be empty".into(),
                ));
            }
            if input.image_paths.is_empty() {
                return Err(AppError::Validation(format!(
                    "Split '{pattern}' has no images"
                )));
            }
            let name = validate_person_name(&input.person_name)?;
            splits.push((pattern.to_string(), name, &input.image_paths));
        }

        let txn = self.conn.begin().await?;
        let cluster = lock_cluster(&txn, cluster_id).await?;
        let was_completed = cluster.annotation_status == ClusterStatus::Completed;

        let known: HashSet<String> = image::Entity::find()
            .filter(image::Column::ClusterId.eq(cluster_id))
            .select_only()
            .column(image::Column::FilePath)
            .into_tuple::<String>()
            .all(&txn)
            .await?
            .into_iter()
            .collect();
        if let Some(path) = splits
            .iter()
            .flat_map(|(_, _, paths)| paths.iter())
            .find(|p| !known.contains(p.as_str()))
        {
            return Err(AppError::Validation(format!(
                "Image '{path}' does not belong to this cluster"
            )));
        }

        let now = Utc::now();
        let mut created = Vec::with_capacity(splits.len());
        for (pattern, name, paths) in splits {
            let model = split_annotation::ActiveModel {
                id: Set(Uuid::now_v7()),
                cluster_id: Set(cluster_id),
                scene_track_pattern: Set(pattern),
                person_name: Set(name),
                image_paths: Set(paths.clone()),
                created_at: Set(now),
            }
            .insert(&txn)
            .await?;
            created.push(model);
        }

        let outliers = count_outliers(&txn, cluster_id).await?;
        let episode_id = cluster.episode_id;
        let mut active = cluster.into_active_model();
        active.is_single_person = Set(Some(false));
        active.annotation_status = Set(ClusterStatus::Completed);
        set_outlier_totals(&mut active, outliers);
        active.update(&txn).await?;

        if !was_completed {
            record_completion(&txn, episode_id).await?;
        }
        txn.commit().await?;

        info!(%cluster_id, splits = created.len(), "Cluster split annotated");
        Ok(created)
    }

    /// Every image of the cluster, plus the same images grouped by scene/track.
    pub async fn cluster_images(&self, cluster_id: Uuid) -> Result<ClusterImagesResponse, AppError> {
        find_cluster(self.conn, cluster_id).await?;
        let images: Vec<ImageResponse> = image::Entity::find()
            .filter(image::Column::ClusterId.eq(cluster_id))
            .order_by_asc(image::Column::Id)
            .all(self.conn)
            .await?
            .into_iter()
            .map(Into::into)
            .collect();

        let mut scene_tracks: BTreeMap<String, Vec<ImageResponse>> = BTreeMap::new();
        for img in &images {
            if let Some(key) = scene_track_key(&img.file_name) {
                scene_tracks.entry(key).or_default().push(img.clone());
            }
        }

        Ok(ClusterImagesResponse {
            cluster_id,
            images,
            scene_tracks,
        })
    }
}

/// Rows skipped before `page`. `None` when it does not fit a Postgres `OFFSET`.
fn page_offset(page: u64, page_size: u64) -> Option<u64> {
    page.checked_sub(1)?
        .checked_mul(page_size)
        .filter(|offset| {
            offset
                .checked_add(page_size)
                .is_some_and(|end| i64::try_from(end).is_ok())
        })
}

pub(crate) async fn find_cluster<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
) -> Result<cluster::Model, AppError> {
    cluster::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Cluster not found".into()))
}

async fn lock_cluster(txn: &DatabaseTransaction, id: Uuid) -> Result<cluster::Model, AppError> {
    cluster::Entity::find_by_id(id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Cluster not found".into()))
}

async fn count_outliers(txn: &DatabaseTransaction, cluster_id: Uuid) -> Result<u64, DbErr> {
    image::Entity::find()
        .filter(image::Column::ClusterId.eq(cluster_id))
        .filter(image::Column::AnnotationStatus.eq(ImageStatus::Outlier))
        .count(txn)
        .await
}

fn set_outlier_totals(active: &mut cluster::ActiveModel, outliers: u64) {
    active.outlier_count = Set(i32::try_from(outliers).unwrap_or(i32::MAX));
    active.has_outliers = Set(outliers > 0);
}

/// Count one more completed cluster on the episode, under the episode row lock.
async fn record_completion(txn: &DatabaseTransaction, episode_id: Uuid) -> Result<(), AppError> {
    let episode = lock_episode(txn, episode_id).await?;
    let total = episode.total_clusters;
    let annotated = Ord::min(episode.annotated_clusters + 1, total);
    let status = EpisodeStatus::from_progress(annotated, total);

    let mut active = episode.into_active_model();
    active.annotated_clusters = Set(annotated);
    active.status = Set(status);
    active.update(txn).await?;

    debug!(%episode_id, annotated, total, "Episode progress updated");
    Ok(())
}

/// Trimmed, de-duplicated, sorted quality tags.
fn normalize_quality(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = tags
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}
