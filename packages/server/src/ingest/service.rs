use chrono::Utc;
use common::storage::UploadStore;
use common::{ClusterStatus, EpisodeStatus, ImageStatus};
use sea_orm::prelude::Expr;
use sea_orm::sea_query::{Func, LockType, Query as SeaQuery};
use sea_orm::*;
use tracing::{info, warn};
use uuid::Uuid;

use super::archive::{self, ArchiveError, ArchiveLimits, ClusterFolder};
use crate::config::StorageConfig;
use crate::entity::{cluster, episode, image, split_annotation};
use crate::error::AppError;
use crate::export::paths::UPLOAD_ROOT;
use crate::utils::filename::episode_name_from_upload;

/// Image rows per INSERT; keeps bind parameters well under the Postgres limit.
const IMAGE_INSERT_CHUNK: usize = 1000;

const STAGING_DIR: &str = ".staging";

impl From<ArchiveError> for AppError {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::EntryTooLarge { .. } | ArchiveError::TotalTooLarge { .. } => {
                AppError::PayloadTooLarge(err.to_string())
            }
            other => AppError::Validation(other.to_string()),
        }
    }
}

/// Turns uploaded archives into episode, cluster, and image rows plus files.
pub struct IngestService<'a> {
    db: &'a DatabaseConnection,
    store: &'a dyn UploadStore,
    config: &'a StorageConfig,
}

impl<'a> IngestService<'a> {
    pub fn new(
        db: &'a DatabaseConnection,
        store: &'a dyn UploadStore,
        config: &'a StorageConfig,
    ) -> Self {
        Self { db, store, config }
    }

    /// Create a new episode from an archive. All rows or none are persisted.
    ///
    /// Files are written to a staging directory and only take the episode's
    /// name after commit, so a losing concurrent upload never touches them.
    pub async fn upload(&self, file_name: &str, data: Vec<u8>) -> Result<episode::Model, AppError> {
        let name = validate_upload(file_name, &data)?;
        self.ensure_name_available(&name, None).await?;

        let clusters = self.read_archive(data).await?;
        let staging = staging_key();
        self.write_files(&staging, &clusters).await?;

        let result = async {
            let txn = self.db.begin().await?;
            let model = insert_episode(&txn, &name, &clusters).await?;
            txn.commit().await?;
            Ok::<_, DbErr>(model)
        }
        .await;

        let model = match result {
            Ok(model) => model,
            Err(e) => {
                self.discard_tree(&staging).await;
                return Err(write_error(e, &name));
            }
        };
        self.move_into_place(&staging, &name, model.id).await?;

        info!(
            episode_id = %model.id,
            name = %model.name,
            clusters = model.total_clusters,
            "Episode uploaded"
        );
        Ok(model)
    }

    /// Swap an existing episode for a new archive.
    ///
    /// The old rows and the new rows change in one transaction. As with
    /// [`Self::upload`], files are staged and moved in after commit.
    pub async fn replace(
        &self,
        episode_id: Uuid,
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<episode::Model, AppError> {
        let name = validate_upload(file_name, &data)?;
        let old = find_episode(self.db, episode_id).await?;
        self.ensure_name_available(&name, Some(episode_id)).await?;

        let clusters = self.read_archive(data).await?;
        let staging = staging_key();
        self.write_files(&staging, &clusters).await?;

        let result = async {
            let txn = self.db.begin().await?;
            lock_episode_tree(&txn, episode_id)
                .await?
                .ok_or_else(|| DbErr::RecordNotFound("Episode not found".into()))?;
            delete_episode_rows(&txn, episode_id).await?;
            let model = insert_episode(&txn, &name, &clusters).await?;
            txn.commit().await?;
            Ok::<_, DbErr>(model)
        }
        .await;

        let model = match result {
            Ok(model) => model,
            Err(e) => {
                self.discard_tree(&staging).await;
                return Err(write_error(e, &name));
            }
        };

        self.discard_tree(&old.name).await;
        self.move_into_place(&staging, &name, model.id).await?;

        info!(
            old_episode_id = %episode_id,
            episode_id = %model.id,
            name = %model.name,
            "Episode replaced"
        );
        Ok(model)
    }

    /// Delete an episode's rows, then its files.
    ///
    /// A failed file cleanup leaves orphaned files but does not fail the delete.
    pub async fn delete(&self, episode_id: Uuid) -> Result<(), AppError> {
        let txn = self.db.begin().await?;
        let episode = lock_episode_tree(&txn, episode_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Episode not found".into()))?;
        delete_episode_rows(&txn, episode_id).await?;
        txn.commit().await?;

        self.discard_tree(&episode.name).await;
        info!(episode_id = %episode_id, name = %episode.name, "Episode deleted");
        Ok(())
    }

    /// Conflict when another episode has the same name, ignoring case.
    async fn ensure_name_available(&self, name: &str, exclude: Option<Uuid>) -> Result<(), AppError> {
        let mut query = episode::Entity::find().filter(
            Expr::expr(Func::lower(Expr::col(episode::Column::Name))).eq(name.to_lowercase()),
        );
        if let Some(id) = exclude {
            query = query.filter(episode::Column::Id.ne(id));
        }
        let Some(existing) = query.one(self.db).await? else {
            return Ok(());
        };

        let annotated_images = image::Entity::find()
            .filter(image::Column::EpisodeId.eq(existing.id))
            .filter(image::Column::AnnotationStatus.ne(ImageStatus::Pending))
            .count(self.db)
            .await?;

        tracing::debug!(name, existing_id = %existing.id, "Duplicate episode upload rejected");
        Err(AppError::EpisodeExists {
            name: existing.name,
            episode_id: existing.id,
            has_annotations: existing.annotated_clusters > 0 || annotated_images > 0,
        })
    }

    async fn read_archive(&self, data: Vec<u8>) -> Result<Vec<ClusterFolder>, AppError> {
        let limits = ArchiveLimits {
            max_entry_size: self.config.max_entry_size,
            max_total_size: self.config.max_total_size,
        };
        let clusters = tokio::task::spawn_blocking(move || archive::read_clusters(&data, limits))
            .await
            .map_err(|e| AppError::Internal(format!("Archive task failed: {e}")))??;
        if i32::try_from(clusters.len()).is_err() {
            return Err(AppError::Validation("Too many cluster folders".into()));
        }
        Ok(clusters)
    }

    /// Write every image under `root/<cluster>/<file>`. Removes `root` on failure.
    async fn write_files(&self, root: &str, clusters: &[ClusterFolder]) -> Result<(), AppError> {
        for cluster in clusters {
            for img in &cluster.images {
                let key = format!("{root}/{}/{}", cluster.name, img.file_name);
                if let Err(e) = self.store.put(&key, &img.data).await {
                    self.discard_tree(root).await;
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }

    /// Move a staged tree to `name` once its episode row is committed.
    ///
    /// The committed row owns the name, so a directory already at `name` is
    /// left over from an earlier failed cleanup and is removed first.
    async fn move_into_place(
        &self,
        staging: &str,
        name: &str,
        episode_id: Uuid,
    ) -> Result<(), AppError> {
        match self.store.exists(name).await {
            Ok(true) => {
                warn!(path = name, "Removing orphaned upload directory");
                self.discard_tree(name).await;
            }
            Ok(false) => {}
            Err(e) => warn!(path = name, error = %e, "Could not check upload directory"),
        }

        if let Err(e) = self.store.rename_tree(staging, name).await {
            self.discard_tree(staging).await;
            return Err(AppError::Internal(format!(
                "Episode {episode_id} committed but files could not be moved into place: {e}"
            )));
        }
        Ok(())
    }

    async fn discard_tree(&self, root: &str) {
        if let Err(e) = self.store.remove_tree(root).await {
            warn!(path = root, error = %e, "Failed to remove upload directory");
        }
    }
}

/// Name checks and content inspection, before anything is extracted.
fn validate_upload(file_name: &str, data: &[u8]) -> Result<String, AppError> {
    let name = episode_name_from_upload(file_name)
        .map_err(|e| AppError::Validation(e.message().into()))?;
    archive::inspect(data)?;
    Ok(name)
}

/// Stored (and served) path of an ingested image.
pub fn image_file_path(episode_name: &str, cluster_name: &str, file_name: &str) -> String {
    format!("{UPLOAD_ROOT}/{episode_name}/{cluster_name}/{file_name}")
}

async fn insert_episode(
    txn: &DatabaseTransaction,
    name: &str,
    clusters: &[ClusterFolder],
) -> Result<episode::Model, DbErr> {
    let now = Utc::now();
    let (season, episode_number) = archive::episode_metadata(clusters);

    let episode = episode::ActiveModel {
        id: Set(Uuid::now_v7()),
        name: Set(name.to_string()),
        upload_timestamp: Set(now),
        status: Set(EpisodeStatus::Pending),
        total_clusters: Set(clusters.len() as i32),
        annotated_clusters: Set(0),
        season: Set(season),
        episode_number: Set(episode_number),
    }
    .insert(txn)
    .await?;

    let mut cluster_rows = Vec::with_capacity(clusters.len());
    let mut image_rows = Vec::new();
    for folder in clusters {
        let cluster_id = Uuid::now_v7();
        let initial_label = Some(folder.info.label.clone()).filter(|l| !l.is_empty());
        cluster_rows.push(cluster::ActiveModel {
            id: Set(cluster_id),
            episode_id: Set(episode.id),
            cluster_name: Set(folder.name.clone()),
            cluster_number: Set(folder.info.cluster_number),
            initial_label: Set(initial_label.clone()),
            person_name: Set(None),
            is_single_person: Set(None),
            annotation_status: Set(ClusterStatus::Pending),
            outlier_count: Set(0),
            has_outliers: Set(false),
            created_at: Set(now),
        });
        for img in &folder.images {
            image_rows.push(image::ActiveModel {
                id: Set(Uuid::now_v7()),
                cluster_id: Set(cluster_id),
                episode_id: Set(episode.id),
                file_path: Set(image_file_path(name, &folder.name, &img.file_name)),
                file_name: Set(img.file_name.clone()),
                initial_label: Set(initial_label.clone()),
                current_label: Set(None),
                annotation_status: Set(ImageStatus::Pending),
                annotated_at: Set(None),
                is_custom_label: Set(false),
                quality_attributes: Set(Vec::new()),
            });
        }
    }

    cluster::Entity::insert_many(cluster_rows)
        .exec_without_returning(txn)
        .await?;

    let mut rows = image_rows.into_iter().peekable();
    while rows.peek().is_some() {
        let chunk: Vec<image::ActiveModel> = rows.by_ref().take(IMAGE_INSERT_CHUNK).collect();
        image::Entity::insert_many(chunk)
            .exec_without_returning(txn)
            .await?;
    }

    Ok(episode)
}

pub(crate) async fn find_episode<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
) -> Result<episode::Model, AppError> {
    episode::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Episode not found".into()))
}

pub(crate) async fn lock_episode(
    txn: &DatabaseTransaction,
    id: Uuid,
) -> Result<episode::Model, AppError> {
    episode::Entity::find_by_id(id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Episode not found".into()))
}

/// Lock the episode's clusters in id order, then the episode row.
///
/// Workflow mutations lock one cluster and then the episode, so taking the
/// cluster locks first keeps both paths in the same order.
async fn lock_episode_tree(
    txn: &DatabaseTransaction,
    episode_id: Uuid,
) -> Result<Option<episode::Model>, DbErr> {
    cluster::Entity::find()
        .filter(cluster::Column::EpisodeId.eq(episode_id))
        .order_by_asc(cluster::Column::Id)
        .select_only()
        .column(cluster::Column::Id)
        .lock(LockType::Update)
        .into_tuple::<Uuid>()
        .all(txn)
        .await?;
    episode::Entity::find_by_id(episode_id)
        .lock(LockType::Update)
        .one(txn)
        .await
}

fn staging_key() -> String {
    format!("{STAGING_DIR}/{}", Uuid::new_v4())
}

/// Images go through their clusters, so each row has exactly one deletion path.
async fn delete_episode_rows(txn: &DatabaseTransaction, episode_id: Uuid) -> Result<(), DbErr> {
    let cluster_ids = SeaQuery::select()
        .column(cluster::Column::Id)
        .from(cluster::Entity)
        .and_where(cluster::Column::EpisodeId.eq(episode_id))
        .to_owned();

    image::Entity::delete_many()
        .filter(image::Column::ClusterId.in_subquery(cluster_ids.clone()))
        .exec(txn)
        .await?;
    split_annotation::Entity::delete_many()
        .filter(split_annotation::Column::ClusterId.in_subquery(cluster_ids))
        .exec(txn)
        .await?;
    cluster::Entity::delete_many()
        .filter(cluster::Column::EpisodeId.eq(episode_id))
        .exec(txn)
        .await?;
    episode::Entity::delete_by_id(episode_id).exec(txn).await?;
    Ok(())
}

/// A concurrent upload of the same name trips the unique index instead of the pre-check.
fn write_error(err: DbErr, name: &str) -> AppError {
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        return AppError::Conflict(format!("Episode '{name}' already exists"));
    }
    match err {
        DbErr::RecordNotFound(msg) => AppError::NotFound(msg),
        other => other.into(),
    }
}
