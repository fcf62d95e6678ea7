use std::collections::HashMap;

use chrono::Utc;
use common::{ClusterStatus, ImageStatus};
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use uuid::Uuid;

use super::reconcile::{ClusterInput, Reconciler, ReviewedImage};
use crate::config::ExportConfig;
use crate::entity::{cluster, episode, image, split_annotation};
use crate::error::AppError;
use crate::models::export::{ExportDocument, ExportMetadata};

pub struct ExportService<'a, C: ConnectionTrait> {
    conn: &'a C,
    config: &'a ExportConfig,
}

impl<'a, C: ConnectionTrait> ExportService<'a, C> {
    pub fn new(conn: &'a C, config: &'a ExportConfig) -> Self {
        Self { conn, config }
    }

    /// Build the export document from the current state of every completed cluster.
    ///
    /// Clusters, images, and split annotations are each loaded with one query.
    pub async fn export_episode(&self, episode_id: Uuid) -> Result<ExportDocument, AppError> {
        let episode = episode::Entity::find_by_id(episode_id)
            .one(self.conn)
            .await?
            .ok_or_else(|| AppError::NotFound("Episode not found".into()))?;

        let total_clusters = cluster::Entity::find()
            .filter(cluster::Column::EpisodeId.eq(episode_id))
            .count(self.conn)
            .await?;

        let completed = cluster::Entity::find()
            .filter(cluster::Column::EpisodeId.eq(episode_id))
            .filter(cluster::Column::AnnotationStatus.eq(ClusterStatus::Completed))
            .order_by_asc(cluster::Column::Id)
            .all(self.conn)
            .await?;
        let completed_ids: Vec<Uuid> = completed.iter().map(|c| c.id).collect();

        let images = image::Entity::find()
            .filter(image::Column::ClusterId.is_in(completed_ids.clone()))
            .filter(image::Column::AnnotationStatus.is_in(ImageStatus::EXPORTABLE.to_vec()))
            .order_by_asc(image::Column::Id)
            .select_only()
            .columns([
                image::Column::ClusterId,
                image::Column::FilePath,
                image::Column::CurrentLabel,
                image::Column::IsCustomLabel,
                image::Column::QualityAttributes,
                image::Column::AnnotatedAt,
            ])
            .into_model::<ReviewedImage>()
            .all(self.conn)
            .await?;

        let splits = split_annotation::Entity::find()
            .filter(split_annotation::Column::ClusterId.is_in(completed_ids))
            .order_by_asc(split_annotation::Column::CreatedAt)
            .order_by_asc(split_annotation::Column::Id)
            .all(self.conn)
            .await?;

        let annotation_date = images
            .iter()
            .filter_map(|i| i.annotated_at)
            .max()
            .unwrap_or_else(Utc::now)
            .to_rfc3339();

        let mut images_by_cluster: HashMap<Uuid, Vec<ReviewedImage>> = HashMap::new();
        for img in images {
            images_by_cluster.entry(img.cluster_id).or_default().push(img);
        }
        let mut splits_by_cluster: HashMap<Uuid, Vec<split_annotation::Model>> = HashMap::new();
        for split in splits {
            splits_by_cluster
                .entry(split.cluster_id)
                .or_default()
                .push(split);
        }

        let mut reconciler = Reconciler::new(total_clusters as usize);
        for c in completed {
            reconciler.add_cluster(&ClusterInput {
                images: images_by_cluster.remove(&c.id).unwrap_or_default(),
                splits: splits_by_cluster.remove(&c.id).unwrap_or_default(),
                cluster_name: c.cluster_name,
                person_name: c.person_name,
            });
        }

        let export_id = export_episode_id(&episode.name, &self.config.show_prefix);
        Ok(ExportDocument {
            metadata: ExportMetadata {
                clustering_file: format!("{export_id}_clusters.json"),
                episode_id: export_id,
                season: episode.season,
                episode: episode.episode_number,
                model_name: self.config.model_name.clone(),
                annotation_date,
                annotator_id: self.config.annotator_id.clone(),
            },
            cluster_annotations: reconciler.clusters,
            split_annotations: reconciler.splits,
            statistics: reconciler.statistics,
        })
    }
}

/// Lowercased episode name carrying the show prefix exactly once.
pub fn export_episode_id(name: &str, show_prefix: &str) -> String {
    let name = name.trim().to_lowercase();
    let prefix = show_prefix.trim().trim_end_matches('_').to_lowercase();
    if prefix.is_empty() {
        return name;
    }
    let prefix = format!("{prefix}_");
    if name.starts_with(&prefix) {
        name
    } else {
        format!("{prefix}{name}")
    }
}
