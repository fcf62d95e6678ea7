use sea_orm::sea_query::{Index, PostgresQueryBuilder};
use sea_orm::*;
use tracing::info;

use crate::entity::{episode_speaker, image};

/// Ensure required database indexes exist.
///
/// SeaORM's schema-sync doesn't support composite or expression indexes,
/// so we create them manually on startup.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    // One row per file within a cluster; re-ingesting the same file must fail.
    let stmt = Index::create()
        .if_not_exists()
        .unique()
        .name("uq_image_cluster_file_path")
        .table(image::Entity)
        .col(image::Column::ClusterId)
        .col(image::Column::FilePath)
        .to_string(PostgresQueryBuilder);
    create_index(db, "uq_image_cluster_file_path", &stmt).await;

    // Review pager and outlier recount:
    // SELECT ... FROM image WHERE cluster_id = ? AND annotation_status IN (...)
    let stmt = Index::create()
        .if_not_exists()
        .name("idx_image_cluster_status")
        .table(image::Entity)
        .col(image::Column::ClusterId)
        .col(image::Column::AnnotationStatus)
        .to_string(PostgresQueryBuilder);
    create_index(db, "idx_image_cluster_status", &stmt).await;

    // Case-insensitive episode names. Backs the duplicate-upload check under races.
    let stmt = "CREATE UNIQUE INDEX IF NOT EXISTS uq_episode_name_lower ON episode (lower(name))";
    create_index(db, "uq_episode_name_lower", stmt).await;

    let stmt = Index::create()
        .if_not_exists()
        .unique()
        .name("uq_episode_speaker_name")
        .table(episode_speaker::Entity)
        .col(episode_speaker::Column::Season)
        .col(episode_speaker::Column::EpisodeNumber)
        .col(episode_speaker::Column::SpeakerName)
        .to_string(PostgresQueryBuilder);
    create_index(db, "uq_episode_speaker_name", &stmt).await;

    Ok(())
}

async fn create_index(db: &DatabaseConnection, name: &str, stmt: &str) {
    match db.execute_unprepared(stmt).await {
        Ok(_) => {
            info!("Ensured index {} exists", name);
        }
        Err(e) => {
            tracing::warn!("Failed to create index {}: {}", name, e);
        }
    }
}
