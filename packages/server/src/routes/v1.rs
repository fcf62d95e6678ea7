use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::config::StorageConfig;
use crate::handlers;
use crate::state::AppState;

pub fn routes(storage: &StorageConfig) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/episodes", episode_routes(storage))
        .nest("/clusters", cluster_routes())
        .nest(
            "/images",
            OpenApiRouter::new().routes(routes!(handlers::image::get_image)),
        )
        .routes(routes!(handlers::annotation::annotate_outliers))
        .routes(routes!(handlers::health::health))
}

fn episode_routes(storage: &StorageConfig) -> OpenApiRouter<AppState> {
    let read = OpenApiRouter::new()
        .routes(routes!(handlers::episode::list_episodes))
        .routes(routes!(
            handlers::episode::get_episode,
            handlers::episode::delete_episode
        ))
        .routes(routes!(handlers::episode::list_clusters))
        .routes(routes!(handlers::episode::export_episode))
        .routes(routes!(handlers::episode::list_speakers))
        .routes(routes!(handlers::episode::list_labels))
        .routes(routes!(handlers::episode::list_piles));

    let upload = OpenApiRouter::new()
        .routes(routes!(handlers::episode::upload_episode))
        .routes(routes!(handlers::episode::replace_episode))
        .layer(handlers::episode::upload_body_limit(storage.max_upload_size));

    read.merge(upload)
}

fn cluster_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::cluster::get_cluster))
        .routes(routes!(handlers::cluster::list_images))
        .routes(routes!(handlers::cluster::list_review_images))
        .routes(routes!(
            handlers::cluster::list_outliers,
            handlers::cluster::mark_outliers
        ))
        .routes(routes!(handlers::cluster::batch_annotate))
        .routes(routes!(handlers::cluster::annotate_cluster))
        .routes(routes!(handlers::cluster::split_cluster))
}
