mod v1;

use utoipa_axum::router::OpenApiRouter;

use crate::config::StorageConfig;
use crate::state::AppState;

pub fn api_routes(storage: &StorageConfig) -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest("/v1", v1::routes(storage))
}
