pub mod config;
pub mod database;
pub mod entity;
pub mod error;
pub mod export;
pub mod extractors;
pub mod handlers;
pub mod harmonize;
pub mod ingest;
pub mod models;
pub mod routes;
pub mod seed;
pub mod state;
pub mod utils;
pub mod workflow;

use std::time::Duration;

use axum::extract::Request;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_scalar::{Scalar, Servable as ScalarServable};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::CorsConfig;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Clustermark API",
        version = "1.0.0",
        description = "Review, label, and export pre-clustered face images of TV episodes"
    ),
    tags(
        (name = "Episodes", description = "Archive upload, replacement, and episode-level views"),
        (name = "Clusters", description = "Outlier review and cluster labeling"),
        (name = "Annotations", description = "Individual outlier labeling"),
        (name = "Images", description = "Image lookup"),
        (name = "Health", description = "Service status"),
    ),
)]
struct ApiDoc;

/// Build the application router.
pub fn build_router(state: AppState) -> axum::Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .nest("/api", routes::api_routes(&state.config.storage))
        .split_for_parts();

    let uploads = axum::Router::new()
        .fallback_service(ServeDir::new(&state.config.storage.upload_dir))
        .layer(middleware::from_fn(hide_internal_entries));
    let cors = cors_layer(&state.config.server.cors);

    router
        .with_state(state)
        .nest_service("/uploads", uploads)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api.clone()))
        .merge(Scalar::with_url("/scalar", api))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// The store's temp and staging directories live under the upload root; never serve them.
async fn hide_internal_entries(req: Request, next: Next) -> Response {
    let hidden = req.uri().path().split('/').any(|segment| {
        segment.starts_with('.') || segment.to_ascii_lowercase().starts_with("%2e")
    });
    if hidden {
        return StatusCode::NOT_FOUND.into_response();
    }
    next.run(req).await
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allow_origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(config.max_age))
}
