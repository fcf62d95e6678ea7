use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use common::storage::FilesystemUploadStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

use server::config::AppConfig;
use server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let db = server::database::init_db(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to database")?;
    server::seed::ensure_indexes(&db)
        .await
        .context("Failed to create indexes")?;

    let store = FilesystemUploadStore::new(
        PathBuf::from(&config.storage.upload_dir),
        config.storage.max_entry_size,
    )
    .await
    .with_context(|| format!("Failed to open upload dir {}", config.storage.upload_dir))?;
    info!(path = %store.base_path().display(), "Upload store ready");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server.host/server.port")?;

    let state = AppState {
        db,
        store: Arc::new(store),
        config,
    };
    let app = server::build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
