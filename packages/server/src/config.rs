use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    pub max_age: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Root of the extracted upload tree, also served under `/uploads`.
    pub upload_dir: String,
    /// Request body limit for archive uploads, in bytes.
    pub max_upload_size: usize,
    /// Decompressed size limit per archive entry, in bytes.
    pub max_entry_size: u64,
    /// Decompressed size limit across a whole archive, in bytes.
    pub max_total_size: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExportConfig {
    /// Prepended to episode identifiers that lack it, e.g. `friends`.
    pub show_prefix: String,
    pub model_name: String,
    pub annotator_id: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub export: ExportConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8000)?
            .set_default("server.cors.allow_origins", Vec::<String>::new())?
            .set_default("server.cors.max_age", 3600)?
            .set_default("database.max_connections", 20)?
            .set_default("storage.upload_dir", "./uploads")?
            .set_default("storage.max_upload_size", 1024 * 1024 * 1024_i64)?
            .set_default("storage.max_entry_size", 64 * 1024 * 1024_i64)?
            .set_default("storage.max_total_size", 4 * 1024 * 1024 * 1024_i64)?
            .set_default("export.show_prefix", "friends")?
            .set_default("export.model_name", "face_clustering_v1")?
            .set_default("export.annotator_id", "human_annotator")?
            // Load from config/config.toml
            .add_source(File::with_name("config/config").required(false))
            // Override from environment (e.g., CLUSTERMARK__DATABASE__URL)
            .add_source(
                Environment::with_prefix("CLUSTERMARK")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors.allow_origins")
                    .try_parsing(true),
            )
            .build()?;

        s.try_deserialize()
    }
}
