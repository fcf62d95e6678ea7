pub mod archive;
pub mod service;

pub use service::IngestService;
