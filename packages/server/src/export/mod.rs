pub mod paths;
pub mod reconcile;
pub mod service;

pub use service::ExportService;
