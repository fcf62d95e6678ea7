pub mod scene;
pub mod service;

pub use service::WorkflowService;
