mod error;
mod traits;

pub mod filesystem;

pub use error::StorageError;
pub use filesystem::FilesystemUploadStore;
pub use traits::UploadStore;
