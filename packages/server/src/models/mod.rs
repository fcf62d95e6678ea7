pub mod cluster;
pub mod episode;
pub mod export;
pub mod image;
pub mod shared;
