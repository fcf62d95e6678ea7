pub mod annotation;
pub mod cluster;
pub mod episode;
pub mod health;
pub mod image;
