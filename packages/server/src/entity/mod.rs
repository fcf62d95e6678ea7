pub mod cluster;
pub mod episode;
pub mod episode_speaker;
pub mod image;
pub mod split_annotation;
