pub mod json;
pub mod path_id;
