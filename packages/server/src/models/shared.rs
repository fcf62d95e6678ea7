use std::collections::HashSet;
use std::fmt::Display;
use std::hash::Hash;

use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::AppError;

/// Maximum length of a person label, in characters.
pub const MAX_PERSON_NAME_LEN: usize = 255;

/// Query parameters for paged image review.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct PageQuery {
    /// 1-based page number. Defaults to 1.
    pub page: Option<u64>,
    /// Images per page, clamped to 1-100. Defaults to 20.
    pub page_size: Option<u64>,
}

impl PageQuery {
    pub fn resolve(&self) -> (u64, u64) {
        let page = Ord::max(self.page.unwrap_or(1), 1);
        let page_size = self.page_size.unwrap_or(20).clamp(1, 100);
        (page, page_size)
    }
}

/// Trim and validate a person label (1-255 characters).
pub fn validate_person_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_PERSON_NAME_LEN {
        return Err(AppError::Validation(format!(
            "person_name must be 1-{MAX_PERSON_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

/// Reject ID lists that mention the same ID twice.
pub fn validate_unique_ids<T: Eq + Hash + Display + Copy>(
    ids: impl IntoIterator<Item = T>,
    name: &str,
) -> Result<(), AppError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(AppError::Validation(format!("Duplicate {name} ID: {id}")));
        }
    }
    Ok(())
}
