use common::sanitize_folder_name;

/// Maximum episode name length, in characters.
pub const MAX_EPISODE_NAME_LEN: usize = 255;

/// Image file extensions picked up from cluster folders (compared lowercased).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Why an uploaded archive's filename cannot name an episode.
#[derive(Debug, PartialEq, Eq)]
pub enum FilenameError {
    /// Filename is empty or whitespace-only.
    Empty,
    /// Filename does not end in `.zip`.
    NotZip,
    /// Filename contains control characters (CR, LF, etc.).
    ControlCharacter,
    /// Nothing is left of the stem after sanitizing.
    EmptyStem,
    /// Stem is longer than [`MAX_EPISODE_NAME_LEN`].
    TooLong,
}

impl FilenameError {
    /// Returns a human-readable error message.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "Filename cannot be empty",
            Self::NotZip => "Only .zip archives are accepted",
            Self::ControlCharacter => "Invalid filename: control characters are not allowed",
            Self::EmptyStem => "Invalid filename: no usable episode name",
            Self::TooLong => "Episode name must be at most 255 characters",
        }
    }
}

/// Derive the episode name from an uploaded archive's filename.
///
/// `Friends_S01E05.zip` becomes `Friends_S01E05`. Any client-side directory
/// part is ignored and the stem is sanitized like a cluster folder name.
pub fn episode_name_from_upload(filename: &str) -> Result<String, FilenameError> {
    let trimmed = filename.trim();
    if trimmed.is_empty() {
        return Err(FilenameError::Empty);
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err(FilenameError::ControlCharacter);
    }

    let base = trimmed.rsplit(['/', '\\']).next().unwrap_or(trimmed);
    let (stem, ext) = base.rsplit_once('.').ok_or(FilenameError::NotZip)?;
    if !ext.eq_ignore_ascii_case("zip") {
        return Err(FilenameError::NotZip);
    }

    let name = sanitize_folder_name(stem);
    if name.is_empty() {
        return Err(FilenameError::EmptyStem);
    }
    if name.chars().count() > MAX_EPISODE_NAME_LEN {
        return Err(FilenameError::TooLong);
    }
    Ok(name)
}

/// System or hidden archive artifacts such as `__MACOSX` or `.DS_Store`.
pub fn is_hidden_entry(name: &str) -> bool {
    name.starts_with("__") || name.starts_with('.')
}

pub fn is_image_file(name: &str) -> bool {
    name.rsplit_once('.').is_some_and(|(stem, ext)| {
        !stem.is_empty() && IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
    })
}
