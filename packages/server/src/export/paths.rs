/// Logical prefix of every stored image path.
pub const UPLOAD_ROOT: &str = "uploads";

/// Rewrite a stored image path into its export form.
///
/// `uploads/Friends_S01E05/S01E05_cluster-01/frame.jpg` becomes
/// `friends_s01e05/s01e05_cluster-01/frame.jpg`. Returns `None` when fewer than
/// three segments (episode, cluster, file) remain.
pub fn export_path(stored: &str) -> Option<String> {
    let unified = stored.trim().replace('\\', "/");
    let mut rest = unified.as_str();
    loop {
        if let Some(stripped) = rest.strip_prefix("./") {
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix('/') {
            rest = stripped;
        } else {
            break;
        }
    }
    if let Some((head, tail)) = rest.split_once('/')
        && head.eq_ignore_ascii_case(UPLOAD_ROOT)
    {
        rest = tail;
    }

    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() < 3 {
        return None;
    }
    Some(segments.join("/").to_lowercase())
}
