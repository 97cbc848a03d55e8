use std::path::Path;

/// Used when the extension is missing or unknown
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Media type to declare for a local file, guessed from its extension
pub fn content_type_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first()
        .map(|m| m.to_string())
        .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string())
}
