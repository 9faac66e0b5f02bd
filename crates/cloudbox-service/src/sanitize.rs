//! Normalization of user-supplied file and directory names.

use cloudbox_core::error::AppError;
use cloudbox_entity::directory::DEFAULT_DIRECTORY_NAME;

/// Longest name kept after sanitizing, in characters.
pub const MAX_NAME_CHARS: usize = 255;

/// Strip markup tags and control characters, replace path separators,
/// and trim surrounding whitespace.
pub fn sanitize_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_tag = false;

    for c in raw.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if in_tag => {}
            '/' | '\\' => out.push('_'),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }

    out.trim().chars().take(MAX_NAME_CHARS).collect::<String>().trim_end().to_string()
}

/// Sanitize a file name; an empty result is rejected.
pub fn file_name(raw: &str) -> Result<String, AppError> {
    let name = sanitize_name(raw);
    if name.is_empty() {
        return Err(AppError::validation("File name cannot be empty"));
    }
    Ok(name)
}

/// Sanitize a directory name; an empty result becomes the default name.
pub fn directory_name(raw: Option<&str>) -> String {
    let name = raw.map(sanitize_name).unwrap_or_default();
    if name.is_empty() {
        DEFAULT_DIRECTORY_NAME.to_string()
    } else {
        name
    }
}
