use anyhow::{Result, anyhow};
use std::path::Path;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Strip any directory components a client put in the filename.
pub fn base_filename(filename: &str) -> &str {
    // Treat both separators as path separators regardless of platform
    filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
}

/// Checks that the upload's basename ends with `.<extension>` (case-insensitive).
/// Returns the basename on success.
pub fn validate_upload_filename<'a>(filename: &'a str, extension: &str) -> Result<&'a str> {
    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        tracing::warn!("Path traversal attempt detected: {}", filename);
    }

    let name = base_filename(filename);
    if name.is_empty() {
        return Err(anyhow!(ValidationError {
            code: "INVALID_FILENAME",
            message: "Filename cannot be empty".to_string(),
        }));
    }

    let matches = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension));
    if !matches {
        return Err(anyhow!(ValidationError {
            code: "UNSUPPORTED_EXTENSION",
            message: format!("Only .{} files are supported", extension),
        }));
    }

    Ok(name)
}
