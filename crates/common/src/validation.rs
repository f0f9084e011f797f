//! Input validation shared by the thumbnail service
//!
//! Guards inputs that end up on a filesystem path or a subprocess command
//! line:
//! - unbounded strings
//! - path traversal out of a configured root
//! - control characters that would corrupt ffmpeg arguments or logs

use anyhow::{anyhow, Result};
use std::path::{Component, Path, PathBuf};

/// Maximum length for file paths
pub const MAX_PATH_LENGTH: usize = 4096;

/// Maximum length for URIs handed to the decoder
pub const MAX_URI_LENGTH: usize = 8192;

/// Validate string length against a maximum
pub fn validate_length(value: &str, max_length: usize, field_name: &str) -> Result<()> {
    if value.len() > max_length {
        return Err(anyhow!(
            "{} exceeds maximum length of {} bytes (got {})",
            field_name,
            max_length,
            value.len()
        ));
    }
    Ok(())
}

/// Validate non-empty string
pub fn validate_non_empty(value: &str, field_name: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(anyhow!("{} cannot be empty", field_name));
    }
    Ok(())
}

/// Reject ASCII control characters (newlines, NUL, escape sequences)
pub fn validate_no_control_chars(value: &str, field_name: &str) -> Result<()> {
    if value.chars().any(|c| c.is_control()) {
        return Err(anyhow!("{} contains control characters", field_name));
    }
    Ok(())
}

/// Validate a source URI before it is passed to the decoder
pub fn validate_source_uri(uri: &str) -> Result<()> {
    validate_non_empty(uri, "source uri")?;
    validate_length(uri, MAX_URI_LENGTH, "source uri")?;
    validate_no_control_chars(uri, "source uri")?;
    // ffmpeg would treat a leading dash as an option
    if uri.starts_with('-') {
        return Err(anyhow!("source uri cannot start with '-'"));
    }
    Ok(())
}

/// Resolve a relative object key under `base`, without requiring it to exist.
///
/// Rejects absolute paths, `..` components and anything else that could
/// address a file outside `base`.
pub fn resolve_under_root(key: &str, base: &Path, field_name: &str) -> Result<PathBuf> {
    validate_non_empty(key, field_name)?;
    validate_length(key, MAX_PATH_LENGTH, field_name)?;
    validate_no_control_chars(key, field_name)?;

    let relative = Path::new(key);
    for component in relative.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => {
                return Err(anyhow!(
                    "{} contains '..' component (path traversal attempt)",
                    field_name
                ));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(anyhow!("{} must be a relative path", field_name));
            }
        }
    }

    let combined = base.join(relative);
    if !combined.starts_with(base) {
        return Err(anyhow!("{} attempts to escape base directory", field_name));
    }

    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_length() {
        assert!(validate_length("short", 10, "field").is_ok());
        assert!(validate_length("this is too long", 10, "field").is_err());
    }

    #[test]
    fn test_validate_non_empty() {
        assert!(validate_non_empty("value", "field").is_ok());
        assert!(validate_non_empty("", "field").is_err());
        assert!(validate_non_empty("   ", "field").is_err());
    }

    #[test]
    fn test_validate_source_uri() {
        assert!(validate_source_uri("https://bucket.example.com/v.mp4?X-Amz-Signature=abc").is_ok());
        assert!(validate_source_uri("/data/videos/a.mp4").is_ok());
        assert!(validate_source_uri("").is_err());
        assert!(validate_source_uri("-filter_complex").is_err());
        assert!(validate_source_uri("http://x/\nv.mp4").is_err());
    }

    #[test]
    fn test_resolve_under_root() {
        let root = tempfile::tempdir().unwrap();
        let resolved = resolve_under_root("videos/a.mp4", root.path(), "key").unwrap();
        assert_eq!(resolved, root.path().join("videos/a.mp4"));

        assert!(resolve_under_root("../etc/passwd", root.path(), "key").is_err());
        assert!(resolve_under_root("videos/../../x", root.path(), "key").is_err());
        assert!(resolve_under_root("/etc/passwd", root.path(), "key").is_err());
        assert!(resolve_under_root("", root.path(), "key").is_err());
    }
}
