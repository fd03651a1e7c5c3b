//! Path validation and normalization helpers shared by the upload
//! pipeline (C5) and the tree mutator (C2).

use crate::error::{Result, ThicketError};

/// `parent_dir` must be an absolute POSIX path and must not contain a
/// doubled separator.
pub fn validate_parent_dir(parent_dir: &str) -> Result<()> {
    if !parent_dir.starts_with('/') {
        return Err(ThicketError::bad_request("parent_dir must start with '/'"));
    }
    if parent_dir.contains("//") {
        return Err(ThicketError::bad_request("parent_dir must not contain '//'"));
    }
    Ok(())
}

/// `relative_path` is optional; when present it must be a relative path
/// (no leading `/` or `\`).
pub fn validate_relative_path(relative_path: &str) -> Result<()> {
    if relative_path.starts_with('/') || relative_path.starts_with('\\') {
        return Err(ThicketError::bad_request(
            "relative_path must not start with '/' or '\\\\'",
        ));
    }
    Ok(())
}

/// Collapse doubled separators and strip a trailing slash (except for
/// the root itself), so two spellings of the same path compare equal.
pub fn canonicalize_path(path: &str) -> String {
    let collapsed: String = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    format!("/{collapsed}")
}

pub fn posix_join(a: &str, b: &str) -> String {
    canonicalize_path(&format!("{a}/{b}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_dir_must_be_absolute() {
        assert!(validate_parent_dir("relative").is_err());
        assert!(validate_parent_dir("/ok").is_ok());
        assert!(validate_parent_dir("/a//b").is_err());
    }

    #[test]
    fn canonicalize_collapses_doubled_slashes() {
        assert_eq!(canonicalize_path("/a//b/"), "/a/b");
        assert_eq!(canonicalize_path("/"), "/");
        assert_eq!(canonicalize_path(""), "/");
    }

    #[test]
    fn join_normalizes_result() {
        assert_eq!(posix_join("/a/", "/b"), "/a/b");
    }
}
