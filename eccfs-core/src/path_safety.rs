use std::path::{Component, Path, PathBuf};

use crate::error::{EccError, Result};

/// Resolve an overlay path (`/a/b` as seen through the mount) under `root`.
///
/// Leading separators are stripped so the result always stays under `root`;
/// `..` and drive prefixes are refused rather than normalised.
pub fn resolve(root: &Path, logical: &str) -> Result<PathBuf> {
    let rel = Path::new(logical.trim_start_matches('/'));
    let mut out = root.to_path_buf();
    for comp in rel.components() {
        match comp {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(EccError::InvalidArgument(format!(
                    "parent traversal not allowed: {logical:?}"
                )))
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(EccError::InvalidArgument(format!(
                    "absolute component not allowed: {logical:?}"
                )))
            }
        }
    }
    Ok(out)
}

/// Canonical cache key for a logical path: no leading or trailing separators.
pub fn logical_key(logical: &str) -> String {
    logical.trim_matches('/').to_string()
}
