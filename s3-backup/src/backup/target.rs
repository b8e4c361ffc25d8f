//! Configured backup targets.

use std::path::{Component, Path, PathBuf};
use tracing::warn;

use crate::fs::{base_name, validate_directories};
use crate::utils::errors::{BackupError, Result};

/// A validated local directory to back up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupTarget {
    path: PathBuf,
    base_name: String,
}

impl BackupTarget {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Namespace of this target's files in the bucket.
    pub fn base_name(&self) -> &str {
        &self.base_name
    }
}

/// Validate `dirs` and turn them into an ordered, de-duplicated target list.
///
/// Relative paths are made absolute against the working directory, and `.`
/// and `..` components are resolved lexically so every target has a real
/// last component to name it by.
pub fn resolve_targets(dirs: &[PathBuf]) -> Result<Vec<BackupTarget>> {
    validate_directories(dirs)?;

    let mut targets: Vec<BackupTarget> = Vec::with_capacity(dirs.len());
    for dir in dirs {
        let path = std::path::absolute(dir)
            .map(|absolute| normalize(&absolute))
            .map_err(|source| BackupError::Io {
                path: dir.clone(),
                source,
            })?;

        if targets.iter().any(|t| t.path == path) {
            continue;
        }

        let base_name = base_name(&path);
        if let Some(other) = targets.iter().find(|t| t.base_name == base_name) {
            warn!(
                "Backup directories {} and {} share the name {:?}; their objects will be stored under the same prefix",
                other.path.display(),
                path.display(),
                base_name
            );
        }

        targets.push(BackupTarget { path, base_name });
    }

    Ok(targets)
}

fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(normalized.components().next_back(), Some(Component::Normal(_))) {
                    normalized.pop();
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}
