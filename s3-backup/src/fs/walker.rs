//! Directory traversal for backup passes.
//!
//! Walks one target directory and records every regular file together with
//! the path information needed to build its destination key.

use std::path::{Component, Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use super::validate::validate_directory;
use crate::utils::errors::{BackupError, Result};

/// Options for directory walking
#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    /// Descend into subdirectories
    pub recursive: bool,
}

/// A file discovered under a target directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    /// Full path to the file
    pub path: PathBuf,

    /// Last component of the target directory
    pub base_name: String,

    /// Path relative to the target directory, `/`-separated
    pub relative_path: String,
}

impl DiscoveredFile {
    /// `{base_name}/{relative_path}`, the part of the object key after the
    /// pass timestamp.
    pub fn destination(&self) -> String {
        format!("{}/{}", self.base_name, self.relative_path)
    }
}

/// Last path component of a target directory, used as its namespace in the
/// bucket. A root without one (e.g. `/`) is named `root`.
pub fn base_name(dir: &Path) -> String {
    dir.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "root".to_string())
}

/// Collect every regular file under `root`.
///
/// Subdirectories are only entered when `options.recursive` is set. Symbolic
/// links are never followed as directories; a link to a regular file is
/// collected under its own name, anything else it points to is skipped.
///
/// `cancel` is checked before every entry; a cancelled walk returns
/// [`BackupError::Cancelled`] instead of a partial list.
pub fn collect_files(
    root: &Path,
    options: &WalkOptions,
    cancel: &CancellationToken,
) -> Result<Vec<DiscoveredFile>> {
    if cancel.is_cancelled() {
        return Err(BackupError::Cancelled);
    }

    validate_directory(root)?;

    let base_name = base_name(root);
    let mut files = Vec::new();

    let mut walker = WalkDir::new(root).min_depth(1).follow_links(false);
    if !options.recursive {
        walker = walker.max_depth(1);
    }

    for entry in walker {
        if cancel.is_cancelled() {
            return Err(BackupError::Cancelled);
        }

        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            BackupError::Io {
                path,
                source: e.into(),
            }
        })?;

        if !is_collectable(&entry) {
            continue;
        }

        let relative_path = entry.path().strip_prefix(root).unwrap_or(entry.path());

        files.push(DiscoveredFile {
            path: entry.path().to_path_buf(),
            base_name: base_name.clone(),
            relative_path: to_key_path(relative_path),
        });
    }

    debug!("Collected {} files from {}", files.len(), root.display());
    Ok(files)
}

fn is_collectable(entry: &DirEntry) -> bool {
    let file_type = entry.file_type();

    if file_type.is_file() {
        return true;
    }

    if file_type.is_symlink() {
        return match std::fs::metadata(entry.path()) {
            Ok(target) if target.is_file() => true,
            Ok(_) => {
                debug!("Skipping symlink to non-file: {}", entry.path().display());
                false
            }
            Err(_) => {
                debug!("Skipping broken symlink: {}", entry.path().display());
                false
            }
        };
    }

    // Directories, sockets, fifos, devices
    false
}

/// Join path components with `/` regardless of the host separator.
fn to_key_path(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::errors::ErrorKind;
    use std::fs;
    use tempfile::TempDir;

    fn recursive() -> WalkOptions {
        WalkOptions { recursive: true }
    }

    fn relative_paths(files: &[DiscoveredFile]) -> Vec<String> {
        let mut paths: Vec<String> = files.iter().map(|f| f.relative_path.clone()).collect();
        paths.sort();
        paths
    }

    #[test]
    fn test_walk_empty_directory() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let files = collect_files(temp_dir.path(), &recursive(), &CancellationToken::new())
            .expect("empty directory should collect");
        assert!(files.is_empty());
        Ok(())
    }

    #[test]
    fn test_non_recursive_skips_subdirectories() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;

        fs::write(temp_dir.path().join("file1.txt"), b"content1")?;
        fs::write(temp_dir.path().join("file2.txt"), b"content2")?;
        fs::create_dir(temp_dir.path().join("subdir"))?;
        fs::create_dir(temp_dir.path().join("other"))?;
        fs::write(temp_dir.path().join("subdir/file3.txt"), b"content3")?;

        let files = collect_files(
            temp_dir.path(),
            &WalkOptions::default(),
            &CancellationToken::new(),
        )
        .expect("collect");

        assert_eq!(relative_paths(&files), vec!["file1.txt", "file2.txt"]);
        Ok(())
    }

    #[test]
    fn test_recursive_walks_nested_directories() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;

        fs::create_dir_all(temp_dir.path().join("a/b/c"))?;
        fs::write(temp_dir.path().join("top.txt"), b"top")?;
        fs::write(temp_dir.path().join("a/one.txt"), b"one")?;
        fs::write(temp_dir.path().join("a/b/c/deep.txt"), b"deep")?;

        let files = collect_files(temp_dir.path(), &recursive(), &CancellationToken::new())
            .expect("collect");

        assert_eq!(
            relative_paths(&files),
            vec!["a/b/c/deep.txt", "a/one.txt", "top.txt"]
        );
        Ok(())
    }

    #[test]
    fn test_records_base_name_and_destination() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path().join("documents");
        fs::create_dir_all(root.join("invoices"))?;
        fs::write(root.join("invoices/invoice-001.txt"), b"due")?;

        let files = collect_files(&root, &recursive(), &CancellationToken::new()).expect("collect");

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].base_name, "documents");
        assert_eq!(files[0].path, root.join("invoices/invoice-001.txt"));
        assert_eq!(files[0].destination(), "documents/invoices/invoice-001.txt");
        assert!(!files[0].relative_path.starts_with(".."));
        Ok(())
    }

    #[test]
    fn test_missing_and_empty_roots_are_distinct() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let cancel = CancellationToken::new();

        let missing = collect_files(&temp_dir.path().join("missing"), &recursive(), &cancel)
            .unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::DirectoryNotFound);

        let empty = collect_files(Path::new(""), &recursive(), &cancel).unwrap_err();
        assert_eq!(empty.kind(), ErrorKind::EmptyDirectory);
        Ok(())
    }

    #[test]
    fn test_cancelled_walk_returns_cancellation() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        fs::write(temp_dir.path().join("file.txt"), b"data")?;

        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = collect_files(temp_dir.path(), &recursive(), &cancel).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        Ok(())
    }

    #[test]
    #[cfg(unix)]
    fn test_symlink_policy() -> std::io::Result<()> {
        use std::os::unix::fs::symlink;

        let temp_dir = TempDir::new()?;
        let outside = TempDir::new()?;
        fs::write(outside.path().join("target.txt"), b"linked")?;
        fs::write(outside.path().join("hidden.txt"), b"hidden")?;

        fs::write(temp_dir.path().join("plain.txt"), b"plain")?;
        symlink(outside.path().join("target.txt"), temp_dir.path().join("link.txt"))?;
        symlink(outside.path(), temp_dir.path().join("linked-dir"))?;
        symlink(temp_dir.path().join("nowhere"), temp_dir.path().join("dangling"))?;

        let files = collect_files(temp_dir.path(), &recursive(), &CancellationToken::new())
            .expect("collect");

        assert_eq!(relative_paths(&files), vec!["link.txt", "plain.txt"]);
        Ok(())
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name(Path::new("/data/photos")), "photos");
        assert_eq!(base_name(Path::new("/data/photos/")), "photos");
        assert_eq!(base_name(Path::new("/")), "root");
    }
}
