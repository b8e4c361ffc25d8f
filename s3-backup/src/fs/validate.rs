//! Checks run once against the configured directories before any backup.

use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use crate::utils::errors::{BackupError, Result};

/// Verify that `path` is non-empty, exists and is a directory.
pub fn validate_directory(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(BackupError::EmptyDirectory);
    }

    match std::fs::metadata(path) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(BackupError::NotADirectory(path.to_path_buf())),
        Err(e) if e.kind() == IoErrorKind::NotFound => {
            Err(BackupError::DirectoryNotFound(path.to_path_buf()))
        }
        Err(source) => Err(BackupError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Validate every directory, stopping at the first violation.
pub fn validate_directories(paths: &[PathBuf]) -> Result<()> {
    if paths.is_empty() {
        return Err(BackupError::NoDirectories);
    }

    paths.iter().try_for_each(|path| validate_directory(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::errors::ErrorKind;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_accepts_existing_directories() -> std::io::Result<()> {
        let first = TempDir::new()?;
        let second = TempDir::new()?;

        let dirs = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        assert!(validate_directories(&dirs).is_ok());
        Ok(())
    }

    #[test]
    fn test_rejects_empty_list() {
        let err = validate_directories(&[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoDirectories);
    }

    #[test]
    fn test_reports_each_violation_kind() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let file = temp_dir.path().join("file.txt");
        fs::write(&file, b"not a directory")?;

        let cases = [
            (PathBuf::new(), ErrorKind::EmptyDirectory),
            (temp_dir.path().join("missing"), ErrorKind::DirectoryNotFound),
            (file, ErrorKind::NotADirectory),
        ];

        for (path, expected) in cases {
            let err = validate_directory(&path).unwrap_err();
            assert_eq!(err.kind(), expected, "path {:?}", path);
        }
        Ok(())
    }

    #[test]
    fn test_fails_fast_on_first_violation() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let missing = temp_dir.path().join("missing");

        let dirs = vec![temp_dir.path().to_path_buf(), missing.clone(), PathBuf::new()];
        match validate_directories(&dirs) {
            Err(BackupError::DirectoryNotFound(path)) => assert_eq!(path, missing),
            other => panic!("unexpected result: {:?}", other),
        }
        Ok(())
    }
}
