//! Error types for backup passes and the aggregate used to join failures.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::storage::StorageError;

/// Coarse classification of a [`BackupError`], used to look for a failure
/// anywhere inside an aggregate without matching on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NoDirectories,
    EmptyDirectory,
    DirectoryNotFound,
    NotADirectory,
    EmptyFilename,
    InvalidSchedule,
    AlreadyRunning,
    Cancelled,
    Io,
    Upload,
    Task,
    Aggregate,
}

/// The part of a backup pass an aggregate error was produced by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Collection,
    Upload,
    Pass,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Collection => f.write_str("file collection"),
            Phase::Upload => f.write_str("file upload"),
            Phase::Pass => f.write_str("backup"),
        }
    }
}

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("no backup directories configured")]
    NoDirectories,

    #[error("directory path cannot be empty")]
    EmptyDirectory,

    #[error("directory does not exist: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("filename cannot be empty")]
    EmptyFilename,

    #[error("invalid schedule {expression:?}: {reason}")]
    InvalidSchedule { expression: String, reason: String },

    #[error("scheduler is already running")]
    AlreadyRunning,

    #[error("operation cancelled")]
    Cancelled,

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to upload object {key}: {source}")]
    Upload {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("{phase} failed with {} error(s): {errors}", .errors.len())]
    Aggregate { phase: Phase, errors: MultiError },
}

impl BackupError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BackupError::NoDirectories => ErrorKind::NoDirectories,
            BackupError::EmptyDirectory => ErrorKind::EmptyDirectory,
            BackupError::DirectoryNotFound(_) => ErrorKind::DirectoryNotFound,
            BackupError::NotADirectory(_) => ErrorKind::NotADirectory,
            BackupError::EmptyFilename => ErrorKind::EmptyFilename,
            BackupError::InvalidSchedule { .. } => ErrorKind::InvalidSchedule,
            BackupError::AlreadyRunning => ErrorKind::AlreadyRunning,
            BackupError::Cancelled => ErrorKind::Cancelled,
            BackupError::Io { .. } => ErrorKind::Io,
            BackupError::Upload { .. } => ErrorKind::Upload,
            BackupError::Task(_) => ErrorKind::Task,
            BackupError::Aggregate { .. } => ErrorKind::Aggregate,
        }
    }

    /// Whether an error of `kind` is this error or appears anywhere inside it.
    pub fn contains(&self, kind: ErrorKind) -> bool {
        self.count(kind) > 0
    }

    /// Number of errors of `kind` in this error, including nested aggregates.
    pub fn count(&self, kind: ErrorKind) -> usize {
        let own = usize::from(self.kind() == kind);
        match self {
            BackupError::Aggregate { errors, .. } => own + errors.count(kind),
            _ => own,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.contains(ErrorKind::Cancelled)
    }

    /// Leaf errors of this error, flattening nested aggregates.
    pub fn leaves(&self) -> Vec<&BackupError> {
        match self {
            BackupError::Aggregate { errors, .. } => {
                errors.iter().flat_map(BackupError::leaves).collect()
            }
            other => vec![other],
        }
    }
}

/// An ordered collection of independent failures.
///
/// Each pass phase tolerates partial failure: item errors are pushed here and
/// the collection is turned into a single [`BackupError::Aggregate`] at the
/// end of the phase.
#[derive(Debug, Default)]
pub struct MultiError {
    errors: Vec<BackupError>,
}

impl MultiError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: BackupError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BackupError> {
        self.errors.iter()
    }

    pub fn contains(&self, kind: ErrorKind) -> bool {
        self.errors.iter().any(|e| e.contains(kind))
    }

    pub fn count(&self, kind: ErrorKind) -> usize {
        self.errors.iter().map(|e| e.count(kind)).sum()
    }

    /// `Ok(())` when nothing failed, otherwise an aggregate tagged with `phase`.
    pub fn into_result(self, phase: Phase) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(BackupError::Aggregate {
                phase,
                errors: self,
            })
        }
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl Extend<BackupError> for MultiError {
    fn extend<I: IntoIterator<Item = BackupError>>(&mut self, iter: I) {
        self.errors.extend(iter);
    }
}

impl FromIterator<BackupError> for MultiError {
    fn from_iter<I: IntoIterator<Item = BackupError>>(iter: I) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for MultiError {
    type Item = BackupError;
    type IntoIter = std::vec::IntoIter<BackupError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;
