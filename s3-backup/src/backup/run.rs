//! Transient state of a single backup pass.

use chrono::{DateTime, FixedOffset};

use super::key::{build_key, format_timestamp};
use crate::fs::DiscoveredFile;
use crate::utils::errors::{BackupError, MultiError, Phase, Result};

/// One pass: its timestamp, the files it found and what went wrong.
///
/// Every key built from a run shares the run's timestamp, even though the
/// uploads themselves happen at slightly different instants. The timestamp
/// keeps the offset it was taken in, and keys show its wall-clock time.
#[derive(Debug)]
pub struct BackupRun {
    started_at: DateTime<FixedOffset>,
    files: Vec<DiscoveredFile>,
    collection_failures: MultiError,
    upload_failures: MultiError,
}

impl BackupRun {
    pub fn new(started_at: DateTime<FixedOffset>) -> Self {
        Self {
            started_at,
            files: Vec::new(),
            collection_failures: MultiError::new(),
            upload_failures: MultiError::new(),
        }
    }

    pub fn timestamp(&self) -> String {
        format_timestamp(&self.started_at)
    }

    pub fn files(&self) -> &[DiscoveredFile] {
        &self.files
    }

    pub fn add_files(&mut self, files: Vec<DiscoveredFile>) {
        self.files.extend(files);
    }

    pub fn key_for(&self, file: &DiscoveredFile) -> String {
        build_key(&file.destination(), &self.started_at)
    }

    pub fn record_collection_failure(&mut self, error: BackupError) {
        self.collection_failures.push(error);
    }

    pub fn record_upload_failures(&mut self, errors: MultiError) {
        self.upload_failures.extend(errors);
    }

    pub fn failure_count(&self) -> usize {
        self.collection_failures.len() + self.upload_failures.len()
    }

    /// Join both phases' failures into the pass result.
    pub fn finish(self) -> Result<()> {
        let mut pass = MultiError::new();

        if let Err(e) = self.collection_failures.into_result(Phase::Collection) {
            pass.push(e);
        }
        if let Err(e) = self.upload_failures.into_result(Phase::Upload) {
            pass.push(e);
        }

        pass.into_result(Phase::Pass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::errors::ErrorKind;
    use chrono::{TimeZone, Utc};
    use std::path::PathBuf;

    fn file(base: &str, rel: &str) -> DiscoveredFile {
        DiscoveredFile {
            path: PathBuf::from(format!("/data/{base}/{rel}")),
            base_name: base.to_string(),
            relative_path: rel.to_string(),
        }
    }

    #[test]
    fn test_keys_share_the_run_timestamp() {
        let started_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut run = BackupRun::new(started_at.fixed_offset());
        run.add_files(vec![file("docs", "a.txt"), file("photos", "b/c.jpg")]);

        let keys: Vec<String> = run.files().iter().map(|f| run.key_for(f)).collect();
        assert_eq!(
            keys,
            vec![
                "2024-05-01T12-00-00/docs/a.txt",
                "2024-05-01T12-00-00/photos/b/c.jpg"
            ]
        );
        assert_eq!(run.timestamp(), "2024-05-01T12-00-00");
    }

    #[test]
    fn test_clean_run_succeeds() {
        let run = BackupRun::new(Utc::now().fixed_offset());
        assert!(run.finish().is_ok());
    }

    #[test]
    fn test_finish_joins_both_phases() {
        let mut run = BackupRun::new(Utc::now().fixed_offset());
        run.record_collection_failure(BackupError::DirectoryNotFound(PathBuf::from("/gone")));
        run.record_upload_failures(vec![BackupError::EmptyFilename].into_iter().collect());
        assert_eq!(run.failure_count(), 2);

        let err = run.finish().unwrap_err();
        assert!(err.contains(ErrorKind::DirectoryNotFound));
        assert!(err.contains(ErrorKind::EmptyFilename));
        assert_eq!(err.leaves().len(), 2);
    }
}
