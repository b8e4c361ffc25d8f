//! Backup pass orchestration.
//!
//! A [`Service`] holds the immutable backup configuration and drives one full
//! pass at a time: collect files from every target, then upload each of them,
//! recording failures instead of stopping at the first one.

pub mod key;
pub mod run;
pub mod target;

use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::fs::{collect_files, WalkOptions};
use crate::storage::ObjectStore;
use crate::utils::errors::{BackupError, MultiError, Result};
pub use run::BackupRun;
pub use target::{resolve_targets, BackupTarget};

/// Default number of uploads in flight during a pass.
pub const DEFAULT_UPLOAD_CONCURRENCY: usize = 4;

/// Inputs for [`Service::new`].
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub backup_dirs: Vec<PathBuf>,
    pub recursive: bool,
    pub bucket: String,

    /// Schedule expression; empty means the caller runs single passes.
    pub schedule: String,

    pub upload_concurrency: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            backup_dirs: Vec::new(),
            recursive: false,
            bucket: String::new(),
            schedule: String::new(),
            upload_concurrency: DEFAULT_UPLOAD_CONCURRENCY,
        }
    }
}

/// Backup service.
///
/// Everything except the stop signal and the running flag is fixed at
/// construction, so passes read configuration without locking.
pub struct Service {
    pub(crate) targets: Vec<BackupTarget>,
    pub(crate) recursive: bool,
    pub(crate) bucket: String,
    pub(crate) schedule: String,
    pub(crate) upload_concurrency: usize,
    pub(crate) store: Arc<dyn ObjectStore>,
    pub(crate) stop: CancellationToken,
    pub(crate) running: AtomicBool,
}

impl Service {
    /// Validate the backup directories and build the service.
    pub fn new(settings: ServiceSettings, store: Arc<dyn ObjectStore>) -> Result<Self> {
        let targets = resolve_targets(&settings.backup_dirs)?;

        Ok(Self {
            targets,
            recursive: settings.recursive,
            bucket: settings.bucket,
            schedule: settings.schedule,
            upload_concurrency: settings.upload_concurrency.max(1),
            store,
            stop: CancellationToken::new(),
            running: AtomicBool::new(false),
        })
    }

    /// Run one full backup pass.
    ///
    /// Directory and file failures are collected into a single aggregate
    /// error; the pass only succeeds when every discovered file was uploaded.
    /// When `cancel` fires, no new work starts: uploads already in flight
    /// finish, nothing already stored is removed, and the result contains
    /// [`BackupError::Cancelled`].
    pub async fn backup(&self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(BackupError::Cancelled);
        }

        let mut run = BackupRun::new(Local::now().fixed_offset());

        self.collect_all_files(&mut run, cancel).await?;

        info!(
            "Backup {} started: {} files from {} directories",
            run.timestamp(),
            run.files().len(),
            self.targets.len()
        );

        if !run.files().is_empty() {
            let failures = self.upload_all_files(&run, cancel).await;
            run.record_upload_failures(failures);
        }

        let failed = run.failure_count();
        let timestamp = run.timestamp();
        let result = run.finish();
        match &result {
            Ok(()) => info!("Backup {} completed successfully", timestamp),
            Err(_) => warn!("Backup {} finished with {} failure(s)", timestamp, failed),
        }
        result
    }

    /// Collection phase. Only cancellation aborts it; every other directory
    /// failure is recorded on `run`.
    async fn collect_all_files(&self, run: &mut BackupRun, cancel: &CancellationToken) -> Result<()> {
        for target in &self.targets {
            if cancel.is_cancelled() {
                return Err(BackupError::Cancelled);
            }

            let root = target.path().to_path_buf();
            let options = WalkOptions {
                recursive: self.recursive,
            };
            let token = cancel.clone();

            // Use blocking task for the directory walk
            let collected =
                tokio::task::spawn_blocking(move || collect_files(&root, &options, &token)).await;

            match collected {
                Ok(Ok(files)) => {
                    info!("Scanned {} ({} files)", target.path().display(), files.len());
                    run.add_files(files);
                }
                Ok(Err(BackupError::Cancelled)) => return Err(BackupError::Cancelled),
                Ok(Err(e)) => {
                    warn!("Failed to scan {}: {}", target.path().display(), e);
                    run.record_collection_failure(e);
                }
                Err(e) => run.record_collection_failure(BackupError::Task(e)),
            }
        }

        Ok(())
    }

    /// Upload phase.
    ///
    /// At most `upload_concurrency` uploads run at once. A file is attempted
    /// only if cancellation has not fired by the time it gets an upload slot;
    /// files waiting for a slot at that moment are skipped.
    async fn upload_all_files(&self, run: &BackupRun, cancel: &CancellationToken) -> MultiError {
        let semaphore = Arc::new(Semaphore::new(self.upload_concurrency));
        let mut failures = MultiError::new();
        let mut handles = Vec::with_capacity(run.files().len());

        for file in run.files() {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
            };

            let Some(permit) = permit else {
                failures.push(BackupError::Cancelled);
                break;
            };

            let store = Arc::clone(&self.store);
            let bucket = self.bucket.clone();
            let path = file.path.clone();
            let key = run.key_for(file);

            handles.push(tokio::spawn(async move {
                let result = upload_file(store.as_ref(), &bucket, &path, key).await;
                drop(permit);
                result
            }));
        }

        let attempted = handles.len();
        let mut uploaded = 0usize;
        for handle in handles {
            match handle.await {
                Ok(Ok(())) => uploaded += 1,
                Ok(Err(e)) => {
                    warn!("{}", e);
                    failures.push(e);
                }
                Err(e) => failures.push(BackupError::Task(e)),
            }
        }

        info!(
            "Uploaded {} of {} files ({} attempted)",
            uploaded,
            run.files().len(),
            attempted
        );
        failures
    }
}

/// Open `path` and store it under `key`.
async fn upload_file(store: &dyn ObjectStore, bucket: &str, path: &Path, key: String) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(BackupError::EmptyFilename);
    }

    let file = tokio::fs::File::open(path)
        .await
        .map_err(|source| BackupError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    store
        .put_object(bucket, &key, file)
        .await
        .map_err(|source| BackupError::Upload { key, source })
}
