//! Recurring backup passes.
//!
//! [`Service::start`] parses the schedule once, spawns a driver task that
//! sleeps until each occurrence and runs a pass, and returns when the service
//! is stopped or the shutdown token is cancelled.

use chrono::Local;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::schedule::Schedule;
use crate::backup::Service;
use crate::utils::errors::{BackupError, Result};

impl Service {
    /// Run backup passes on the configured schedule until [`Service::stop`]
    /// is called or `shutdown` is cancelled.
    ///
    /// An invalid schedule is returned immediately and no pass runs. Failed
    /// passes are logged and never end the loop. Before returning, waits for
    /// any pass that is still running; `shutdown` is also the pass's own
    /// cancellation token, so cancelling it cuts that pass short.
    ///
    /// Dropping the returned future halts the driver and clears the running
    /// flag; a pass already in progress still runs to completion.
    pub async fn start(self: Arc<Self>, shutdown: CancellationToken) -> Result<()> {
        let schedule = Schedule::parse(&self.schedule).map_err(|reason| {
            BackupError::InvalidSchedule {
                expression: self.schedule.clone(),
                reason,
            }
        })?;

        if schedule.next_after(&Local::now()).is_none() {
            return Err(BackupError::InvalidSchedule {
                expression: self.schedule.clone(),
                reason: "schedule never fires".to_string(),
            });
        }

        if self.running.swap(true, Ordering::SeqCst) {
            return Err(BackupError::AlreadyRunning);
        }
        let _running = RunningGuard(&self.running);

        info!(schedule = %self.schedule, "Backup scheduler started");

        let halt = CancellationToken::new();
        let _halt_on_drop = halt.clone().drop_guard();
        let driver = tokio::spawn(drive(
            Arc::clone(&self),
            schedule,
            halt.clone(),
            shutdown.clone(),
        ));

        tokio::select! {
            _ = self.stop.cancelled() => info!("Received stop signal"),
            _ = shutdown.cancelled() => info!("Shutdown requested, stopping scheduler"),
        }

        halt.cancel();
        if let Err(e) = driver.await {
            error!("Scheduler task failed: {}", e);
        }

        info!("Backup scheduler stopped");
        Ok(())
    }

    /// Ask a running scheduler to stop. Safe to call any number of times.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Clears the running flag when `start` returns or its future is dropped.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

async fn drive(
    service: Arc<Service>,
    schedule: Schedule,
    halt: CancellationToken,
    shutdown: CancellationToken,
) {
    loop {
        let now = Local::now();
        let Some(next) = schedule.next_after(&now) else {
            warn!("Schedule has no further occurrences");
            halt.cancelled().await;
            return;
        };

        debug!(next = %next, "Next backup scheduled");
        let wait = (next - now).to_std().unwrap_or_default();

        tokio::select! {
            _ = halt.cancelled() => return,
            _ = tokio::time::sleep(wait) => {}
        }

        if shutdown.is_cancelled() {
            warn!("Skipping scheduled backup: shutdown in progress");
            continue;
        }

        info!("Starting scheduled backup");
        // Not raced against `halt`: a stop request lets the pass finish.
        match service.backup(&shutdown).await {
            Ok(()) => info!("Scheduled backup completed successfully"),
            Err(e) => error!("Scheduled backup failed: {}", e),
        }
    }
}
