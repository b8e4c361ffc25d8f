//! S3 Backup - Main entry point
//!
//! Runs a single backup pass, or keeps running passes on the configured
//! schedule until SIGINT/SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use s3_backup::{config::Config, daemon::ShutdownCoordinator, storage::S3Store, utils, Service};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to YAML configuration file (overrides S3_BACKUP_CONFIG_FILE)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Run a single backup even if a schedule is configured
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load(args.config.as_deref()).context("failed to load configuration")?;

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&config.log_level);
    utils::logger::init(log_level)?;

    tracing::info!(
        aws_region = %config.aws_region,
        s3_bucket = %config.s3_bucket,
        cron_schedule = %config.cron_schedule,
        "Starting s3-backup v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Signals cancel the shared token
    let shutdown_coordinator = Arc::new(ShutdownCoordinator::new());
    let shutdown = shutdown_coordinator.token();
    let signal_handle = {
        let coordinator = Arc::clone(&shutdown_coordinator);
        tokio::spawn(async move { coordinator.wait_for_signal().await })
    };

    let store = S3Store::new(&config.s3_options()).await;
    let service = Service::new(config.service_settings(), Arc::new(store))
        .context("failed to create backup service")?;

    let result = if config.is_scheduled() && !args.once {
        tracing::info!(schedule = %config.cron_schedule, "Starting backup scheduler");
        Arc::new(service)
            .start(shutdown.clone())
            .await
            .context("scheduler failed")
    } else {
        tracing::info!("Running one-time backup");
        service.backup(&shutdown).await.context("backup failed")
    };

    shutdown_coordinator.trigger();
    if let Err(e) = signal_handle.await {
        tracing::error!("Signal handler task failed: {}", e);
    }

    match &result {
        Ok(()) => tracing::info!("Backup service exited cleanly"),
        Err(e) => tracing::error!("{:#}", e),
    }
    result
}
