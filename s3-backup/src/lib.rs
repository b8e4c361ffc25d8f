//! S3 Backup Library
//!
//! Uploads local directories to an S3 bucket, once or on a cron-style
//! schedule. Every pass stores its files under a shared timestamp prefix:
//! `{timestamp}/{directory}/{relative path}`.

pub mod backup;
pub mod config;
pub mod daemon;
pub mod fs;
pub mod storage;
pub mod utils;

// Re-export commonly used types
pub use backup::{Service, ServiceSettings};
pub use config::Config;
pub use utils::errors::{BackupError, ErrorKind, Result};
