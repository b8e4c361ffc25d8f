//! Configuration management for the backup service.
//!
//! Loads an optional YAML file, then applies environment variable overrides.
//! Environment variables win over the file.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::backup::{ServiceSettings, DEFAULT_UPLOAD_CONCURRENCY};
use crate::storage::S3Options;

/// Path to the YAML configuration file
pub const ENV_CONFIG_FILE: &str = "S3_BACKUP_CONFIG_FILE";
/// Comma separated backup directories
pub const ENV_BACKUP_DIRS: &str = "BACKUP_DIRS";
pub const ENV_RECURSIVE: &str = "BACKUP_RECURSIVE";
pub const ENV_CRON_SCHEDULE: &str = "BACKUP_CRON_SCHEDULE";
pub const ENV_UPLOAD_CONCURRENCY: &str = "BACKUP_UPLOAD_CONCURRENCY";
pub const ENV_LOG_LEVEL: &str = "BACKUP_LOG_LEVEL";
pub const ENV_AWS_REGION: &str = "AWS_REGION";
pub const ENV_S3_BUCKET: &str = "S3_BUCKET";
pub const ENV_S3_ENDPOINT_URL: &str = "S3_ENDPOINT_URL";
pub const ENV_S3_FORCE_PATH_STYLE: &str = "S3_FORCE_PATH_STYLE";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no backup directories configured (set BACKUP_DIRS or configure in YAML)")]
    MissingBackupDirs,

    #[error("missing AWS region (set AWS_REGION or configure in YAML)")]
    MissingRegion,

    #[error("invalid AWS region {region:?}: {reason}")]
    InvalidRegion { region: String, reason: &'static str },

    #[error("missing S3 bucket name (set S3_BUCKET or configure in YAML)")]
    MissingBucket,

    #[error("upload concurrency must be at least 1")]
    InvalidConcurrency,

    #[error("invalid value {value:?} for {variable}: expected {expected}")]
    InvalidValue {
        variable: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("failed to load configuration: {0}")]
    Source(#[from] config::ConfigError),
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Config {
    /// Directories to back up
    #[serde(default)]
    pub backup_dirs: Vec<PathBuf>,

    /// Descend into subdirectories
    #[serde(default)]
    pub recursive: bool,

    /// Schedule expression; empty runs a single backup and exits
    #[serde(default)]
    pub cron_schedule: String,

    #[serde(default)]
    pub aws_region: String,

    #[serde(default)]
    pub s3_bucket: String,

    /// Endpoint of an S3-compatible store
    #[serde(default)]
    pub endpoint_url: Option<String>,

    #[serde(default)]
    pub force_path_style: bool,

    /// Maximum uploads in flight during a backup
    #[serde(default = "default_upload_concurrency")]
    pub upload_concurrency: usize,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_upload_concurrency() -> usize {
    DEFAULT_UPLOAD_CONCURRENCY
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load from `path` (or `$S3_BACKUP_CONFIG_FILE`) and the process
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, |name| std::env::var(name).ok())
    }

    /// Load using `env` to look up environment variables. Empty values count
    /// as unset. A configuration file that does not exist is ignored.
    pub fn load_with<F>(path: Option<&Path>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| env(name).filter(|value| !value.trim().is_empty());

        let file = path
            .map(Path::to_path_buf)
            .or_else(|| lookup(ENV_CONFIG_FILE).map(PathBuf::from));

        let mut builder = config::Config::builder();
        if let Some(file) = file {
            builder = builder.add_source(
                config::File::from(file)
                    .format(config::FileFormat::Yaml)
                    .required(false),
            );
        }

        let backup_dirs = lookup(ENV_BACKUP_DIRS).map(|dirs| {
            dirs.split(',')
                .map(str::trim)
                .filter(|dir| !dir.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        });

        let recursive = lookup(ENV_RECURSIVE)
            .map(|value| parse_bool(ENV_RECURSIVE, &value))
            .transpose()?;
        let force_path_style = lookup(ENV_S3_FORCE_PATH_STYLE)
            .map(|value| parse_bool(ENV_S3_FORCE_PATH_STYLE, &value))
            .transpose()?;
        let upload_concurrency = lookup(ENV_UPLOAD_CONCURRENCY)
            .map(|value| parse_count(ENV_UPLOAD_CONCURRENCY, &value))
            .transpose()?;

        let config: Config = builder
            .set_override_option("backup_dirs", backup_dirs)?
            .set_override_option("recursive", recursive)?
            .set_override_option("cron_schedule", lookup(ENV_CRON_SCHEDULE))?
            .set_override_option("aws_region", lookup(ENV_AWS_REGION))?
            .set_override_option("s3_bucket", lookup(ENV_S3_BUCKET))?
            .set_override_option("endpoint_url", lookup(ENV_S3_ENDPOINT_URL))?
            .set_override_option("force_path_style", force_path_style)?
            .set_override_option("upload_concurrency", upload_concurrency)?
            .set_override_option("log_level", lookup(ENV_LOG_LEVEL))?
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Check required values. Directory existence is checked when the
    /// backup service is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backup_dirs.is_empty() {
            return Err(ConfigError::MissingBackupDirs);
        }

        if self.aws_region.is_empty() {
            return Err(ConfigError::MissingRegion);
        }
        validate_aws_region(&self.aws_region)?;

        if self.s3_bucket.is_empty() {
            return Err(ConfigError::MissingBucket);
        }

        if self.upload_concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }

        Ok(())
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            backup_dirs: self.backup_dirs.clone(),
            recursive: self.recursive,
            bucket: self.s3_bucket.clone(),
            schedule: self.cron_schedule.trim().to_string(),
            upload_concurrency: self.upload_concurrency,
        }
    }

    pub fn s3_options(&self) -> S3Options {
        S3Options {
            region: self.aws_region.clone(),
            endpoint_url: self.endpoint_url.clone(),
            force_path_style: self.force_path_style,
        }
    }

    pub fn is_scheduled(&self) -> bool {
        !self.cron_schedule.trim().is_empty()
    }
}

/// AWS regions look like `{code}-{direction}-{number}`, e.g. `us-west-2`.
pub fn validate_aws_region(region: &str) -> Result<(), ConfigError> {
    let invalid = |reason| ConfigError::InvalidRegion {
        region: region.to_string(),
        reason,
    };

    let parts: Vec<&str> = region.split('-').collect();
    if parts.len() != 3 {
        return Err(invalid("expected format {code}-{direction}-{number}"));
    }
    if parts[0].len() != 2 {
        return Err(invalid("invalid region code"));
    }
    if parts[1].is_empty() {
        return Err(invalid("invalid direction"));
    }
    if parts[2].is_empty() || parts[2].parse::<u32>().is_err() {
        return Err(invalid("zone must be a number"));
    }

    Ok(())
}

fn parse_bool(variable: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            variable,
            value: value.to_string(),
            expected: "a boolean",
        }),
    }
}

fn parse_count(variable: &'static str, value: &str) -> Result<i64, ConfigError> {
    value
        .trim()
        .parse::<u32>()
        .map(i64::from)
        .map_err(|_| ConfigError::InvalidValue {
            variable,
            value: value.to_string(),
            expected: "a non-negative integer",
        })
}
