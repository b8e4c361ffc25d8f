//! Destination object storage.
//!
//! The backup pass only needs to put whole objects, so the seam is a single
//! async operation. [`s3::S3Store`] is the production implementation.

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs::File;

#[cfg(test)]
pub(crate) mod memory;
pub mod s3;

pub use s3::{S3Options, S3Store};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("failed to read object body: {0}")]
    Body(String),

    #[error("request failed: {0}")]
    Request(String),
}

/// A bucket-addressed object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store the contents of `body` under `key` in `bucket`.
    async fn put_object(&self, bucket: &str, key: &str, body: File) -> Result<(), StorageError>;
}
