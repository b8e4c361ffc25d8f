//! AWS S3 (and S3-compatible) object store.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tokio::fs::File;

use super::{ObjectStore, StorageError};

/// Connection settings for [`S3Store`].
///
/// Credentials are not part of this struct; they come from the default AWS
/// provider chain (environment, profile, instance metadata).
#[derive(Debug, Clone, Default)]
pub struct S3Options {
    pub region: String,

    /// Custom endpoint for S3-compatible stores such as MinIO.
    pub endpoint_url: Option<String>,

    pub force_path_style: bool,
}

pub struct S3Store {
    client: Client,
}

impl S3Store {
    pub async fn new(options: &S3Options) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(options.region.clone()));

        if let Some(endpoint) = &options.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if options.force_path_style {
            builder = builder.force_path_style(true);
        }

        tracing::debug!(
            region = %options.region,
            endpoint = ?options.endpoint_url,
            "S3 client configured"
        );

        Self {
            client: Client::from_conf(builder.build()),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put_object(&self, bucket: &str, key: &str, body: File) -> Result<(), StorageError> {
        // Streams from the open handle rather than reading the file into memory.
        let body = ByteStream::read_from()
            .file(body)
            .build()
            .await
            .map_err(|e| StorageError::Body(e.to_string()))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| StorageError::Request(DisplayErrorContext(&e).to_string()))?;

        Ok(())
    }
}
