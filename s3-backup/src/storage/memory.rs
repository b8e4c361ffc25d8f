//! In-memory object store for tests.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use super::{ObjectStore, StorageError};

/// Records every stored object and rejects keys ending in any of the
/// configured suffixes.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, (String, Vec<u8>)>>,
    rejected_suffixes: Vec<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    attempted: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting<I, S>(suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rejected_suffixes: suffixes.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Hold every put for `delay` before completing it.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of puts that have started, successful or not.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Keys passed to `put_object`, in call order.
    pub fn attempted(&self) -> Vec<String> {
        self.attempted.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|(_, data)| data.clone())
    }

    pub fn bucket_of(&self, key: &str) -> Option<String> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|(bucket, _)| bucket.clone())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put_object(&self, bucket: &str, key: &str, mut body: File) -> Result<(), StorageError> {
        self.attempted.lock().unwrap().push(key.to_string());
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.rejected_suffixes.iter().any(|s| key.ends_with(s.as_str())) {
            return Err(StorageError::Request(format!("access denied for {key}")));
        }

        let mut data = Vec::new();
        body.read_to_end(&mut data)
            .await
            .map_err(|e| StorageError::Body(e.to_string()))?;

        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (bucket.to_string(), data));
        Ok(())
    }
}
