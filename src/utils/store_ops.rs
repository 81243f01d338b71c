//! Object store abstraction for testability
//!
//! The uploader, resolver and restore download only need bucket/object
//! existence checks, a put, a prefix listing and a download. The S3-backed
//! implementation lives in `utils::s3`; an in-memory store for tests lives in
//! [`mock`].

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;

/// One listed object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub last_modified: DateTime<Utc>,
    pub size: u64,
}

impl ObjectSummary {
    /// Last path segment of the key
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

/// Abstraction over the remote archive store
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Name of the bucket (for log messages)
    fn bucket(&self) -> &str;

    /// Whether the configured bucket exists
    async fn bucket_exists(&self) -> Result<bool>;

    /// Whether an object exists at the key
    async fn object_exists(&self, key: &str) -> Result<bool>;

    /// Upload a local file to the key, streamed from disk
    async fn put_file(&self, key: &str, source: &Path) -> Result<()>;

    /// All objects whose key starts with the prefix
    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectSummary>>;

    /// Download the object at the key into a local file
    async fn download(&self, key: &str, destination: &Path) -> Result<()>;
}

/// In-memory store for testing
/// Available for use in external test crates
pub mod mock {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Debug)]
    struct StoredObject {
        body: Vec<u8>,
        last_modified: DateTime<Utc>,
    }

    /// Recorded store call
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum StoreCall {
        BucketExists,
        ObjectExists { key: String },
        Put { key: String },
        List { prefix: String },
        Download { key: String },
    }

    /// In-memory object store
    #[derive(Clone)]
    pub struct MemoryStore {
        bucket: String,
        bucket_present: bool,
        objects: Arc<Mutex<BTreeMap<String, StoredObject>>>,
        failing_puts: Arc<Mutex<Vec<String>>>,
        /// Recorded operation calls
        pub calls: Arc<Mutex<Vec<StoreCall>>>,
    }

    impl MemoryStore {
        pub fn new(bucket: &str) -> Self {
            Self {
                bucket: bucket.to_string(),
                bucket_present: true,
                objects: Arc::default(),
                failing_puts: Arc::default(),
                calls: Arc::default(),
            }
        }

        /// A store whose bucket does not exist
        pub fn missing_bucket(bucket: &str) -> Self {
            Self {
                bucket_present: false,
                ..Self::new(bucket)
            }
        }

        /// Seed an object with an explicit last-modified time
        pub fn with_object(self, key: &str, body: &[u8], last_modified: DateTime<Utc>) -> Self {
            self.objects.lock().unwrap().insert(
                key.to_string(),
                StoredObject {
                    body: body.to_vec(),
                    last_modified,
                },
            );
            self
        }

        /// Make puts to keys containing `needle` fail
        pub fn with_failing_put(self, needle: &str) -> Self {
            self.failing_puts.lock().unwrap().push(needle.to_string());
            self
        }

        pub fn keys(&self) -> Vec<String> {
            self.objects.lock().unwrap().keys().cloned().collect()
        }

        pub fn object(&self, key: &str) -> Option<Vec<u8>> {
            self.objects.lock().unwrap().get(key).map(|o| o.body.clone())
        }

        pub fn get_calls(&self) -> Vec<StoreCall> {
            self.calls.lock().unwrap().clone()
        }

        pub fn put_count(&self) -> usize {
            self.get_calls()
                .iter()
                .filter(|c| matches!(c, StoreCall::Put { .. }))
                .count()
        }

        pub fn download_count(&self) -> usize {
            self.get_calls()
                .iter()
                .filter(|c| matches!(c, StoreCall::Download { .. }))
                .count()
        }

        fn record_call(&self, call: StoreCall) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl ObjectStore for MemoryStore {
        fn bucket(&self) -> &str {
            &self.bucket
        }

        async fn bucket_exists(&self) -> Result<bool> {
            self.record_call(StoreCall::BucketExists);
            Ok(self.bucket_present)
        }

        async fn object_exists(&self, key: &str) -> Result<bool> {
            self.record_call(StoreCall::ObjectExists { key: key.to_string() });
            Ok(self.objects.lock().unwrap().contains_key(key))
        }

        async fn put_file(&self, key: &str, source: &Path) -> Result<()> {
            self.record_call(StoreCall::Put { key: key.to_string() });
            if self
                .failing_puts
                .lock()
                .unwrap()
                .iter()
                .any(|n| key.contains(n.as_str()))
            {
                anyhow::bail!("Mock put failure for {}", key);
            }
            let body = std::fs::read(source)?;
            self.objects.lock().unwrap().insert(
                key.to_string(),
                StoredObject {
                    body,
                    last_modified: Utc::now(),
                },
            );
            Ok(())
        }

        async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectSummary>> {
            self.record_call(StoreCall::List { prefix: prefix.to_string() });
            Ok(self
                .objects
                .lock()
                .unwrap()
                .iter()
                .filter(|(key, _)| key.starts_with(prefix))
                .map(|(key, object)| ObjectSummary {
                    key: key.clone(),
                    last_modified: object.last_modified,
                    size: object.body.len() as u64,
                })
                .collect())
        }

        async fn download(&self, key: &str, destination: &Path) -> Result<()> {
            self.record_call(StoreCall::Download { key: key.to_string() });
            let body = self
                .objects
                .lock()
                .unwrap()
                .get(key)
                .map(|o| o.body.clone())
                .ok_or_else(|| anyhow::anyhow!("NoSuchKey: {}", key))?;
            tokio::fs::write(destination, body).await?;
            Ok(())
        }
    }
}
