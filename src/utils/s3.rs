//! S3-backed archive store

use super::store_ops::{ObjectStore, ObjectSummary};
use crate::config::StorageConfig;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::{debug, info};

/// S3 client bound to one bucket
pub struct S3Store {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Store {
    /// Build a client for the configured bucket and region.
    /// Credentials come from the default AWS provider chain.
    pub async fn connect(storage: &StorageConfig, bucket: &str, region: &str) -> Result<Self> {
        let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(ref endpoint) = storage.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        let client = aws_sdk_s3::Client::from_conf(builder.build());

        info!(
            "S3 client initialized: bucket={}, region={}{}",
            bucket,
            region,
            storage
                .endpoint_url
                .as_deref()
                .map(|e| format!(", endpoint={}", e))
                .unwrap_or_default()
        );

        Ok(Self {
            client,
            bucket: bucket.to_string(),
        })
    }
}

fn to_chrono(value: Option<&aws_sdk_s3::primitives::DateTime>) -> DateTime<Utc> {
    value
        .and_then(|dt| DateTime::from_timestamp(dt.secs(), dt.subsec_nanos()))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[async_trait]
impl ObjectStore for S3Store {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn bucket_exists(&self) -> Result<bool> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                if err
                    .as_service_error()
                    .map(|e| e.is_not_found())
                    .unwrap_or(false)
                {
                    return Ok(false);
                }
                Err(anyhow!(err)).with_context(|| format!("Failed to check bucket {}", self.bucket))
            }
        }
    }

    async fn object_exists(&self, key: &str) -> Result<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) => {
                if err
                    .as_service_error()
                    .map(|e| e.is_not_found())
                    .unwrap_or(false)
                {
                    return Ok(false);
                }
                Err(anyhow!(err)).with_context(|| format!("Failed to check object {}", key))
            }
        }
    }

    async fn put_file(&self, key: &str, source: &Path) -> Result<()> {
        let body = ByteStream::from_path(source)
            .await
            .with_context(|| format!("Failed to open {:?}", source))?;
        let len = body.size_hint().1.unwrap_or_default();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .with_context(|| format!("Failed to upload s3://{}/{}", self.bucket, key))?;

        debug!("Upload successful: {} ({} bytes)", key, len);
        Ok(())
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectSummary>> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut objects = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.with_context(|| format!("Failed to list objects under {}", prefix))?;
            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                objects.push(ObjectSummary {
                    key: key.to_string(),
                    last_modified: to_chrono(object.last_modified()),
                    size: object.size().unwrap_or_default().max(0) as u64,
                });
            }
        }

        Ok(objects)
    }

    async fn download(&self, key: &str, destination: &Path) -> Result<()> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("Failed to download s3://{}/{}", self.bucket, key))?;

        let mut body = output.body.into_async_read();
        let mut file = tokio::fs::File::create(destination)
            .await
            .with_context(|| format!("Failed to create {:?}", destination))?;

        tokio::io::copy(&mut body, &mut file)
            .await
            .context("Failed to write downloaded file")?;

        debug!("Downloaded {} to {}", key, destination.display());
        Ok(())
    }
}
