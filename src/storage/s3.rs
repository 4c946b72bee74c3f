// restoretool/src/storage/s3.rs
use std::env;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use aws_sdk_s3 as s3;
use chrono::{DateTime, Utc};
use s3::config::Region;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::info;

use super::{StorageBackend, prepare_destination};
use crate::datasource::BackupListing;
use crate::errors::{AppError, Result};

const DEFAULT_REGION: &str = "us-east-1";

/// Backup storage on S3 or any S3-compatible service.
pub struct S3Backend {
    client: s3::Client,
    bucket: String,
}

impl S3Backend {
    /// Builds the client from `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`
    /// and `S3_BACKUP_BUCKET`, with `S3_ENDPOINT_URL` and `S3_REGION` as
    /// optional overrides for S3-compatible endpoints.
    pub async fn from_env() -> Result<Self> {
        let access_key_id = env::var("AWS_ACCESS_KEY_ID")?;
        let secret_access_key = env::var("AWS_SECRET_ACCESS_KEY")?;
        let bucket = env::var("S3_BACKUP_BUCKET")?;
        let region = env::var("S3_REGION").unwrap_or_else(|_| DEFAULT_REGION.to_string());

        let mut sdk_config = aws_config::defaults(s3::config::BehaviorVersion::latest())
            .region(Region::new(region))
            .credentials_provider(s3::config::Credentials::new(
                access_key_id,
                secret_access_key,
                None,     // session_token
                None,     // expiry
                "Static", // provider_name
            ));
        if let Ok(endpoint_url) = env::var("S3_ENDPOINT_URL") {
            sdk_config = sdk_config.endpoint_url(endpoint_url);
        }
        let sdk_config = sdk_config.load().await;

        Ok(S3Backend {
            client: s3::Client::new(&sdk_config),
            bucket,
        })
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    async fn list(&self, prefix: &str) -> Result<BackupListing> {
        let mut listing = BackupListing::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| {
                AppError::Storage(format!(
                    "failed to list s3://{}/{}: {}",
                    self.bucket, prefix, e
                ))
            })?;
            for object in page.contents() {
                let key = object.key().ok_or_else(|| {
                    AppError::Storage(format!(
                        "listing of s3://{}/{} returned an object without a key",
                        self.bucket, prefix
                    ))
                })?;
                let modified = object.last_modified().ok_or_else(|| {
                    AppError::Storage(format!("object {} has no last-modified timestamp", key))
                })?;
                let instant = DateTime::<Utc>::from_timestamp(
                    modified.secs(),
                    modified.subsec_nanos(),
                )
                .ok_or_else(|| {
                    AppError::Storage(format!("object {} has an out-of-range timestamp", key))
                })?;
                listing.insert(key.to_string(), instant);
            }
        }
        Ok(listing)
    }

    async fn download(&self, key: &str, local_root: &Path) -> Result<PathBuf> {
        // A prefix listing doubles as the exactly-one-object check: zero
        // matches means the backup is gone, several mean the key is
        // ambiguous and the set cannot be trusted.
        let matches = self.list(key).await?;
        if matches.is_empty() {
            return Err(AppError::NotFound(format!(
                "backup s3://{}/{} not found",
                self.bucket, key
            )));
        }
        if matches.len() > 1 {
            return Err(AppError::Storage(format!(
                "key s3://{}/{} is ambiguous: {} objects match",
                self.bucket,
                key,
                matches.len()
            )));
        }

        let destination = prepare_destination(local_root, key).await?;
        let mut output_file = File::create(&destination).await?;
        let mut object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                AppError::Storage(format!("failed to get s3://{}/{}: {}", self.bucket, key, e))
            })?;

        let mut total_bytes = 0usize;
        loop {
            let chunk = object.body.try_next().await.map_err(|e| {
                AppError::Storage(format!(
                    "transfer of s3://{}/{} failed after {} bytes: {}",
                    self.bucket, key, total_bytes, e
                ))
            })?;
            let Some(bytes_chunk) = chunk else { break };
            output_file.write_all(&bytes_chunk).await?;
            total_bytes += bytes_chunk.len();
        }
        output_file.flush().await?;

        info!("downloaded {} ({} bytes)", destination.display(), total_bytes);
        Ok(destination)
    }
}
