// restoretool/src/storage/azure.rs
use std::env;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use azure_storage::StorageCredentials;
use azure_storage_blobs::prelude::*;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tracing::info;

use super::{StorageBackend, prepare_destination};
use crate::datasource::BackupListing;
use crate::errors::{AppError, Result};

/// Backup storage on an Azure Blob container.
pub struct AzureBlobBackend {
    container: ContainerClient,
    container_name: String,
}

impl AzureBlobBackend {
    /// Builds the client from `AZURE_STORAGE_ACCOUNT`,
    /// `AZURE_STORAGE_ACCESS_KEY` and `AZURE_BLOB_BACKUP_CONTAINER`.
    pub fn from_env() -> Result<Self> {
        let account = env::var("AZURE_STORAGE_ACCOUNT")?;
        let access_key = env::var("AZURE_STORAGE_ACCESS_KEY")?;
        let container_name = env::var("AZURE_BLOB_BACKUP_CONTAINER")?;

        let credentials = StorageCredentials::access_key(account.clone(), access_key);
        let container = BlobServiceClient::new(account, credentials)
            .container_client(container_name.clone());
        Ok(AzureBlobBackend {
            container,
            container_name,
        })
    }
}

#[async_trait]
impl StorageBackend for AzureBlobBackend {
    async fn list(&self, prefix: &str) -> Result<BackupListing> {
        let mut listing = BackupListing::new();
        let mut pages = self
            .container
            .list_blobs()
            .prefix(prefix.to_string())
            .into_stream();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| {
                AppError::Storage(format!(
                    "failed to list blobs under {}/{}: {}",
                    self.container_name, prefix, e
                ))
            })?;
            for blob in page.blobs.blobs() {
                let modified = blob.properties.last_modified;
                let instant = DateTime::<Utc>::from_timestamp(
                    modified.unix_timestamp(),
                    modified.nanosecond(),
                )
                .ok_or_else(|| {
                    AppError::Storage(format!(
                        "blob {} has an out-of-range timestamp",
                        blob.name
                    ))
                })?;
                listing.insert(blob.name.clone(), instant);
            }
        }
        Ok(listing)
    }

    async fn download(&self, key: &str, local_root: &Path) -> Result<PathBuf> {
        // Same exactly-one-object contract as the S3 backend.
        let matches = self.list(key).await?;
        if matches.is_empty() {
            return Err(AppError::NotFound(format!(
                "backup {}/{} not found",
                self.container_name, key
            )));
        }
        if matches.len() > 1 {
            return Err(AppError::Storage(format!(
                "key {}/{} is ambiguous: {} blobs match",
                self.container_name,
                key,
                matches.len()
            )));
        }

        let content = self
            .container
            .blob_client(key)
            .get_content()
            .await
            .map_err(|e| {
                AppError::Storage(format!(
                    "failed to download {}/{}: {}",
                    self.container_name, key, e
                ))
            })?;
        let destination = prepare_destination(local_root, key).await?;
        tokio::fs::write(&destination, &content).await?;

        info!("downloaded {} ({} bytes)", destination.display(), content.len());
        Ok(destination)
    }
}
