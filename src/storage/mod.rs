// restoretool/src/storage/mod.rs
pub(crate) mod azure;
pub(crate) mod s3;

use std::env;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::datasource::BackupListing;
use crate::errors::{AppError, Result};

pub use azure::AzureBlobBackend;
pub use s3::S3Backend;

const AWS_VARS: &[&str] = &["AWS_ACCESS_KEY_ID", "AWS_SECRET_ACCESS_KEY", "S3_BACKUP_BUCKET"];
const AZURE_VARS: &[&str] = &[
    "AZURE_STORAGE_ACCOUNT",
    "AZURE_STORAGE_ACCESS_KEY",
    "AZURE_BLOB_BACKUP_CONTAINER",
];

/// Uniform access to the remote object store holding the backups.
///
/// Both implementations share one contract: `list` maps keys under a prefix
/// to their last-modified instants, and `download` fetches exactly one
/// object. A key matching zero or several remote objects is an integrity
/// error, never something to resolve silently.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn list(&self, prefix: &str) -> Result<BackupListing>;

    /// Downloads `key` to `local_root/key`, creating any missing parent
    /// directories. A transfer failure surfaces as an error; a truncated
    /// local file is never reported as success.
    async fn download(&self, key: &str, local_root: &Path) -> Result<PathBuf>;
}

/// Picks the storage backend from whichever credential set the environment
/// provides, AWS checked first.
pub async fn backend_from_env() -> Result<Box<dyn StorageBackend>> {
    if all_present(AWS_VARS) {
        return Ok(Box::new(S3Backend::from_env().await?));
    }
    if all_present(AZURE_VARS) {
        return Ok(Box::new(AzureBlobBackend::from_env()?));
    }
    Err(AppError::Config(format!(
        "unknown backup strategy: set either {} or {}",
        AWS_VARS.join(", "),
        AZURE_VARS.join(", ")
    )))
}

fn all_present(vars: &[&str]) -> bool {
    vars.iter().all(|var| env::var(var).is_ok())
}

/// Destination path for a downloaded key, with parent directories created.
pub(crate) async fn prepare_destination(local_root: &Path, key: &str) -> Result<PathBuf> {
    let destination = local_root.join(key);
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(destination)
}
