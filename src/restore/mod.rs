pub(crate) mod archive;   // tarball extraction
pub(crate) mod data;      // cassandra snapshot copy + refresh
pub(crate) mod decrypt;   // gpg collaborator
pub(crate) mod download;  // fetch + decrypt phase
pub(crate) mod keyspaces; // cassandra schema restore
pub(crate) mod manifest;  // KEYSPACES handoff file
pub(crate) mod timeseries; // influxdb chain restore

use std::fs;

use tracing::info;

use crate::config::RestoreConfig;
use crate::datasource::{
    BackupSet, DataSourceKind, resolve_incremental_chain, resolve_snapshot_directory,
};
use crate::errors::Result;
use crate::storage::{self, StorageBackend};

/// One restore invocation: the configured datasource, the storage backend
/// picked from the environment, and the remote listing taken at connect
/// time. Only the listing-dependent phases build one; the later phases work
/// off the local download directory alone.
pub struct RestoreSession<'a> {
    pub(crate) config: &'a RestoreConfig,
    pub(crate) backend: Box<dyn StorageBackend>,
    pub(crate) listing: crate::datasource::BackupListing,
}

impl<'a> RestoreSession<'a> {
    pub async fn connect(config: &'a RestoreConfig) -> Result<RestoreSession<'a>> {
        let backend = storage::backend_from_env().await?;
        let listing = backend.list(&config.remote_prefix).await?;
        info!(
            "{} backup objects listed under {}",
            listing.len(),
            config.remote_prefix
        );
        Ok(RestoreSession {
            config,
            backend,
            listing,
        })
    }

    /// Resolves the set of keys that make up the last complete backup.
    pub fn last_backup_set(&self) -> Result<BackupSet> {
        match self.config.kind {
            DataSourceKind::InfluxDb => Ok(resolve_incremental_chain(
                &self.listing,
                self.config.chain_window,
                &self.config.full_backup_suffix,
            )),
            DataSourceKind::Cassandra => {
                resolve_snapshot_directory(&self.listing, &self.config.keyspaces)
            }
        }
    }
}

/// Removes the download directory tree. Safe to run when nothing was
/// downloaded yet.
pub fn cleanup(config: &RestoreConfig) -> Result<()> {
    let backup_dir = config.backup_dir();
    if backup_dir.exists() {
        fs::remove_dir_all(&backup_dir)?;
    }
    info!("removed {}", backup_dir.display());
    Ok(())
}
