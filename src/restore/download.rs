// restoretool/src/restore/download.rs
use std::path::PathBuf;

use tracing::{info, warn};

use super::{RestoreSession, decrypt};
use crate::errors::Result;

/// Downloads and decrypts every key of the last backup set.
///
/// Each key is fetched and decrypted before the next one; the first failure
/// aborts the phase. Rerunning re-fetches and overwrites the whole set, so
/// the caller never needs to know which keys a previous run got through.
pub async fn download_last_backup(session: &RestoreSession<'_>) -> Result<Vec<PathBuf>> {
    let set = session.last_backup_set()?;
    if !set.is_complete() {
        warn!(
            "backup chain is incomplete; restoring these {} objects recovers increments without a base",
            set.len()
        );
    }

    let mut decrypted = Vec::with_capacity(set.len());
    for key in set.iter() {
        let encrypted = session
            .backend
            .download(key, &session.config.data_dir)
            .await?;
        decrypted.push(decrypt::decrypt_file(&encrypted)?);
    }
    info!("downloaded and decrypted {} tarballs", decrypted.len());
    Ok(decrypted)
}
