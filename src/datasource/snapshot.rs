// restoretool/src/datasource/snapshot.rs
use chrono::NaiveDateTime;

use super::{BackupListing, BackupSet};
use crate::errors::{AppError, Result};

/// Directory names are stamped by the backup job in this fixed format.
const DIRECTORY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Resolves the last backup set of a snapshot-directory layout.
///
/// Every object key is `<prefix>/<timestamp>/<keyspace>.tar.gz.gpg`. The
/// directory with the greatest parsed timestamp is the last backup set, and
/// the result contains one key per configured keyspace under that directory.
/// Keyspaces missing from the remote directory are still included: the
/// download phase must fail on them rather than silently restore less than
/// the configured topology.
pub fn resolve_snapshot_directory(listing: &BackupListing, keyspaces: &[String]) -> Result<BackupSet> {
    if keyspaces.is_empty() {
        return Err(AppError::Config(
            "keyspace list is empty; configure the keyspaces expected in each backup set".to_string(),
        ));
    }
    if listing.is_empty() {
        return Err(AppError::NotFound(
            "no backup objects found under the configured prefix".to_string(),
        ));
    }

    let mut last: Option<(NaiveDateTime, &str)> = None;
    for key in listing.keys() {
        let (dirname, _) = key.rsplit_once('/').ok_or_else(|| {
            AppError::Format(format!("backup key '{}' has no directory component", key))
        })?;
        let stamp_segment = dirname.rsplit('/').next().unwrap_or(dirname);
        let stamp = NaiveDateTime::parse_from_str(stamp_segment, DIRECTORY_TIMESTAMP_FORMAT)
            .map_err(|e| {
                AppError::Format(format!(
                    "cannot parse backup directory '{}' as a timestamp: {}",
                    dirname, e
                ))
            })?;
        if last.map_or(true, |(latest, _)| stamp > latest) {
            last = Some((stamp, dirname));
        }
    }

    // listing is non-empty, so a latest directory exists by now
    let (_, dirname) = last.ok_or_else(|| {
        AppError::NotFound("no backup directories found in the listing".to_string())
    })?;
    let keys = keyspaces
        .iter()
        .map(|keyspace| format!("{}/{}.tar.gz.gpg", dirname, keyspace))
        .collect();
    Ok(BackupSet::new(keys, true))
}
