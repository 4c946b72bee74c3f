// restoretool/src/datasource/chain.rs
use tracing::warn;

use super::{BackupListing, BackupSet};

/// Resolves the last complete backup set of a full-plus-incrementals chain.
///
/// The listing is sorted by modification time, the most recent `window`
/// objects are scanned newest-first, and every key up to and including the
/// first full-backup marker belongs to the set. Incrementals taken after the
/// full backup must be applied on top of it, so the result is ordered
/// most-recent-first with the full backup last.
///
/// If no full backup appears within the window the entire scanned window is
/// returned with the set marked incomplete; restoring from it recovers only
/// the increments, never the base.
pub fn resolve_incremental_chain(
    listing: &BackupListing,
    window: usize,
    full_backup_suffix: &str,
) -> BackupSet {
    let mut objects: Vec<(&String, _)> = listing.iter().collect();
    // Ties on the timestamp are broken by key so the scan is deterministic.
    objects.sort_by(|a, b| a.1.cmp(b.1).then_with(|| a.0.cmp(b.0)));
    let window_start = objects.len().saturating_sub(window);

    let mut keys = Vec::new();
    let mut complete = false;
    for (key, _) in objects[window_start..].iter().rev() {
        keys.push((*key).clone());
        if key.ends_with(full_backup_suffix) {
            complete = true;
            break;
        }
    }
    if !complete {
        warn!(
            "no full backup found in the last {} objects; returning a partial chain of {} keys",
            window,
            keys.len()
        );
    }
    BackupSet::new(keys, complete)
}
