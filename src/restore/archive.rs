// restoretool/src/restore/archive.rs
use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::info;
use walkdir::WalkDir;

use crate::errors::{AppError, Result};

/// Extracts a GZipped TAR archive into `extract_to_dir`.
///
/// Existing files are overwritten so a rerun of the extraction phase is
/// harmless.
pub fn extract_tar_gz(archive_path: &Path, extract_to_dir: &Path) -> Result<()> {
    if !archive_path.is_file() {
        return Err(AppError::Restore(format!(
            "archive for extraction is not a file: {}",
            archive_path.display()
        )));
    }
    info!(
        "extracting {} to {}",
        archive_path.display(),
        extract_to_dir.display()
    );

    let archive_file = File::open(archive_path)?;
    let gz_decoder = flate2::read::GzDecoder::new(archive_file);
    let mut archive = tar::Archive::new(gz_decoder);
    archive.unpack(extract_to_dir).map_err(|e| {
        AppError::Restore(format!(
            "failed to unpack {} to {}: {}",
            archive_path.display(),
            extract_to_dir.display(),
            e
        ))
    })
}

/// All `*.tar.gz` files under `root`, sorted by path so incremental chains
/// extract in upload order.
pub fn tarballs_under(root: &Path) -> Result<Vec<PathBuf>> {
    let mut tarballs = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| {
            AppError::Restore(format!("failed to walk {}: {}", root.display(), e))
        })?;
        if entry.file_type().is_file()
            && entry.file_name().to_string_lossy().ends_with(".tar.gz")
        {
            tarballs.push(entry.into_path());
        }
    }
    tarballs.sort();
    Ok(tarballs)
}
