// restoretool/src/restore/data.rs
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::manifest;
use crate::config::RestoreConfig;
use crate::errors::{AppError, Result};
use crate::utils::process::run_command;

/// Restored alongside every manifest keyspace; cqlsh recreates it but its
/// snapshots still need to be copied back.
const IMPLICIT_KEYSPACE: &str = "system_schema";

/// Snapshot directories created by the backup job carry this prefix.
const SNAPSHOT_DIR_PREFIX: &str = "backup-";

/// Copies snapshot files back into the live table directories.
///
/// Precondition: the keyspace manifest from the schema phase exists. Live
/// table directories carry a suffix generated at schema-creation time, so
/// each backup table resolves to its live directory by name prefix.
pub fn restore_data(config: &RestoreConfig) -> Result<()> {
    let units = {
        let mut units = manifest::read_units(&config.manifest_path())?;
        units.push(IMPLICIT_KEYSPACE.to_string());
        units
    };
    info!("restoring data for {}", units.join(","));

    let backup_dir = config.backup_dir();
    for keyspace in &units {
        let keyspace_dir = backup_dir.join(keyspace);
        if !keyspace_dir.is_dir() {
            debug!("no snapshots for {} in the download directory", keyspace);
            continue;
        }
        for table_dir in subdirectories(&keyspace_dir)? {
            let table_name = table_name_of(&table_dir)?;
            let snapshots_dir = table_dir.join("snapshots");
            if !snapshots_dir.is_dir() {
                continue;
            }
            for snapshot_dir in subdirectories(&snapshots_dir)? {
                let is_backup = snapshot_dir
                    .file_name()
                    .map(|n| n.to_string_lossy().starts_with(SNAPSHOT_DIR_PREFIX))
                    .unwrap_or(false);
                if !is_backup {
                    continue;
                }
                let live_table_dir =
                    resolve_live_table_dir(&config.live_data_dir().join(keyspace), &table_name)?;
                info!("restoring {}/{} data", keyspace, table_name);
                copy_regular_files(&snapshot_dir, &live_table_dir)?;
            }
        }
    }
    info!("restoring data done");
    Ok(())
}

/// Clears the system keyspace directory and triggers a node repair so the
/// restored replica rebuilds its view of the cluster.
pub fn refresh(config: &RestoreConfig) -> Result<()> {
    info!("refreshing data");
    let system_dir = config.live_data_dir().join("system");
    if system_dir.exists() {
        fs::remove_dir_all(&system_dir)?;
    }
    fs::create_dir_all(&system_dir)?;
    run_command("nodetool", &["repair"])?;
    Ok(())
}

fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Backup table directories are named `<table>-<id>`.
fn table_name_of(table_dir: &Path) -> Result<String> {
    let name = table_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| {
            AppError::Format(format!(
                "table directory {} has no name",
                table_dir.display()
            ))
        })?;
    Ok(name.split('-').next().unwrap_or(&name).to_string())
}

/// Finds the live directory of a table by name prefix; the suffix is a
/// runtime-generated id that differs from the one recorded in the backup.
fn resolve_live_table_dir(keyspace_dir: &Path, table_name: &str) -> Result<PathBuf> {
    let prefix = format!("{}-", table_name);
    for candidate in subdirectories(keyspace_dir)? {
        if candidate
            .file_name()
            .map(|n| n.to_string_lossy().starts_with(&prefix))
            .unwrap_or(false)
        {
            return Ok(candidate);
        }
    }
    Err(AppError::Restore(format!(
        "no live table directory for {} under {}",
        table_name,
        keyspace_dir.display()
    )))
}

fn copy_regular_files(from: &Path, to: &Path) -> Result<()> {
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let destination = to.join(entry.file_name());
        fs::copy(entry.path(), &destination)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::DataSourceKind;

    fn config_in(dir: &Path) -> RestoreConfig {
        let mut config = RestoreConfig::for_kind(DataSourceKind::Cassandra);
        config.data_dir = dir.to_path_buf();
        config
    }

    #[test]
    fn test_restore_data_without_manifest_fails_without_mutation() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let config = config_in(dir.path());

        let result = restore_data(&config);
        assert!(matches!(result, Err(AppError::Restore(_))));
        // nothing was created under the data directory
        assert_eq!(fs::read_dir(dir.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn test_restore_data_copies_snapshot_files() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let config = config_in(dir.path());

        // backup side: cassandra-data/purusdb/dev_cf-abc/snapshots/backup-1/x.db
        let snapshot_dir = config
            .backup_dir()
            .join("purusdb/dev_cf-abc/snapshots/backup-1");
        fs::create_dir_all(&snapshot_dir)?;
        fs::write(snapshot_dir.join("x.db"), b"sstable")?;
        manifest::append_unit(&config.manifest_path(), "purusdb")?;

        // live side: data/purusdb/dev_cf-<other id>
        let live_table = config.live_data_dir().join("purusdb/dev_cf-runtime42");
        fs::create_dir_all(&live_table)?;

        restore_data(&config)?;
        assert_eq!(fs::read(live_table.join("x.db"))?, b"sstable");
        Ok(())
    }

    #[test]
    fn test_restore_data_missing_live_table_dir_is_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let config = config_in(dir.path());

        let snapshot_dir = config
            .backup_dir()
            .join("purusdb/dev_cf-abc/snapshots/backup-1");
        fs::create_dir_all(&snapshot_dir)?;
        manifest::append_unit(&config.manifest_path(), "purusdb")?;
        fs::create_dir_all(config.live_data_dir().join("purusdb"))?;

        let result = restore_data(&config);
        assert!(matches!(result, Err(AppError::Restore(_))));
        Ok(())
    }

    #[test]
    fn test_table_name_of() -> anyhow::Result<()> {
        assert_eq!(
            table_name_of(Path::new("/b/purusdb/dev_cf-1a2b3c"))?,
            "dev_cf"
        );
        Ok(())
    }

    #[test]
    fn test_resolve_live_table_dir_by_prefix() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        fs::create_dir(dir.path().join("dev_cf-runtime42"))?;
        fs::create_dir(dir.path().join("device_cf-runtime43"))?;

        let resolved = resolve_live_table_dir(dir.path(), "dev_cf")?;
        assert_eq!(resolved, dir.path().join("dev_cf-runtime42"));
        Ok(())
    }
}
