// restoretool/src/restore/keyspaces.rs
use std::env;
use std::fs;
use std::path::Path;

use regex::Regex;
use tracing::{debug, info};

use super::{archive, manifest};
use crate::config::RestoreConfig;
use crate::errors::{AppError, Result};
use crate::utils::process::run_command;

/// Schema artifacts inside the tarballs are named `schema-<keyspace>.cql`.
const SCHEMA_FILE_PATTERN: &str = r"^schema-\w+\.cql$";

fn cassandra_credentials() -> Result<(String, String)> {
    let username = env::var("CASSANDRA_USERNAME")
        .map_err(|_| AppError::Config("CASSANDRA_USERNAME must be set".to_string()))?;
    let password = env::var("CASSANDRA_PASSWORD")
        .map_err(|_| AppError::Config("CASSANDRA_PASSWORD must be set".to_string()))?;
    Ok((username, password))
}

/// Extracts the downloaded tarballs and replays every keyspace schema
/// through cqlsh, building the keyspace manifest as it goes.
///
/// A keyspace enters the manifest only after its schema loaded
/// successfully, so a rerun after a partial failure rebuilds the manifest
/// from scratch and never hands a half-restored keyspace to the data phase.
pub fn restore_keyspaces(config: &RestoreConfig) -> Result<Vec<String>> {
    info!("restoring keyspaces");
    let backup_dir = config.backup_dir();
    if !backup_dir.is_dir() {
        return Err(AppError::Restore(format!(
            "download directory {} does not exist; run download first",
            backup_dir.display()
        )));
    }
    let (username, password) = cassandra_credentials()?;

    // Stale manifests from a previous attempt would mix restored sets.
    let manifest_path = config.manifest_path();
    if manifest_path.exists() {
        fs::remove_file(&manifest_path)?;
    }

    for tarball in archive::tarballs_under(&backup_dir)? {
        archive::extract_tar_gz(&tarball, &backup_dir)?;
    }
    info!("untarring completed");

    let schema_pattern = Regex::new(SCHEMA_FILE_PATTERN)
        .map_err(|e| AppError::Format(format!("invalid schema file pattern: {}", e)))?;
    let mut restored = Vec::new();
    let mut schema_files = schema_files_under(&backup_dir)?;
    schema_files.sort();
    for file_name in schema_files {
        if !schema_pattern.is_match(&file_name)
            || config.restricted_schema_files.iter().any(|f| f == &file_name)
        {
            debug!("skipping schema file {}", file_name);
            continue;
        }
        let keyspace = keyspace_of(&file_name);
        info!("restoring schema from {}", file_name);
        let schema_path = backup_dir.join(&file_name);
        run_command(
            "cqlsh",
            &[
                "-u",
                &username,
                "-p",
                &password,
                "-f",
                &schema_path.to_string_lossy(),
            ],
        )?;
        manifest::append_unit(&manifest_path, &keyspace)?;
        restored.push(keyspace);
    }
    info!("keyspaces restored: {}", restored.join(","));
    Ok(restored)
}

/// File names of the schema artifacts sitting at the top of the download
/// directory after extraction.
fn schema_files_under(backup_dir: &Path) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(backup_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with("schema-") && name.ends_with(".cql") {
            files.push(name);
        }
    }
    Ok(files)
}

fn keyspace_of(schema_file: &str) -> String {
    schema_file
        .strip_prefix("schema-")
        .and_then(|name| name.strip_suffix(".cql"))
        .unwrap_or(schema_file)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyspace_of() {
        assert_eq!(keyspace_of("schema-purusdb.cql"), "purusdb");
        assert_eq!(keyspace_of("schema-system_schema.cql"), "system_schema");
    }

    #[test]
    fn test_schema_pattern_accepts_word_names_only() {
        let pattern = Regex::new(SCHEMA_FILE_PATTERN).unwrap();
        assert!(pattern.is_match("schema-purusdb.cql"));
        assert!(pattern.is_match("schema-system_schema.cql"));
        assert!(!pattern.is_match("schema-bad.name.cql"));
        assert!(!pattern.is_match("purusdb.cql"));
        assert!(!pattern.is_match("schema-purusdb.cql.bak"));
    }

    #[test]
    fn test_schema_files_under_ignores_directories_and_others() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("schema-purusdb.cql"), "")?;
        fs::write(dir.path().join("purusdb.stats"), "")?;
        fs::create_dir(dir.path().join("schema-fake.cql"))?;

        let files = schema_files_under(dir.path())?;
        assert_eq!(files, vec!["schema-purusdb.cql"]);
        Ok(())
    }

    #[test]
    fn test_missing_download_dir_is_restore_error() {
        let mut config = RestoreConfig::for_kind(crate::datasource::DataSourceKind::Cassandra);
        config.data_dir = std::path::PathBuf::from("/nonexistent");
        let result = restore_keyspaces(&config);
        assert!(matches!(result, Err(AppError::Restore(_))));
    }
}
