// restoretool/src/restore/timeseries.rs
use std::env;
use std::fs;
use std::path::Path;

use tracing::{info, warn};

use super::archive;
use crate::config::RestoreConfig;
use crate::errors::{AppError, Result};
use crate::utils::process::run_command;

/// Extracted backup directories end in one of these, matching the tarball
/// naming convention.
const FULL_DIR_SUFFIX: &str = "-full";
const INCREMENTAL_DIR_SUFFIX: &str = "-inc";

/// The engine reports these while shards are settling after a restore; the
/// merge is complete despite them.
const BENIGN_MERGE_ERRORS: &[&str] = &[
    "shard is disabled",
    "engine is closed",
    "query engine shutdown",
];

fn influx_credentials() -> Result<(String, String)> {
    let username = env::var("INFLUXDB_ADMIN_USER")
        .map_err(|_| AppError::Config("INFLUXDB_ADMIN_USER must be set".to_string()))?;
    let password = env::var("INFLUXDB_ADMIN_PASSWORD")
        .map_err(|_| AppError::Config("INFLUXDB_ADMIN_PASSWORD must be set".to_string()))?;
    Ok((username, password))
}

/// Replays a downloaded chain of time-series backups.
///
/// Existing databases are dropped, then the tarballs are extracted and
/// applied oldest-first: the full backup loads through the restore utility,
/// and every incremental restores into a scratch database that is merged
/// into its target and dropped.
pub fn restore_data(config: &RestoreConfig) -> Result<()> {
    let (username, password) = influx_credentials()?;
    let backup_dir = config.backup_dir();
    if !backup_dir.is_dir() {
        return Err(AppError::Restore(format!(
            "download directory {} does not exist; run download first",
            backup_dir.display()
        )));
    }

    for database in list_databases(config, &username, &password)? {
        info!("dropping {}", database);
        run_query(
            config,
            &username,
            &password,
            None,
            &format!("DROP DATABASE \"{}\"", database),
        )?;
    }

    let mut databases: Vec<String> = Vec::new();
    for tarball in archive::tarballs_under(&backup_dir)? {
        archive::extract_tar_gz(&tarball, &backup_dir)?;
        let dir_name = tarball
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix(".tar.gz"))
            .ok_or_else(|| {
                AppError::Format(format!("unexpected tarball name: {}", tarball.display()))
            })?
            .to_string();
        let extracted = backup_dir.join(&dir_name);

        if dir_name.ends_with(FULL_DIR_SUFFIX) {
            info!("restoring full backup {}", dir_name);
            run_command(
                "influxd",
                &["restore", "-portable", &extracted.to_string_lossy()],
            )?;
            databases = list_databases(config, &username, &password)?;
            info!("databases: {}", databases.join(","));
        } else if dir_name.ends_with(INCREMENTAL_DIR_SUFFIX) {
            info!("merging incremental backup {}", dir_name);
            for database in &databases {
                merge_incremental(config, &username, &password, database, &extracted)?;
            }
        } else {
            warn!("skipping unrecognized backup directory {}", dir_name);
        }
        fs::remove_file(&tarball)?;
    }
    Ok(())
}

/// Restores one incremental backup into a scratch database, merges it into
/// the target and drops the scratch.
fn merge_incremental(
    config: &RestoreConfig,
    username: &str,
    password: &str,
    database: &str,
    extracted: &Path,
) -> Result<()> {
    let scratch = format!("{}_inc", database);
    run_command(
        "influxd",
        &[
            "restore",
            "-db",
            database,
            "-newdb",
            &scratch,
            "-portable",
            &extracted.to_string_lossy(),
        ],
    )?;

    let merge = format!(
        "SELECT * INTO {}..:MEASUREMENT FROM /.*/ GROUP BY *",
        database
    );
    match run_query(config, username, password, Some(&scratch), &merge) {
        Ok(_) => {}
        Err(AppError::Process { command, detail })
            if BENIGN_MERGE_ERRORS.iter().any(|e| detail.contains(e)) =>
        {
            info!("ignoring error from {}: {}", command, detail);
        }
        Err(e) => return Err(e),
    }

    run_query(
        config,
        username,
        password,
        None,
        &format!("DROP DATABASE \"{}\"", scratch),
    )?;
    Ok(())
}

/// Runs one query through the CLI client in CSV mode.
fn run_query(
    config: &RestoreConfig,
    username: &str,
    password: &str,
    database: Option<&str>,
    query: &str,
) -> Result<String> {
    let port = config.port.to_string();
    let mut args: Vec<&str> = vec![
        "-ssl",
        "-unsafeSsl",
        "-host",
        config.host.as_str(),
        "-port",
        port.as_str(),
        "-username",
        username,
        "-password",
        password,
        "-format",
        "csv",
    ];
    if let Some(database) = database {
        args.push("-database");
        args.push(database);
    }
    args.push("-execute");
    args.push(query);
    let output = run_command("influx", &args)?;
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

fn list_databases(config: &RestoreConfig, username: &str, password: &str) -> Result<Vec<String>> {
    let output = run_query(config, username, password, None, "SHOW DATABASES")?;
    Ok(parse_database_csv(&output))
}

/// CSV output of SHOW DATABASES: a `name,tags,name` style header followed
/// by one `databases,<name>` row per database. The internal bookkeeping
/// database is never restored.
fn parse_database_csv(output: &str) -> Vec<String> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| line.split(',').nth(1))
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != "_internal")
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_database_csv() {
        let output = "name,name\ndatabases,_internal\ndatabases,gangesdb\ndatabases,purusdb\n";
        assert_eq!(parse_database_csv(output), vec!["gangesdb", "purusdb"]);
    }

    #[test]
    fn test_parse_database_csv_empty() {
        assert!(parse_database_csv("name,name\n").is_empty());
        assert!(parse_database_csv("").is_empty());
    }

    #[test]
    fn test_missing_download_dir_is_restore_error() {
        // credentials must be present to reach the directory check
        unsafe {
            env::set_var("INFLUXDB_ADMIN_USER", "admin");
            env::set_var("INFLUXDB_ADMIN_PASSWORD", "secret");
        }
        let mut config =
            RestoreConfig::for_kind(crate::datasource::DataSourceKind::InfluxDb);
        config.data_dir = std::path::PathBuf::from("/nonexistent");
        let result = restore_data(&config);
        assert!(matches!(result, Err(AppError::Restore(_))));
    }
}
