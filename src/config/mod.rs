// restoretool/src/config/mod.rs
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::datasource::DataSourceKind;
use crate::errors::{AppError, Result};

/// Schema files that must never be replayed into the cluster.
const DEFAULT_RESTRICTED_SCHEMA_FILES: &[&str] = &["schema-system_schema.cql"];

/// Rows restored may drift from the recorded counts while a cluster keeps
/// ingesting; these are the accepted relative deviations.
pub const LOW_ERROR_THRESHOLD: f64 = 0.05;
pub const HIGH_ERROR_THRESHOLD: f64 = 0.40;

const DEFAULT_CHAIN_WINDOW: usize = 20;
const DEFAULT_FULL_BACKUP_SUFFIX: &str = "-full.tar.gz.gpg";

/// Per-datasource section of `config.json`. Every field is optional and
/// overlays the built-in defaults for that datasource.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSourceConfig {
    pub data_dir: Option<PathBuf>,
    pub remote_prefix: Option<String>,
    pub chain_window: Option<usize>,
    pub full_backup_suffix: Option<String>,
    pub keyspaces: Option<Vec<String>>,
    pub restricted_schema_files: Option<Vec<String>>,
    pub high_volatility_tables: Option<Vec<String>>,
    pub low_tolerance: Option<f64>,
    pub high_tolerance: Option<f64>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    pub influxdb: Option<RawSourceConfig>,
    pub cassandra: Option<RawSourceConfig>,
}

/// Resolved settings for one restore invocation.
///
/// Collects everything that used to be scattered per-deployment (data
/// directories, hosts, ports, the keyspace list, tolerances) into one
/// structure handed to the restore phases at construction.
#[derive(Debug, Clone)]
pub struct RestoreConfig {
    pub kind: DataSourceKind,
    /// Root data directory of the database being restored.
    pub data_dir: PathBuf,
    /// Remote key prefix for this datasource; also the name of the download
    /// directory created under `data_dir`.
    pub remote_prefix: String,
    /// How many of the most recent objects to scan for a full backup.
    pub chain_window: usize,
    /// Key suffix marking a full (non-incremental) backup tarball.
    pub full_backup_suffix: String,
    /// Logical units expected in every snapshot-directory backup set.
    pub keyspaces: Vec<String>,
    pub restricted_schema_files: Vec<String>,
    pub high_volatility_tables: Vec<String>,
    pub low_tolerance: f64,
    pub high_tolerance: f64,
    pub host: String,
    pub port: u16,
}

impl RestoreConfig {
    /// Built-in defaults for a datasource kind.
    pub fn for_kind(kind: DataSourceKind) -> Self {
        let (data_dir, port) = match kind {
            DataSourceKind::InfluxDb => ("/var/lib/influxdb", 8086),
            DataSourceKind::Cassandra => ("/var/lib/cassandra", 9042),
        };
        RestoreConfig {
            kind,
            data_dir: PathBuf::from(data_dir),
            remote_prefix: format!("{}-data", kind.as_str()),
            chain_window: DEFAULT_CHAIN_WINDOW,
            full_backup_suffix: DEFAULT_FULL_BACKUP_SUFFIX.to_string(),
            keyspaces: Vec::new(),
            restricted_schema_files: DEFAULT_RESTRICTED_SCHEMA_FILES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            high_volatility_tables: Vec::new(),
            low_tolerance: LOW_ERROR_THRESHOLD,
            high_tolerance: HIGH_ERROR_THRESHOLD,
            host: "127.0.0.1".to_string(),
            port,
        }
    }

    /// Loads the configuration for `kind`, overlaying `config_path` (if it
    /// exists) onto the built-in defaults.
    pub fn load(kind: DataSourceKind, config_path: &Path) -> Result<Self> {
        let mut config = Self::for_kind(kind);
        if !config_path.exists() {
            return Ok(config);
        }

        let content = fs::read_to_string(config_path)?;
        let raw: RawConfigFile = serde_json::from_str(&content).map_err(|e| {
            AppError::Config(format!(
                "failed to parse {}: {}",
                config_path.display(),
                e
            ))
        })?;
        let section = match kind {
            DataSourceKind::InfluxDb => raw.influxdb,
            DataSourceKind::Cassandra => raw.cassandra,
        };
        if let Some(section) = section {
            config.apply(section);
        }
        Ok(config)
    }

    fn apply(&mut self, raw: RawSourceConfig) {
        if let Some(data_dir) = raw.data_dir {
            self.data_dir = data_dir;
        }
        if let Some(remote_prefix) = raw.remote_prefix {
            self.remote_prefix = remote_prefix;
        }
        if let Some(chain_window) = raw.chain_window {
            self.chain_window = chain_window;
        }
        if let Some(full_backup_suffix) = raw.full_backup_suffix {
            self.full_backup_suffix = full_backup_suffix;
        }
        if let Some(keyspaces) = raw.keyspaces {
            self.keyspaces = keyspaces;
        }
        if let Some(restricted) = raw.restricted_schema_files {
            self.restricted_schema_files = restricted;
        }
        if let Some(tables) = raw.high_volatility_tables {
            self.high_volatility_tables = tables;
        }
        if let Some(low) = raw.low_tolerance {
            self.low_tolerance = low;
        }
        if let Some(high) = raw.high_tolerance {
            self.high_tolerance = high;
        }
        if let Some(host) = raw.host {
            self.host = host;
        }
        if let Some(port) = raw.port {
            self.port = port;
        }
    }

    /// Directory the encrypted tarballs are downloaded into.
    pub fn backup_dir(&self) -> PathBuf {
        self.data_dir.join(&self.remote_prefix)
    }

    /// Manifest of keyspaces restored by the schema phase, consumed by the
    /// data-restore and verify phases.
    pub fn manifest_path(&self) -> PathBuf {
        self.backup_dir().join("KEYSPACES")
    }

    /// Expected row counts recorded at backup time for one keyspace.
    pub fn stats_path(&self, keyspace: &str) -> PathBuf {
        self.backup_dir().join(format!("{}.stats", keyspace))
    }

    /// Live table directories of the running database.
    pub fn live_data_dir(&self) -> PathBuf {
        self.data_dir.join("data")
    }

    /// Tolerance applied to a table during verification.
    pub fn tolerance_for(&self, table: &str) -> f64 {
        if self.high_volatility_tables.iter().any(|t| t == table) {
            self.high_tolerance
        } else {
            self.low_tolerance
        }
    }
}
