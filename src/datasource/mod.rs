// restoretool/src/datasource/mod.rs
pub(crate) mod chain;
pub(crate) mod snapshot;

pub use chain::resolve_incremental_chain;
pub use snapshot::resolve_snapshot_directory;

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;
use std::str::FromStr;

use chrono::{DateTime, Utc};

/// Remote object listing for one datasource: key to last-modified instant.
pub type BackupListing = BTreeMap<String, DateTime<Utc>>;

/// The datasources we know how to restore. Each one lays out its remote
/// backups differently: InfluxDB as a chain of full plus incremental
/// tarballs, Cassandra as timestamped directories with one tarball per
/// keyspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSourceKind {
    InfluxDb,
    Cassandra,
}

impl DataSourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InfluxDb => "influxdb",
            Self::Cassandra => "cassandra",
        }
    }
}

impl fmt::Display for DataSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataSourceKind {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "influxdb" | "timeseries" => Ok(Self::InfluxDb),
            "cassandra" | "keyspace" => Ok(Self::Cassandra),
            other => Err(format!(
                "unknown datasource '{}'; expected one of influxdb, cassandra",
                other
            )),
        }
    }
}

/// The ordered set of remote keys needed for one full restore.
///
/// For an incremental chain the order is most-recent-first and the full
/// backup comes last; the consumer must restore the full backup before
/// merging increments. For snapshot directories the order carries no
/// meaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupSet {
    keys: Vec<String>,
    complete: bool,
}

impl BackupSet {
    pub fn new(keys: Vec<String>, complete: bool) -> Self {
        BackupSet { keys, complete }
    }

    /// False when the chain scan ran out of objects before finding a full
    /// backup; the set is then a best-effort prefix, not a complete chain.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.keys.iter()
    }
}

impl Index<usize> for BackupSet {
    type Output = String;

    fn index(&self, index: usize) -> &String {
        &self.keys[index]
    }
}
