// restoretool/src/verify/mod.rs
use std::env;
use std::fs;

use tracing::info;

use crate::config::RestoreConfig;
use crate::errors::{AppError, Result};
use crate::restore::manifest;
use crate::utils::process::run_command;

/// Expected row count of one table, recorded at backup time in the
/// keyspace's `.stats` artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableStats {
    pub table: String,
    pub expected_rows: u64,
}

/// Outcome of one table's row-count comparison.
#[derive(Debug, Clone)]
pub struct TableCheck {
    pub table: String,
    pub expected: u64,
    pub actual: u64,
    pub within_tolerance: bool,
}

/// Everything the verify phase measured. Drift outside tolerance lives
/// here as data for the caller to report; it never fails the phase.
#[derive(Debug, Default)]
pub struct VerificationReport {
    pub checks: Vec<TableCheck>,
}

impl VerificationReport {
    pub fn mismatches(&self) -> impl Iterator<Item = &TableCheck> {
        self.checks.iter().filter(|check| !check.within_tolerance)
    }

    pub fn all_within_tolerance(&self) -> bool {
        self.checks.iter().all(|check| check.within_tolerance)
    }
}

/// The query-execution seam of verification. A counting failure is fatal
/// for the phase; a count that merely disagrees with the stats is not.
pub trait RowCounter {
    fn count_rows(&self, table: &str) -> Result<u64>;
}

/// Counts rows through the cluster's own shell client.
pub struct CqlshRowCounter {
    host: String,
    port: String,
    username: String,
    password: String,
}

impl CqlshRowCounter {
    pub fn from_env(config: &RestoreConfig) -> Result<Self> {
        let username = env::var("CASSANDRA_USERNAME")
            .map_err(|_| AppError::Config("CASSANDRA_USERNAME must be set".to_string()))?;
        let password = env::var("CASSANDRA_PASSWORD")
            .map_err(|_| AppError::Config("CASSANDRA_PASSWORD must be set".to_string()))?;
        Ok(CqlshRowCounter {
            host: config.host.clone(),
            port: config.port.to_string(),
            username,
            password,
        })
    }
}

impl RowCounter for CqlshRowCounter {
    fn count_rows(&self, table: &str) -> Result<u64> {
        let query = format!("SELECT COUNT(*) FROM {};", table);
        let output = run_command(
            "cqlsh",
            &[
                "-u",
                &self.username,
                "-p",
                &self.password,
                "-e",
                &query,
                &self.host,
                &self.port,
            ],
        )?;
        parse_count_output(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
            AppError::Format(format!("could not parse a row count for {}", table))
        })
    }
}

/// First integer in the client's tabular output is the count.
fn parse_count_output(output: &str) -> Option<u64> {
    output.lines().find_map(|line| line.trim().parse().ok())
}

/// Whether the restored row count is close enough to the recorded one.
///
/// High-volatility tables keep changing between the stats snapshot and the
/// restore, so they get a wider band.
pub fn row_count_ok(config: &RestoreConfig, table: &str, expected: u64, actual: u64) -> bool {
    let tolerance = config.tolerance_for(table);
    let deviation = (actual as f64 - expected as f64).abs();
    deviation <= expected as f64 * tolerance
}

/// Parses a `.stats` artifact: one `<table> <expected-rows>` pair per line.
pub fn parse_stats(content: &str) -> Result<Vec<TableStats>> {
    let mut stats = Vec::new();
    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split_whitespace();
        let (Some(table), Some(rows), None) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(AppError::Format(format!("malformed stats line: '{}'", line)));
        };
        let expected_rows = rows.parse().map_err(|_| {
            AppError::Format(format!("malformed row count in stats line: '{}'", line))
        })?;
        stats.push(TableStats {
            table: table.to_string(),
            expected_rows,
        });
    }
    Ok(stats)
}

/// Compares restored row counts against the per-keyspace stats artifacts.
///
/// Preconditions: the keyspace manifest and the stats artifacts exist. The
/// report carries every comparison; only a failing count query aborts.
pub fn verify_data(config: &RestoreConfig, counter: &dyn RowCounter) -> Result<VerificationReport> {
    let keyspaces = manifest::read_units(&config.manifest_path())?;
    info!("verifying data for {}", keyspaces.join(","));

    let mut report = VerificationReport::default();
    for keyspace in &keyspaces {
        let stats_path = config.stats_path(keyspace);
        let content = fs::read_to_string(&stats_path).map_err(|e| {
            AppError::Restore(format!(
                "cannot read stats artifact {}: {}",
                stats_path.display(),
                e
            ))
        })?;
        for stats in parse_stats(&content)? {
            let actual = counter.count_rows(&stats.table)?;
            report.checks.push(TableCheck {
                within_tolerance: row_count_ok(config, &stats.table, stats.expected_rows, actual),
                table: stats.table,
                expected: stats.expected_rows,
                actual,
            });
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::DataSourceKind;
    use std::cell::RefCell;
    use std::collections::HashMap;

    const HIGH_VOLATILITY_TABLE: &str = "gangesdb.app_inst_flow_dns_cf";

    fn test_config() -> RestoreConfig {
        let mut config = RestoreConfig::for_kind(DataSourceKind::Cassandra);
        config.high_volatility_tables = vec![HIGH_VOLATILITY_TABLE.to_string()];
        config
    }

    struct FakeCounter {
        counts: HashMap<String, u64>,
        failing: Vec<String>,
        queried: RefCell<Vec<String>>,
    }

    impl FakeCounter {
        fn new(counts: &[(&str, u64)], failing: &[&str]) -> Self {
            FakeCounter {
                counts: counts.iter().map(|(t, n)| (t.to_string(), *n)).collect(),
                failing: failing.iter().map(|t| t.to_string()).collect(),
                queried: RefCell::new(Vec::new()),
            }
        }
    }

    impl RowCounter for FakeCounter {
        fn count_rows(&self, table: &str) -> Result<u64> {
            self.queried.borrow_mut().push(table.to_string());
            if self.failing.iter().any(|t| t == table) {
                return Err(AppError::Process {
                    command: format!("SELECT COUNT(*) FROM {};", table),
                    detail: "operation timed out".to_string(),
                });
            }
            Ok(*self.counts.get(table).unwrap_or(&0))
        }
    }

    #[test]
    fn test_tolerance_boundaries_low() {
        let config = test_config();
        assert!(row_count_ok(&config, "purusdb.dev_cf", 1000, 1050));
        assert!(!row_count_ok(&config, "purusdb.dev_cf", 1000, 1051));
        assert!(row_count_ok(&config, "purusdb.dev_cf", 1000, 950));
        assert!(!row_count_ok(&config, "purusdb.dev_cf", 1000, 949));
    }

    #[test]
    fn test_tolerance_boundaries_high_volatility() {
        let config = test_config();
        assert!(row_count_ok(&config, HIGH_VOLATILITY_TABLE, 1000, 1399));
        assert!(!row_count_ok(&config, HIGH_VOLATILITY_TABLE, 1000, 1401));
        assert!(row_count_ok(&config, HIGH_VOLATILITY_TABLE, 1000, 601));
        assert!(!row_count_ok(&config, HIGH_VOLATILITY_TABLE, 1000, 599));
    }

    #[test]
    fn test_parse_stats() -> anyhow::Result<()> {
        let stats = parse_stats("purusdb.dev_cf 1000\ngangesdb.flow_cf 250\n")?;
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].table, "purusdb.dev_cf");
        assert_eq!(stats[0].expected_rows, 1000);
        Ok(())
    }

    #[test]
    fn test_parse_stats_malformed_line_is_format_error() {
        assert!(matches!(
            parse_stats("purusdb.dev_cf\n"),
            Err(AppError::Format(_))
        ));
        assert!(matches!(
            parse_stats("purusdb.dev_cf many\n"),
            Err(AppError::Format(_))
        ));
        assert!(matches!(
            parse_stats("purusdb.dev_cf 10 extra\n"),
            Err(AppError::Format(_))
        ));
    }

    #[test]
    fn test_parse_count_output() {
        let output = "\n count\n-------\n  1234\n\n(1 rows)\n";
        assert_eq!(parse_count_output(output), Some(1234));
        assert_eq!(parse_count_output("no numbers here"), None);
    }

    fn write_fixtures(config: &RestoreConfig, stats: &str) -> anyhow::Result<()> {
        fs::create_dir_all(config.backup_dir())?;
        manifest::append_unit(&config.manifest_path(), "purusdb")?;
        fs::write(config.stats_path("purusdb"), stats)?;
        Ok(())
    }

    #[test]
    fn test_verify_mismatch_is_reported_not_fatal() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut config = test_config();
        config.data_dir = dir.path().to_path_buf();
        write_fixtures(&config, "purusdb.dev_cf 1000\npurusdb.user_cf 100\n")?;

        let counter = FakeCounter::new(&[("purusdb.dev_cf", 400), ("purusdb.user_cf", 100)], &[]);
        let report = verify_data(&config, &counter)?;
        assert_eq!(report.checks.len(), 2);
        assert!(!report.all_within_tolerance());
        let mismatches: Vec<_> = report.mismatches().collect();
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].table, "purusdb.dev_cf");
        Ok(())
    }

    #[test]
    fn test_verify_query_failure_aborts_even_after_good_counts() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut config = test_config();
        config.data_dir = dir.path().to_path_buf();
        write_fixtures(&config, "purusdb.dev_cf 1000\npurusdb.user_cf 100\n")?;

        let counter = FakeCounter::new(
            &[("purusdb.dev_cf", 1000)],
            &["purusdb.user_cf"],
        );
        let result = verify_data(&config, &counter);
        assert!(matches!(result, Err(AppError::Process { .. })));
        // the first table was queried and passed before the failure
        assert_eq!(
            *counter.queried.borrow(),
            vec!["purusdb.dev_cf", "purusdb.user_cf"]
        );
        Ok(())
    }

    #[test]
    fn test_verify_without_manifest_is_precondition_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut config = test_config();
        config.data_dir = dir.path().to_path_buf();

        let counter = FakeCounter::new(&[], &[]);
        let result = verify_data(&config, &counter);
        assert!(matches!(result, Err(AppError::Restore(_))));
        assert!(counter.queried.borrow().is_empty());
        Ok(())
    }

    #[test]
    fn test_verify_missing_stats_artifact_is_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut config = test_config();
        config.data_dir = dir.path().to_path_buf();
        fs::create_dir_all(config.backup_dir())?;
        manifest::append_unit(&config.manifest_path(), "purusdb")?;

        let counter = FakeCounter::new(&[], &[]);
        let result = verify_data(&config, &counter);
        assert!(matches!(result, Err(AppError::Restore(_))));
        Ok(())
    }
}
