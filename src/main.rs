//! Encrypted backup restore tool
//!
//! Restores InfluxDB and Cassandra snapshots from object storage: resolves
//! the last complete backup set, downloads and decrypts it, and drives the
//! per-datasource restore phases.

// restoretool/src/main.rs
mod config;
mod datasource;
mod errors;
mod restore;
mod storage;
mod utils;
mod verify;

use std::env;
use std::path::Path;
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::{Context, Result};
use dotenv::dotenv;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use config::RestoreConfig;
use datasource::DataSourceKind;
use restore::RestoreSession;
use verify::CqlshRowCounter;

const USAGE: &str = "Usage: restoretool [--debug] [--verbose] <influxdb|cassandra> \
<show-last|download|restore-keyspaces|restore-data|refresh|verify|cleanup>";

/// The independently invocable steps of a restore. Each run executes one
/// phase; the local download directory hands state from one run to the
/// next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    ShowLast,
    Download,
    RestoreKeyspaces,
    RestoreData,
    Refresh,
    Verify,
    Cleanup,
}

impl Phase {
    fn cassandra_only(&self) -> bool {
        matches!(self, Self::RestoreKeyspaces | Self::Refresh | Self::Verify)
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "show-last" => Ok(Self::ShowLast),
            "download" => Ok(Self::Download),
            "restore-keyspaces" => Ok(Self::RestoreKeyspaces),
            "restore-data" => Ok(Self::RestoreData),
            "refresh" => Ok(Self::Refresh),
            "verify" => Ok(Self::Verify),
            "cleanup" => Ok(Self::Cleanup),
            other => Err(format!("unknown phase '{}'", other)),
        }
    }
}

struct Cli {
    kind: DataSourceKind,
    phase: Phase,
    log_level: &'static str,
}

impl Cli {
    fn parse<I: Iterator<Item = String>>(args: I) -> std::result::Result<Cli, String> {
        let mut kind = None;
        let mut phase = None;
        let mut log_level = "error";
        for arg in args {
            match arg.as_str() {
                "--debug" => log_level = "debug",
                "--verbose" => log_level = "info",
                flag if flag.starts_with("--") => {
                    return Err(format!("unknown option '{}'", flag));
                }
                positional if kind.is_none() => kind = Some(positional.parse()?),
                positional if phase.is_none() => phase = Some(positional.parse()?),
                extra => return Err(format!("unexpected argument '{}'", extra)),
            }
        }
        let kind = kind.ok_or("need a datasource to restore")?;
        let phase: Phase = phase.ok_or("need a phase to run")?;
        if phase.cassandra_only() && kind != DataSourceKind::Cassandra {
            return Err(
                "restore-keyspaces, refresh and verify are only available for cassandra"
                    .to_string(),
            );
        }
        Ok(Cli {
            kind,
            phase,
            log_level,
        })
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("error"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Main entry point for the restore tool
#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    let cli = match Cli::parse(env::args().skip(1)) {
        Ok(cli) => cli,
        Err(message) => {
            eprintln!("❌ {}", message);
            eprintln!("{}", USAGE);
            return ExitCode::FAILURE;
        }
    };
    init_logging(cli.log_level);

    match run_app(&cli).await {
        Ok(_) => {
            if cli.phase != Phase::ShowLast {
                println!("✅ Operation completed successfully.");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_app(cli: &Cli) -> Result<()> {
    // Expects config.json next to the executable or in the project root;
    // built-in defaults apply when it is absent.
    let config = RestoreConfig::load(cli.kind, Path::new("config.json"))
        .context("Failed to load configuration")?;

    match cli.phase {
        Phase::ShowLast => {
            let session = RestoreSession::connect(&config).await?;
            let set = session.last_backup_set()?;
            for key in set.iter() {
                println!("{}", key);
            }
        }
        Phase::Download => {
            let session = RestoreSession::connect(&config).await?;
            restore::download::download_last_backup(&session)
                .await
                .context("Download failed")?;
        }
        Phase::RestoreKeyspaces => {
            restore::keyspaces::restore_keyspaces(&config)
                .context("Failed to restore keyspaces")?;
        }
        Phase::RestoreData => match cli.kind {
            DataSourceKind::Cassandra => {
                restore::data::restore_data(&config).context("Failed to restore cassandra data")?
            }
            DataSourceKind::InfluxDb => restore::timeseries::restore_data(&config)
                .context("Failed to restore influxdb data")?,
        },
        Phase::Refresh => {
            restore::data::refresh(&config).context("Failed to refresh keyspaces")?;
        }
        Phase::Verify => {
            let counter = CqlshRowCounter::from_env(&config)?;
            let report =
                verify::verify_data(&config, &counter).context("Failed to verify restored data")?;
            for check in &report.checks {
                if check.within_tolerance {
                    info!("{} OK", check.table);
                } else {
                    error!(
                        "row count for {} differs too much (expected={}, actual={})",
                        check.table, check.expected, check.actual
                    );
                }
            }
            restore::cleanup(&config).context("Failed to clean up downloaded files")?;
        }
        Phase::Cleanup => {
            restore::cleanup(&config).context("Failed to clean up downloaded files")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(words: &[&str]) -> std::vec::IntoIter<String> {
        words
            .iter()
            .map(|w| w.to_string())
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn test_parse_datasource_and_phase() -> std::result::Result<(), String> {
        let cli = Cli::parse(args(&["cassandra", "download"]))?;
        assert_eq!(cli.kind, DataSourceKind::Cassandra);
        assert_eq!(cli.phase, Phase::Download);
        assert_eq!(cli.log_level, "error");
        Ok(())
    }

    #[test]
    fn test_parse_verbosity_flags() -> std::result::Result<(), String> {
        let cli = Cli::parse(args(&["--verbose", "influxdb", "show-last"]))?;
        assert_eq!(cli.log_level, "info");
        let cli = Cli::parse(args(&["influxdb", "download", "--debug"]))?;
        assert_eq!(cli.log_level, "debug");
        Ok(())
    }

    #[test]
    fn test_parse_rejects_cassandra_phases_for_influxdb() {
        for phase in ["restore-keyspaces", "refresh", "verify"] {
            assert!(Cli::parse(args(&["influxdb", phase])).is_err());
        }
        assert!(Cli::parse(args(&["influxdb", "restore-data"])).is_ok());
    }

    #[test]
    fn test_parse_requires_datasource_and_phase() {
        assert!(Cli::parse(args(&[])).is_err());
        assert!(Cli::parse(args(&["cassandra"])).is_err());
        assert!(Cli::parse(args(&["postgres", "download"])).is_err());
        assert!(Cli::parse(args(&["cassandra", "explode"])).is_err());
    }
}
