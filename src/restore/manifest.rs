// restoretool/src/restore/manifest.rs
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::errors::{AppError, Result};

/// Reads the keyspace manifest written by the schema-restore phase.
///
/// The manifest is the handoff between phases; the data-restore and verify
/// phases refuse to run without it.
pub fn read_units(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Err(AppError::Restore(format!(
            "keyspace manifest {} not found; run restore-keyspaces first",
            path.display()
        )));
    }
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Appends one restored keyspace to the manifest, creating it on first use.
pub fn append_unit(path: &Path, keyspace: &str) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", keyspace)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_then_read_round_trip() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("KEYSPACES");
        append_unit(&path, "brazosdb")?;
        append_unit(&path, "purusdb")?;

        let units = read_units(&path)?;
        assert_eq!(units, vec!["brazosdb", "purusdb"]);
        Ok(())
    }

    #[test]
    fn test_read_missing_manifest_is_precondition_error() {
        let result = read_units(Path::new("/nonexistent/KEYSPACES"));
        assert!(matches!(result, Err(AppError::Restore(_))));
    }

    #[test]
    fn test_read_skips_blank_lines() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("KEYSPACES");
        fs::write(&path, "brazosdb\n\n purusdb \n")?;
        assert_eq!(read_units(&path)?, vec!["brazosdb", "purusdb"]);
        Ok(())
    }
}
