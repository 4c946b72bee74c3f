// restoretool/src/restore/decrypt.rs
use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::{AppError, Result};
use crate::utils::process::run_command_with_stdin;

/// Backup tarballs are encrypted at rest with this suffix appended.
pub const ENCRYPTED_SUFFIX: &str = ".gpg";

/// Sibling path of an encrypted file with the encryption suffix stripped.
pub fn decrypted_path(encrypted: &Path) -> Result<PathBuf> {
    let name = encrypted
        .to_str()
        .and_then(|path| path.strip_suffix(ENCRYPTED_SUFFIX))
        .ok_or_else(|| {
            AppError::Format(format!(
                "{} does not carry the {} suffix",
                encrypted.display(),
                ENCRYPTED_SUFFIX
            ))
        })?;
    Ok(PathBuf::from(name))
}

/// Decrypts a downloaded tarball in place, producing the sibling file with
/// the suffix stripped.
///
/// The passphrase comes from `GPG_PASSPHRASE` and is fed to gpg on stdin so
/// it never appears on a command line.
pub fn decrypt_file(encrypted: &Path) -> Result<PathBuf> {
    if !encrypted.exists() {
        return Err(AppError::Restore(format!(
            "{} does not exist",
            encrypted.display()
        )));
    }
    let passphrase = env::var("GPG_PASSPHRASE")
        .map_err(|_| AppError::Config("GPG_PASSPHRASE must be set".to_string()))?;
    let output = decrypted_path(encrypted)?;
    debug!("decrypting {}", encrypted.display());

    run_command_with_stdin(
        "gpg",
        &[
            "--batch",
            "--yes",
            "--pinentry-mode",
            "loopback",
            "--passphrase-fd",
            "0",
            "--output",
            &output.to_string_lossy(),
            "--decrypt",
            &encrypted.to_string_lossy(),
        ],
        &format!("{}\n", passphrase),
    )?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decrypted_path_strips_suffix() -> anyhow::Result<()> {
        let path = decrypted_path(Path::new("/data/purusdb.tar.gz.gpg"))?;
        assert_eq!(path, PathBuf::from("/data/purusdb.tar.gz"));
        Ok(())
    }

    #[test]
    fn test_decrypted_path_requires_suffix() {
        let result = decrypted_path(Path::new("/data/purusdb.tar.gz"));
        assert!(matches!(result, Err(AppError::Format(_))));
    }

    #[test]
    fn test_decrypt_missing_file_is_restore_error() {
        let result = decrypt_file(Path::new("/nonexistent/purusdb.tar.gz.gpg"));
        assert!(matches!(result, Err(AppError::Restore(_))));
    }
}
