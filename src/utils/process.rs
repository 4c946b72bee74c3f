// restoretool/src/utils/process.rs
use std::io::Write;
use std::process::{Command, Output, Stdio};

use tracing::debug;
use which::which;

use crate::errors::{AppError, Result};

/// Renders a command line for logs and error messages.
fn render_command(program: &str, args: &[&str]) -> String {
    let mut rendered = program.to_string();
    for arg in args {
        rendered.push(' ');
        rendered.push_str(arg);
    }
    rendered
}

/// Runs an external tool found on PATH and fails on a nonzero exit.
///
/// The restore pipeline leans on the database's own tooling (cqlsh,
/// nodetool, influxd, influx, gpg); every call blocks until the tool exits
/// and a failure carries the command plus its stderr.
pub fn run_command(program: &str, args: &[&str]) -> Result<Output> {
    let executable = which(program).map_err(|_| {
        AppError::Config(format!("{} executable not found in PATH", program))
    })?;
    let rendered = render_command(program, args);
    debug!("running: {}", rendered);

    let output = Command::new(executable).args(args).output()?;
    if !output.status.success() {
        return Err(AppError::Process {
            command: rendered,
            detail: format!(
                "{}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }
    Ok(output)
}

/// Same as [`run_command`] but feeds `stdin_data` to the child, for tools
/// that read secrets from standard input.
pub fn run_command_with_stdin(program: &str, args: &[&str], stdin_data: &str) -> Result<Output> {
    let executable = which(program).map_err(|_| {
        AppError::Config(format!("{} executable not found in PATH", program))
    })?;
    let rendered = render_command(program, args);
    debug!("running: {}", rendered);

    let mut child = Command::new(executable)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;
    if let Some(stdin) = child.stdin.as_mut() {
        stdin.write_all(stdin_data.as_bytes())?;
    }
    let output = child.wait_with_output()?;
    if !output.status.success() {
        return Err(AppError::Process {
            command: rendered,
            detail: format!(
                "{}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_command() {
        assert_eq!(
            render_command("tar", &["xf", "backup.tar.gz"]),
            "tar xf backup.tar.gz"
        );
    }

    #[test]
    fn test_missing_executable_is_config_error() {
        let result = run_command("definitely-not-a-real-tool-xyz", &[]);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_nonzero_exit_is_process_error() {
        // `false` exits 1 on every unix
        let result = run_command("false", &[]);
        match result {
            Err(AppError::Process { command, .. }) => assert_eq!(command, "false"),
            other => panic!("expected a process error, got {:?}", other),
        }
    }

    #[test]
    fn test_successful_command_returns_output() -> anyhow::Result<()> {
        let output = run_command("echo", &["backup"])?;
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "backup");
        Ok(())
    }
}
