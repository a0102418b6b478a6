//! Wrapper around the external `rwx` command-line binary.
//!
//! Invocations are argument vectors with an optional working directory; the
//! binary prints JSON to stdout or diagnostics to stderr. When a command
//! fails but still produced stdout, the stdout wins — `rwx` reports
//! structured errors there.

use std::path::Path;

use regex::Regex;
use semver::Version;
use tokio::process::Command;
use tracing::debug;

use crate::{AppError, Result};

/// Minimum `rwx` CLI version the plugin requires.
pub const MIN_RWX_VERSION: &str = "2.3.2";

/// Outcome of probing the installed `rwx` CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliStatus {
    /// The binary is missing from PATH or its version output is unparsable.
    NotInstalled,
    /// The binary responded to `--version`.
    Installed {
        /// Parsed semantic version.
        version: Version,
        /// Whether it satisfies [`MIN_RWX_VERSION`].
        meets_minimum: bool,
    },
}

/// Run `rwx` with `args`, returning its stdout as UTF-8 text.
///
/// # Errors
///
/// Returns `AppError::Cli` when the binary cannot be executed, or when it
/// fails without producing stdout (stderr text is used as the message).
pub async fn run_rwx_command(args: &[String], cwd: Option<&Path>) -> Result<String> {
    let mut cmd = Command::new("rwx");
    cmd.args(args);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    debug!(?args, "invoking rwx CLI");

    let output = cmd
        .output()
        .await
        .map_err(|err| AppError::Cli(format!("failed to execute rwx: {err}")))?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if output.status.success() {
        return Ok(stdout);
    }

    // Failed invocations that still wrote stdout carry the structured error
    // payload there.
    if !stdout.is_empty() {
        return Ok(stdout);
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
    if stderr.is_empty() {
        Err(AppError::Cli("rwx command failed".into()))
    } else {
        Err(AppError::Cli(stderr))
    }
}

/// Parse a semantic version out of `rwx --version` output.
///
/// Accepts formats like `rwx version v2.3.2` or a bare `2.3.2`.
#[must_use]
pub fn parse_version_output(output: &str) -> Option<Version> {
    let pattern = Regex::new(r"v?(\d+\.\d+\.\d+)").ok()?;
    let captures = pattern.captures(output)?;
    Version::parse(captures.get(1)?.as_str()).ok()
}

/// Probe the installed `rwx` CLI version.
pub async fn cli_status() -> CliStatus {
    let output = match Command::new("rwx").arg("--version").output().await {
        Ok(output) if output.status.success() => output,
        _ => return CliStatus::NotInstalled,
    };

    let text = String::from_utf8_lossy(&output.stdout).into_owned();
    match parse_version_output(&text) {
        Some(version) => {
            let meets_minimum = minimum_version().is_some_and(|min| version >= min);
            CliStatus::Installed {
                version,
                meets_minimum,
            }
        }
        None => CliStatus::NotInstalled,
    }
}

/// Fail unless the `rwx` CLI is installed and meets [`MIN_RWX_VERSION`].
///
/// Used as a boot-time preflight; tools re-check at call time through the
/// elicitation layer so a missing CLI stays recoverable mid-session.
///
/// # Errors
///
/// Returns `AppError::Cli` naming the installed version (or its absence)
/// and the required minimum.
pub async fn ensure_cli_version() -> Result<()> {
    match cli_status().await {
        CliStatus::Installed {
            meets_minimum: true,
            ..
        } => Ok(()),
        CliStatus::Installed { version, .. } => Err(AppError::Cli(format!(
            "rwx CLI version {version} is installed, but version >= {MIN_RWX_VERSION} is \
             required. Please update your rwx CLI installation."
        ))),
        CliStatus::NotInstalled => Err(AppError::Cli(format!(
            "rwx CLI is not installed or not in PATH. Please install rwx CLI version >= \
             {MIN_RWX_VERSION}. See https://docs.rwx.com/mint/install for instructions."
        ))),
    }
}

/// Strip a cloud URL down to its trailing run or task id.
///
/// Bare ids pass through unchanged.
#[must_use]
pub fn extract_run_id(run_id_or_url: &str) -> &str {
    match run_id_or_url.rsplit('/').next() {
        Some(id) if !id.is_empty() => id,
        _ => run_id_or_url,
    }
}

fn minimum_version() -> Option<Version> {
    Version::parse(MIN_RWX_VERSION).ok()
}
