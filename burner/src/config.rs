//! Finding and reading the configuration file.

use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::Burner;

/// Places looked at, in order, when no path is given explicitly.
pub const DEFAULT_PATHS: [&str; 2] = ["./burner.config.ron", "/etc/burner/burner.config.ron"];

/// Find the configuration file using the following precedence:
/// 1. `explicit`, from the command line
/// 2. `from_env`, the `BURNER_CONFIG` environment variable
/// 3. ./burner.config.ron (current working directory)
/// 4. /etc/burner/burner.config.ron (system-wide config)
///
/// Returns `None` when nothing was asked for and no default file exists.
///
/// # Errors
///
/// If a path that was asked for explicitly does not exist.
pub fn find_config_file(
    explicit: Option<PathBuf>,
    from_env: Option<PathBuf>,
) -> anyhow::Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        anyhow::ensure!(
            path.exists(),
            "Configuration file {} does not exist",
            path.display()
        );
        return Ok(Some(path));
    }

    if let Some(path) = from_env {
        anyhow::ensure!(
            path.exists(),
            "BURNER_CONFIG points to non-existent file: {}",
            path.display()
        );
        return Ok(Some(path));
    }

    Ok(DEFAULT_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists()))
}

/// Read and parse the RON configuration at `path`.
///
/// # Errors
///
/// If the file cannot be read or is not a valid configuration.
pub fn load(path: &Path) -> anyhow::Result<Burner> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;

    ron::from_str(&content).with_context(|| format!("Invalid configuration in {}", path.display()))
}
