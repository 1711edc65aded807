//! Reading and writing the TOML configuration.
//!
//! A file passed with `--config` (or `MIMOSA_CONFIG`) must exist. The
//! platform file is optional; without it the built-in defaults apply.

use super::paths::{config_file_path, resolve_config_path};
use crate::config::Config;
use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Parse a configuration file that is expected to exist.
pub fn read_config(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path).map_err(|e| Error::ConfigRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config = toml::from_str(&contents).map_err(|e| Error::ConfigParse {
        path: path.to_path_buf(),
        source: e,
    })?;
    debug!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Configuration for a run: the explicit file, else the platform file when
/// present, else defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        return read_config(path);
    }

    match config_file_path() {
        Ok(path) if path.is_file() => read_config(&path),
        _ => Ok(Config::default()),
    }
}

/// Write a configuration file, creating its parent directories.
pub fn write_config(config: &Config, path: &Path) -> Result<()> {
    let contents = toml::to_string_pretty(config).map_err(|e| Error::ConfigSerialize { source: e })?;

    let write = || -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)
    };
    write().map_err(|e| Error::ConfigWrite {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Write a default configuration unless the target file already exists.
///
/// Returns the target path and whether a file was created.
pub fn init_config(explicit: Option<&Path>) -> Result<(PathBuf, bool)> {
    let path = resolve_config_path(explicit)?;
    if path.exists() {
        return Ok((path, false));
    }
    write_config(&Config::default(), &path)?;
    Ok((path, true))
}
