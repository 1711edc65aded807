//! Where the configuration file lives.

use crate::constants::{APP_NAME, CONFIG_FILE_NAME};
use crate::error::{Error, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Platform configuration file, `~/.config/mimosa-bids/config.toml` on Linux.
pub fn config_file_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", APP_NAME).ok_or(Error::ConfigDirNotFound)?;
    Ok(dirs.config_dir().join(CONFIG_FILE_NAME))
}

/// The `--config` path when given, else the platform file.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    explicit.map_or_else(config_file_path, |path| Ok(path.to_path_buf()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path_wins() {
        let path = resolve_config_path(Some(Path::new("/etc/mimosa.toml"))).unwrap();
        assert_eq!(path, PathBuf::from("/etc/mimosa.toml"));
    }

    #[test]
    fn test_platform_path_names_app() {
        // No home directory in some build sandboxes
        let Ok(path) = resolve_config_path(None) else {
            return;
        };
        assert!(path.to_string_lossy().contains(APP_NAME));
        assert!(path.ends_with(CONFIG_FILE_NAME));
    }
}
