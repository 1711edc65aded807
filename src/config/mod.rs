//! Configuration loading and management.

mod file;
mod paths;
mod types;
mod validate;

pub use file::{init_config, load_config, read_config, write_config};
pub use paths::{config_file_path, resolve_config_path};
pub use types::{
    Config, DefaultsConfig, OutputMode, ScriptConfig, SkullStrip, ValidatorConfig,
};
pub use validate::validate_config;
