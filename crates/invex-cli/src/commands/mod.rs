//! CLI subcommands.

pub mod batch;
pub mod config;
pub mod output;
pub mod process;

use std::path::{Path, PathBuf};

use anyhow::Context;
use invex_core::InvexConfig;
use tracing::debug;

/// `<config dir>/invex/config.json`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("invex")
        .join("config.json")
}

/// Load the explicit config file, else the default one if present, else
/// defaults; then overlay environment variables.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<InvexConfig> {
    let config = match config_path {
        Some(path) => InvexConfig::from_file(Path::new(path))
            .with_context(|| format!("Failed to read config file {}", path))?,
        None => {
            let default_path = default_config_path();
            if default_path.exists() {
                debug!("Using config file {}", default_path.display());
                InvexConfig::from_file(&default_path).with_context(|| {
                    format!("Failed to read config file {}", default_path.display())
                })?
            } else {
                InvexConfig::default()
            }
        }
    };

    Ok(config.apply_env())
}
