//! Loading the naming server configuration file

use std::path::Path;

use anyhow::{Context, Result};
use dfs_core::NamingConfig;

/// Reads a JSON [`NamingConfig`]; missing fields keep their defaults.
/// Without a path the built-in defaults are returned.
pub fn load_config(path: Option<&Path>) -> Result<NamingConfig> {
    let Some(path) = path else {
        return Ok(NamingConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}
