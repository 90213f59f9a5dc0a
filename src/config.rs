// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Configuration management
//!
//! Layers, lowest first: built-in defaults, the TOML config file, then
//! `RAGRAPH_*` environment variables. Command-line flags are applied on top
//! by the binary.

use crate::deadlock::{DeadlockPolicy, DEFAULT_MAX_CYCLES};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "RAGRAPH";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory for persistent data (allocation state)
    pub data_dir: PathBuf,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Which cycles count as deadlock
    pub policy: DeadlockPolicy,
    /// Cap on cycles listed in a deadlock report
    pub max_cycles: usize,
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "hyperpolymath", "ragraph")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: project_dirs()
                .map(|d| d.data_dir().to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".ragraph")),
            log_level: "info".to_string(),
            policy: DeadlockPolicy::default(),
            max_cycles: DEFAULT_MAX_CYCLES,
        }
    }
}

impl Config {
    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    /// Look up one key as display text
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "data_dir" => Some(self.data_dir.display().to_string()),
            "log_level" => Some(self.log_level.clone()),
            "policy" => Some(self.policy.as_str().to_string()),
            "max_cycles" => Some(self.max_cycles.to_string()),
            _ => None,
        }
    }
}

/// Default location of the config file
#[must_use]
pub fn default_path() -> Option<PathBuf> {
    project_dirs().map(|d| d.config_dir().join("config.toml"))
}

/// Load configuration from `path` (or the default location) and the environment.
///
/// A missing file is not an error; a malformed one is.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let defaults = Config::default();
    let mut builder = config::Config::builder()
        .set_default("data_dir", defaults.data_dir.to_string_lossy().to_string())?
        .set_default("log_level", defaults.log_level)?
        .set_default("policy", defaults.policy.as_str())?
        .set_default("max_cycles", defaults.max_cycles as u64)?;

    let file = path.map(Path::to_path_buf).or_else(default_path);
    if let Some(file) = file {
        tracing::debug!("reading config from {}", file.display());
        builder = builder.add_source(
            config::File::from(file.as_path())
                .format(config::FileFormat::Toml)
                .required(path.is_some()),
        );
    }

    builder
        .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
        .build()
        .context("Failed to load configuration")?
        .try_deserialize()
        .context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert_eq!(config.log_level, "info");
        assert_eq!(config.policy, DeadlockPolicy::AnyCycle);
        assert_eq!(config.max_cycles, DEFAULT_MAX_CYCLES);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "policy = \"alternating\"\nmax_cycles = 5\ndata_dir = \"/tmp/rag\"").unwrap();

        let config = load(Some(file.path())).unwrap();

        assert_eq!(config.policy, DeadlockPolicy::Alternating);
        assert_eq!(config.max_cycles, 5);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/rag"));
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        assert!(load(Some(Path::new("/nonexistent/ragraph.toml"))).is_err());
    }

    #[test]
    fn test_get_and_toml() {
        let config = Config::default();

        assert_eq!(config.get("policy").as_deref(), Some("any-cycle"));
        assert!(config.get("nope").is_none());
        assert!(config.to_toml().unwrap().contains("max_cycles = 64"));
    }
}
