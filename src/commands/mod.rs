// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Command implementations

pub mod allocate;
pub mod check;
pub mod completions;
pub mod config;
pub mod export;
pub mod process;
pub mod resource;
pub mod usage;

use crate::allocation::AllocationManager;
use crate::config::Config;
use crate::deadlock::DetectOptions;
use anyhow::{Context as _, Result};
use owo_colors::OwoColorize;
use serde::Serialize;
use std::io::Write;

/// Settings shared by every command
#[derive(Debug, Clone)]
pub struct Context {
    /// Effective configuration
    pub config: Config,
    /// Print machine-readable JSON instead of text
    pub json: bool,
    /// Use ANSI colors in text output
    pub color: bool,
}

impl Context {
    /// Create a context for `config`
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            json: false,
            color: false,
        }
    }

    /// Load the allocation state from the data directory
    pub fn load_state(&self) -> Result<AllocationManager> {
        let dir = &self.config.data_dir;
        AllocationManager::load(dir)
            .with_context(|| format!("Failed to load state from {}", dir.display()))
    }

    /// Save the allocation state to the data directory
    pub fn save_state(&self, state: &AllocationManager) -> Result<()> {
        let dir = &self.config.data_dir;
        state
            .save(dir)
            .with_context(|| format!("Failed to save state to {}", dir.display()))
    }

    /// Detection options from the configuration
    #[must_use]
    pub fn detect_options(&self) -> DetectOptions {
        DetectOptions {
            policy: self.config.policy,
            max_cycles: self.config.max_cycles,
        }
    }

    /// Write `value` as pretty JSON to stdout
    pub fn print_json<T: Serialize>(&self, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }

    /// Text for a warning line
    #[must_use]
    pub fn alert(&self, text: &str) -> String {
        if self.color {
            text.red().bold().to_string()
        } else {
            text.to_string()
        }
    }

    /// Text for a success line
    #[must_use]
    pub fn good(&self, text: &str) -> String {
        if self.color {
            text.green().to_string()
        } else {
            text.to_string()
        }
    }
}
