// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Config command - shows the effective configuration

use super::Context;
use anyhow::Result;

/// Print the whole configuration as TOML, or the value of one key
pub fn run(ctx: &Context, key: Option<&str>) -> Result<()> {
    match key {
        Some(key) => {
            tracing::debug!("Getting {}", key);
            let value = ctx
                .config
                .get(key)
                .ok_or_else(|| anyhow::anyhow!("Unknown key: {}. Valid: data_dir, log_level, policy, max_cycles", key))?;
            println!("{value}");
        }
        None if ctx.json => ctx.print_json(&ctx.config)?,
        None => print!("{}", ctx.config.to_toml()?),
    }
    Ok(())
}
