// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Process management commands - add, list and remove processes

use super::Context;
use anyhow::Result;
use serde_json::json;

/// Run process command
pub fn run(ctx: &Context, action: &str, name: Option<String>) -> Result<()> {
    let mut state = ctx.load_state()?;

    match action {
        "add" | "create" => {
            let name = name.ok_or_else(|| anyhow::anyhow!("Process name is required"))?;
            let id = state.add_process(&name)?;
            ctx.save_state(&state)?;

            if ctx.json {
                ctx.print_json(&json!({ "id": id, "name": name.trim() }))?;
            } else {
                println!("Added process: {} ({})", name.trim(), id);
            }
        }

        "remove" | "delete" | "rm" => {
            let key = name.ok_or_else(|| anyhow::anyhow!("Process name or ID is required"))?;
            let process = state.resolve_process(&key)?;
            let (id, display) = (process.id.clone(), process.name.clone());

            // releases holdings and cancels requests first
            state.remove_process(&id)?;
            ctx.save_state(&state)?;

            if ctx.json {
                ctx.print_json(&json!({ "removed": id }))?;
            } else {
                println!("Removed process: {display} ({id})");
            }
        }

        "list" | "ls" => {
            if ctx.json {
                return ctx.print_json(&state.processes());
            }
            if state.processes().is_empty() {
                println!("No processes defined. Use 'ragraph process add' to create one.");
                return Ok(());
            }

            println!("Processes ({}):", state.processes().len());
            for p in state.processes() {
                println!("  {} ({})", p.name, p.id);
                for (rid, units) in &p.allocated_resources {
                    let what = state.resource(rid).map_or(rid.as_str(), |r| r.name.as_str());
                    println!("    holds {what}: {units}");
                }
                for (rid, units) in &p.requested_resources {
                    let what = state.resource(rid).map_or(rid.as_str(), |r| r.name.as_str());
                    println!("    waits for {what}: {units}");
                }
            }
        }

        other => {
            anyhow::bail!("Unknown action: {}. Valid: add, remove, list", other);
        }
    }

    Ok(())
}
