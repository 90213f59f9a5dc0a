// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Resource management commands - add, list and delete resources

use super::Context;
use anyhow::Result;
use serde_json::json;

/// Run resource command
pub fn run(ctx: &Context, action: &str, name: Option<String>, units: u32) -> Result<()> {
    let mut state = ctx.load_state()?;

    match action {
        "add" | "create" => {
            let name = name.ok_or_else(|| anyhow::anyhow!("Resource name is required"))?;
            let id = state.add_resource(&name, units)?;
            ctx.save_state(&state)?;

            if ctx.json {
                ctx.print_json(&json!({ "id": id, "name": name.trim(), "units": units }))?;
            } else {
                println!("Added resource: {} ({})", name.trim(), id);
                println!("  units: {units}");
            }
        }

        "delete" | "remove" | "rm" => {
            let key = name.ok_or_else(|| anyhow::anyhow!("Resource name or ID is required"))?;
            let resource = state.resolve_resource(&key)?;
            let (id, display) = (resource.id.clone(), resource.name.clone());

            state.delete_resource(&id)?;
            ctx.save_state(&state)?;

            if ctx.json {
                ctx.print_json(&json!({ "deleted": id }))?;
            } else {
                println!("Deleted resource: {display} ({id})");
            }
        }

        "list" | "ls" => {
            if ctx.json {
                return ctx.print_json(&state.resources());
            }
            if state.resources().is_empty() {
                println!("No resources defined. Use 'ragraph resource add' to create one.");
                return Ok(());
            }

            println!("Resources ({}):", state.resources().len());
            for r in state.resources() {
                println!(
                    "  {} ({}) {}/{} available",
                    r.name, r.id, r.available_units, r.total_units
                );
                for (pid, units) in &r.allocated_to {
                    let who = state.process(pid).map_or(pid.as_str(), |p| p.name.as_str());
                    println!("    held by {who}: {units}");
                }
                for (pid, units) in &r.requested_by {
                    let who = state.process(pid).map_or(pid.as_str(), |p| p.name.as_str());
                    println!("    requested by {who}: {units}");
                }
            }
        }

        other => {
            anyhow::bail!("Unknown action: {}. Valid: add, delete, list", other);
        }
    }

    Ok(())
}
