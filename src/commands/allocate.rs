// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Relation commands - allocate, request, release and cancel

use super::Context;
use anyhow::Result;
use serde_json::json;
use tracing::warn;

/// Change to a process/resource relation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// Hand units to the process
    Allocate,
    /// Process waits for units
    Request,
    /// Process hands back everything it holds
    Release,
    /// Process stops waiting
    Cancel,
}

impl Relation {
    fn verb(self) -> &'static str {
        match self {
            Self::Allocate => "allocated",
            Self::Request => "requested",
            Self::Release => "released",
            Self::Cancel => "cancelled",
        }
    }
}

/// Apply a relation change between a process and a resource (names or IDs)
pub fn run(ctx: &Context, relation: Relation, process: &str, resource: &str, units: u32) -> Result<()> {
    let mut state = ctx.load_state()?;
    let p = state.resolve_process(process)?;
    let r = state.resolve_resource(resource)?;
    let (pid, pname) = (p.id.clone(), p.name.clone());
    let (rid, rname) = (r.id.clone(), r.name.clone());

    let moved = match relation {
        Relation::Allocate => state.allocate(&pid, &rid, units).map(|()| units)?,
        Relation::Request => state.request(&pid, &rid, units).map(|()| units)?,
        Relation::Release => state.release(&pid, &rid)?,
        Relation::Cancel => state.cancel_request(&pid, &rid)?,
    };
    ctx.save_state(&state)?;

    if relation == Relation::Request {
        let free = state.resource(&rid).map_or(0, |r| r.available_units);
        if free < units {
            warn!("{} waits for {} unit(s) of {} with {} free", pname, units, rname, free);
        }
    }

    if ctx.json {
        ctx.print_json(&json!({
            "action": relation.verb(),
            "process": pid,
            "resource": rid,
            "units": moved,
        }))?;
    } else {
        println!("{}: {} unit(s) of {} for {}", relation.verb(), moved, rname, pname);
    }

    Ok(())
}

/// Clear all processes, resources and history
pub fn reset(ctx: &Context) -> Result<()> {
    let mut state = ctx.load_state()?;
    state.reset();
    ctx.save_state(&state)?;

    if ctx.json {
        ctx.print_json(&json!({ "reset": true }))
    } else {
        println!("Allocation state cleared.");
        Ok(())
    }
}
