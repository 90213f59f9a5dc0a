// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Check command - runs deadlock detection on the stored state or a graph file

use super::Context;
use crate::deadlock::{detect_deadlock, DeadlockPolicy, DeadlockReport};
use crate::detect::Cycle;
use crate::graph::{Adjacency, GraphInput};
use anyhow::{Context as _, Result};
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::info;

/// Arguments of the check command
#[derive(Debug, Clone, Default)]
pub struct CheckArgs {
    /// Graph file (`-` for stdin); the stored state when absent
    pub file: Option<PathBuf>,
    /// Policy override
    pub policy: Option<DeadlockPolicy>,
    /// Cycle listing cap override
    pub max_cycles: Option<usize>,
    /// Fail when a deadlock is found
    pub fail_on_deadlock: bool,
}

fn read_input(path: &Path) -> Result<GraphInput> {
    let text = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read graph from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
    };
    GraphInput::from_json_str(&text).with_context(|| format!("Invalid graph in {}", path.display()))
}

/// Run the check command. Returns whether a deadlock was found.
pub fn run(ctx: &Context, args: &CheckArgs) -> Result<bool> {
    let mut options = ctx.detect_options();
    if let Some(policy) = args.policy {
        options.policy = policy;
    }
    if let Some(max) = args.max_cycles {
        options.max_cycles = max;
    }

    let (adjacency, names) = match &args.file {
        Some(path) => {
            info!("Checking graph from {}", path.display());
            let input = read_input(path)?;
            let names: HashMap<String, String> = input
                .document()
                .map(|data| {
                    data.nodes
                        .iter()
                        .map(|n| (n.id.clone(), n.display_name().to_string()))
                        .collect()
                })
                .unwrap_or_default();
            (input.to_adjacency(), names)
        }
        None => {
            info!("Checking stored allocation state");
            let state = ctx.load_state()?;
            let names: HashMap<String, String> = state
                .processes()
                .iter()
                .map(|p| (p.id.clone(), p.name.clone()))
                .chain(state.resources().iter().map(|r| (r.id.clone(), r.name.clone())))
                .collect();
            (Adjacency::from_graph_data(&state.graph_data()), names)
        }
    };

    let report = detect_deadlock(&adjacency, &options);

    if ctx.json {
        ctx.print_json(&report)?;
    } else {
        print_report(ctx, &report, &names);
    }

    if report.has_deadlock && args.fail_on_deadlock {
        anyhow::bail!("deadlock detected");
    }
    Ok(report.has_deadlock)
}

fn print_report(ctx: &Context, report: &DeadlockReport, names: &HashMap<String, String>) {
    let name = |id: &str| names.get(id).cloned().unwrap_or_else(|| id.to_string());
    let show = |cycle: &Cycle| {
        cycle
            .nodes()
            .iter()
            .map(|id| name(id))
            .collect::<Vec<_>>()
            .join(" -> ")
    };

    if !report.has_deadlock {
        println!("{} {}", ctx.good("No deadlock:"), report.message);
        return;
    }

    println!("{} {}", ctx.alert("DEADLOCK:"), report.message);
    println!("  policy: {}", report.policy.as_str());
    if let Some(cycle) = &report.cycle {
        println!("  cycle: {}", show(cycle));
    }
    if report.cycles.len() > 1 {
        println!("  all cycles ({}):", report.cycles.len());
        for (i, cycle) in report.cycles.iter().enumerate() {
            println!("    [{}] {}", i + 1, show(cycle));
        }
    }
    if report.truncated {
        println!("  (cycle listing stopped at the configured limit)");
    }
    let affected: Vec<String> = report.affected_processes.iter().map(|id| name(id)).collect();
    println!("  affected processes: {}", affected.join(", "));
}
