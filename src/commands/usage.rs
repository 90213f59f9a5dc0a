// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Usage command - per-resource utilisation and hold times

use super::Context;
use anyhow::Result;

/// Run the usage command
pub fn run(ctx: &Context) -> Result<()> {
    let state = ctx.load_state()?;
    let report = state.usage_report();

    if ctx.json {
        return ctx.print_json(&report);
    }

    if report.resources.is_empty() {
        println!("No resources defined. Use 'ragraph resource add' to create one.");
        return Ok(());
    }

    println!("Resource usage ({}):", report.resources.len());
    for r in &report.resources {
        let line = format!(
            "  {} ({}) {}/{} units in use ({:.1}%)",
            r.name, r.id, r.current_usage, r.total_units, r.usage_percentage
        );
        if r.current_usage == r.total_units {
            println!("{}", ctx.alert(&line));
        } else {
            println!("{line}");
        }
        let hold = r
            .average_hold_seconds
            .map_or_else(|| "n/a".to_string(), |s| format!("{s:.1}s"));
        println!(
            "    holders: {}, waiting: {}, average hold: {}",
            r.allocation_count, r.request_count, hold
        );
    }

    println!();
    println!(
        "Total allocations: {}, total requests: {}",
        report.total_allocations, report.total_requests
    );
    if let Some(last) = report.trend.last() {
        let counts: Vec<String> = report.trend.iter().map(|p| p.allocations.to_string()).collect();
        println!(
            "Recent trend (last {} changes, up to {}): {}",
            report.trend.len(),
            last.timestamp.format("%H:%M:%S"),
            counts.join(" ")
        );
    }

    Ok(())
}
