// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Export command - writes the allocation graph as JSON or DOT

use super::Context;
use crate::deadlock::{detect_deadlock, DeadlockReport};
use crate::graph::Adjacency;
use crate::presenter::{DotDocument, DotPresenter, GraphPresenter};
use crate::types::GraphData;
use anyhow::{Context as _, Result};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    /// Graph document `{nodes, edges, stats}`
    Json,
    /// Graphviz DOT with deadlock cycles highlighted
    Dot,
}

impl ExportFormat {
    /// Get file extension for format
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Dot => "dot",
        }
    }
}

/// Render `data` as DOT with every cycle of `report` highlighted, the
/// witness included even when the listing is capped to nothing
#[must_use]
pub fn dot_document(data: &GraphData, report: &DeadlockReport) -> DotDocument {
    let mut presenter = DotPresenter::default();
    let mut doc = presenter.render(&data.nodes, &data.edges);
    for cycle in report.cycle.iter().chain(&report.cycles) {
        presenter.highlight_cycle(&mut doc, cycle.nodes());
    }
    doc
}

/// Run the export command
pub fn run(ctx: &Context, format: ExportFormat, output: Option<PathBuf>) -> Result<()> {
    info!("Exporting graph as {}", format.extension());

    let state = ctx.load_state()?;
    let data = state.graph_data();

    if data.is_empty() {
        eprintln!("Warning: Graph is empty. Add processes and resources first.");
    }

    let content = match format {
        ExportFormat::Json => {
            serde_json::to_string_pretty(&data).context("Failed to serialize graph to JSON")?
        }
        ExportFormat::Dot => {
            let report = detect_deadlock(&Adjacency::from_graph_data(&data), &ctx.detect_options());
            dot_document(&data, &report).to_string()
        }
    };

    match output {
        Some(path) => {
            fs::write(&path, &content)
                .with_context(|| format!("Failed to write to {}", path.display()))?;
            println!("Exported to {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(content.as_bytes())?;
            if !content.ends_with('\n') {
                stdout.write_all(b"\n")?;
            }
        }
    }

    Ok(())
}
