// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Presentation seam: render a graph and mark a cycle on it

use crate::types::{Edge, Node, NodeKind};
use std::collections::HashSet;
use std::fmt;

/// Something that can draw an allocation graph and highlight a cycle on it
pub trait GraphPresenter {
    /// Rendered form handed back to the caller
    type Handle;

    /// Render nodes and edges
    fn render(&mut self, nodes: &[Node], edges: &[Edge]) -> Self::Handle;

    /// Mark the nodes of a cycle and the edges joining consecutive ids
    fn highlight_cycle(&mut self, handle: &mut Self::Handle, node_ids: &[String]);
}

/// Renders Graphviz DOT
#[derive(Debug, Default)]
pub struct DotPresenter {
    /// Graph name in the `digraph` header
    pub name: Option<String>,
}

/// A rendered DOT graph; [`fmt::Display`] writes the source
#[derive(Debug, Clone)]
pub struct DotDocument {
    name: String,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    marked_nodes: HashSet<String>,
    marked_edges: HashSet<(String, String)>,
}

impl DotDocument {
    /// Check if a node is highlighted
    #[must_use]
    pub fn is_marked(&self, id: &str) -> bool {
        self.marked_nodes.contains(id)
    }
}

impl GraphPresenter for DotPresenter {
    type Handle = DotDocument;

    fn render(&mut self, nodes: &[Node], edges: &[Edge]) -> DotDocument {
        DotDocument {
            name: self.name.clone().unwrap_or_else(|| "allocation".to_string()),
            nodes: nodes.to_vec(),
            edges: edges.to_vec(),
            marked_nodes: HashSet::new(),
            marked_edges: HashSet::new(),
        }
    }

    fn highlight_cycle(&mut self, handle: &mut DotDocument, node_ids: &[String]) {
        handle.marked_nodes.extend(node_ids.iter().cloned());
        for pair in node_ids.windows(2) {
            handle
                .marked_edges
                .insert((pair[0].clone(), pair[1].clone()));
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

impl fmt::Display for DotDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "digraph \"{}\" {{", escape(&self.name))?;
        writeln!(f, "  rankdir=LR;")?;
        writeln!(f)?;

        for node in &self.nodes {
            let shape = match node.kind {
                NodeKind::Process => "ellipse",
                NodeKind::Resource => "box",
            };
            let mark = if self.is_marked(&node.id) { ", color=red" } else { "" };
            writeln!(
                f,
                "  \"{}\" [label=\"{}\", shape={}{}];",
                escape(&node.id),
                escape(node.display_name()),
                shape,
                mark
            )?;
        }

        writeln!(f)?;

        for edge in &self.edges {
            let marked = self
                .marked_edges
                .contains(&(edge.from.clone(), edge.to.clone()));
            let mark = if marked { ", color=red" } else { "" };
            writeln!(
                f,
                "  \"{}\" -> \"{}\" [label=\"{} x{}\"{}];",
                escape(&edge.from),
                escape(&edge.to),
                edge.kind.as_str(),
                edge.units,
                mark
            )?;
        }

        writeln!(f, "}}")
    }
}
