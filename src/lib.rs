// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! ragraph library - resource allocation graphs and deadlock detection
//!
//! This crate models a resource allocation graph (processes, resources,
//! request and allocation edges), keeps a stateful allocation manager that
//! produces such graphs, and detects the cycles that signal a deadlock.
//! The allocation history also feeds a per-resource usage summary.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod allocation;
pub mod commands;
pub mod config;
pub mod deadlock;
pub mod detect;
pub mod error;
pub mod graph;
pub mod presenter;
pub mod usage;

pub use error::{Error, Result};

/// Core data types of the resource allocation graph
pub mod types {
    use serde::{Deserialize, Deserializer, Serialize};

    // =========================================================================
    // Nodes
    // =========================================================================

    /// What a node in the allocation graph stands for
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum NodeKind {
        /// A process that holds or waits for resources
        Process,
        /// A resource with one or more units
        Resource,
    }

    impl NodeKind {
        /// Lowercase name as used in graph documents
        #[must_use]
        pub fn as_str(&self) -> &'static str {
            match self {
                Self::Process => "process",
                Self::Resource => "resource",
            }
        }
    }

    /// A process or resource node
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Node {
        /// Unique identifier (integers are accepted and kept as strings)
        #[serde(deserialize_with = "string_or_integer")]
        pub id: String,
        /// Process or resource
        #[serde(rename = "type", alias = "kind")]
        pub kind: NodeKind,
        /// Display label
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub label: Option<String>,
        /// Tooltip text, carried through for presenters
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub title: Option<String>,
    }

    impl Node {
        /// Create a process node
        #[must_use]
        pub fn process(id: impl Into<String>) -> Self {
            Self {
                id: id.into(),
                kind: NodeKind::Process,
                label: None,
                title: None,
            }
        }

        /// Create a resource node
        #[must_use]
        pub fn resource(id: impl Into<String>) -> Self {
            Self {
                id: id.into(),
                kind: NodeKind::Resource,
                label: None,
                title: None,
            }
        }

        /// Attach a display label
        #[must_use]
        pub fn with_label(mut self, label: impl Into<String>) -> Self {
            self.label = Some(label.into());
            self
        }

        /// Label if present, id otherwise
        #[must_use]
        pub fn display_name(&self) -> &str {
            self.label.as_deref().unwrap_or(&self.id)
        }
    }

    // =========================================================================
    // Edges
    // =========================================================================

    /// Relationship carried by an edge
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum EdgeKind {
        /// Process -> Resource: the process waits for the resource
        Request,
        /// Resource -> Process: the resource is held by the process
        Allocation,
    }

    impl EdgeKind {
        /// Lowercase name as used in graph documents
        #[must_use]
        pub fn as_str(&self) -> &'static str {
            match self {
                Self::Request => "request",
                Self::Allocation => "allocation",
            }
        }
    }

    fn default_units() -> u32 {
        1
    }

    /// Directed edge between two nodes
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Edge {
        /// Source node ID
        #[serde(deserialize_with = "string_or_integer")]
        pub from: String,
        /// Target node ID
        #[serde(deserialize_with = "string_or_integer")]
        pub to: String,
        /// Request or allocation
        #[serde(rename = "type", alias = "kind")]
        pub kind: EdgeKind,
        /// Number of units requested or held
        #[serde(default = "default_units")]
        pub units: u32,
        /// Tooltip text, carried through for presenters
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub title: Option<String>,
    }

    impl Edge {
        /// Process `process` waits for one unit of `resource`
        #[must_use]
        pub fn request(process: impl Into<String>, resource: impl Into<String>) -> Self {
            Self {
                from: process.into(),
                to: resource.into(),
                kind: EdgeKind::Request,
                units: 1,
                title: None,
            }
        }

        /// One unit of `resource` is held by `process`
        #[must_use]
        pub fn allocation(resource: impl Into<String>, process: impl Into<String>) -> Self {
            Self {
                from: resource.into(),
                to: process.into(),
                kind: EdgeKind::Allocation,
                units: 1,
                title: None,
            }
        }

        /// Set the unit count
        #[must_use]
        pub fn with_units(mut self, units: u32) -> Self {
            self.units = units;
            self
        }
    }

    // =========================================================================
    // Graph document
    // =========================================================================

    /// Counts reported alongside exported graph data
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct GraphStats {
        /// Number of processes
        pub processes: usize,
        /// Number of resources
        pub resources: usize,
        /// Number of process/resource pairs with held units
        pub allocations: usize,
        /// Number of process/resource pairs with pending requests
        pub requests: usize,
    }

    /// A complete graph document: `{ "nodes": [...], "edges": [...] }`
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct GraphData {
        /// Declared nodes
        #[serde(default)]
        pub nodes: Vec<Node>,
        /// Directed edges
        #[serde(default)]
        pub edges: Vec<Edge>,
        /// Summary counts, present on exported documents
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub stats: Option<GraphStats>,
    }

    impl GraphData {
        /// Find a declared node by ID
        #[must_use]
        pub fn node(&self, id: &str) -> Option<&Node> {
            self.nodes.iter().find(|n| n.id == id)
        }

        /// Check if the document has no nodes and no edges
        #[must_use]
        pub fn is_empty(&self) -> bool {
            self.nodes.is_empty() && self.edges.is_empty()
        }
    }

    fn string_or_integer<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Id {
            Text(String),
            Signed(i64),
            Unsigned(u64),
        }

        Ok(match Id::deserialize(deserializer)? {
            Id::Text(s) => s,
            Id::Signed(n) => n.to_string(),
            Id::Unsigned(n) => n.to_string(),
        })
    }
}

/// Prelude for common imports
pub mod prelude {
    pub use crate::deadlock::{detect_deadlock, DeadlockPolicy, DeadlockReport, DetectOptions};
    pub use crate::detect::{Cycle, CycleDetector};
    pub use crate::graph::Adjacency;
    pub use crate::types::*;
    pub use crate::{Error, Result};
}
