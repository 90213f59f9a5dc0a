// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Deadlock verdicts built on cycle detection

use crate::detect::{Cycle, CycleDetector};
use crate::graph::Adjacency;
use crate::types::NodeKind;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeSet;
use tracing::debug;

/// Default cap on elementary cycles listed in a report
pub const DEFAULT_MAX_CYCLES: usize = 64;

/// Which cycles count as a deadlock
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeadlockPolicy {
    /// Any directed cycle, whatever the node and edge kinds
    #[default]
    AnyCycle,
    /// Only cycles alternating between declared processes and resources
    Alternating,
}

impl DeadlockPolicy {
    /// Parse a policy name
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "any-cycle" | "any" | "cycle" => Some(Self::AnyCycle),
            "alternating" | "strict" => Some(Self::Alternating),
            _ => None,
        }
    }

    /// Name as accepted by [`Self::parse`]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnyCycle => "any-cycle",
            Self::Alternating => "alternating",
        }
    }
}

/// Detection settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectOptions {
    /// Which cycles count
    pub policy: DeadlockPolicy,
    /// Cap on elementary cycles listed
    pub max_cycles: usize,
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self {
            policy: DeadlockPolicy::default(),
            max_cycles: DEFAULT_MAX_CYCLES,
        }
    }
}

/// Outcome of a deadlock check
#[derive(Debug, Clone, Serialize)]
pub struct DeadlockReport {
    /// Whether a qualifying cycle exists
    pub has_deadlock: bool,
    /// Human-readable summary
    pub message: String,
    /// Policy the verdict was reached under
    pub policy: DeadlockPolicy,
    /// First qualifying cycle found
    pub cycle: Option<Cycle>,
    /// Qualifying elementary cycles
    pub cycles: Vec<Cycle>,
    /// Processes on any listed cycle, sorted
    pub affected_processes: Vec<String>,
    /// Set when the cycle listing hit `max_cycles`
    pub truncated: bool,
}

impl DeadlockReport {
    /// Every node on a listed cycle
    #[must_use]
    pub fn affected_nodes(&self) -> BTreeSet<&str> {
        self.cycles
            .iter()
            .chain(self.cycle.iter())
            .flat_map(|c| c.members().iter().map(String::as_str))
            .collect()
    }
}

/// Run deadlock detection over a graph
#[must_use]
pub fn detect_deadlock(graph: &Adjacency, options: &DetectOptions) -> DeadlockReport {
    debug!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        policy = options.policy.as_str(),
        "checking for deadlock"
    );

    // every cycle of the alternating subgraph qualifies
    let scope = match options.policy {
        DeadlockPolicy::AnyCycle => Cow::Borrowed(graph),
        DeadlockPolicy::Alternating => Cow::Owned(graph.alternating()),
    };

    let (cycle, cycles, truncated) = match CycleDetector::find_cycle(&scope) {
        Some(witness) => {
            let set = CycleDetector::simple_cycles(&scope, options.max_cycles);
            (Some(witness), set.cycles, set.truncated)
        }
        None => (None, Vec::new(), false),
    };

    let affected_processes: Vec<String> = cycles
        .iter()
        .chain(cycle.iter())
        .flat_map(Cycle::members)
        .filter(|id| match graph.kind_of(id) {
            Some(NodeKind::Process) => true,
            Some(NodeKind::Resource) => false,
            None => options.policy == DeadlockPolicy::AnyCycle,
        })
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let has_deadlock = cycle.is_some();
    debug!(
        has_deadlock,
        cycles = cycles.len(),
        truncated,
        "deadlock check finished"
    );

    DeadlockReport {
        has_deadlock,
        message: if has_deadlock {
            "Cycles detected in the resource allocation graph.".into()
        } else {
            "No cycles detected.".into()
        },
        policy: options.policy,
        cycle,
        cycles,
        affected_processes,
        truncated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Edge, GraphData, Node};

    fn circular_wait() -> GraphData {
        GraphData {
            nodes: vec![
                Node::process("P1"),
                Node::process("P2"),
                Node::resource("R1"),
                Node::resource("R2"),
            ],
            edges: vec![
                Edge::allocation("R1", "P1"),
                Edge::request("P1", "R2"),
                Edge::allocation("R2", "P2"),
                Edge::request("P2", "R1"),
            ],
            stats: None,
        }
    }

    #[test]
    fn test_circular_wait_is_deadlock() {
        let graph = Adjacency::from_graph_data(&circular_wait());

        for policy in [DeadlockPolicy::AnyCycle, DeadlockPolicy::Alternating] {
            let options = DetectOptions { policy, ..DetectOptions::default() };
            let report = detect_deadlock(&graph, &options);

            assert!(report.has_deadlock, "{policy:?}");
            assert_eq!(report.affected_processes, vec!["P1", "P2"]);
            assert_eq!(report.cycles.len(), 1);
            assert_eq!(report.message, "Cycles detected in the resource allocation graph.");
        }
    }

    #[test]
    fn test_no_deadlock_message() {
        let mut data = circular_wait();
        data.edges.pop();
        let report = detect_deadlock(&Adjacency::from_graph_data(&data), &DetectOptions::default());

        assert!(!report.has_deadlock);
        assert!(report.cycle.is_none());
        assert!(report.affected_processes.is_empty());
        assert_eq!(report.message, "No cycles detected.");
    }

    #[test]
    fn test_alternating_ignores_process_to_process_cycle() {
        let data = GraphData {
            nodes: vec![Node::process("P1"), Node::process("P2")],
            edges: vec![Edge::request("P1", "P2"), Edge::request("P2", "P1")],
            stats: None,
        };
        let graph = Adjacency::from_graph_data(&data);

        let any = detect_deadlock(&graph, &DetectOptions::default());
        assert!(any.has_deadlock);

        let strict = detect_deadlock(
            &graph,
            &DetectOptions { policy: DeadlockPolicy::Alternating, ..DetectOptions::default() },
        );
        assert!(!strict.has_deadlock);
        assert!(strict.cycles.is_empty());
    }

    #[test]
    fn test_zero_cap_still_gives_verdict() {
        let graph = Adjacency::from_graph_data(&circular_wait());

        for policy in [DeadlockPolicy::AnyCycle, DeadlockPolicy::Alternating] {
            let report = detect_deadlock(&graph, &DetectOptions { policy, max_cycles: 0 });

            assert!(report.has_deadlock, "{policy:?}");
            assert!(report.cycles.is_empty());
            assert!(report.truncated);
            assert_eq!(report.cycle.as_ref().map(Cycle::len), Some(4));
            assert_eq!(report.affected_processes, vec!["P1", "P2"]);
        }
    }

    #[test]
    fn test_alternating_cap_counts_only_qualifying_cycles() {
        let mut data = GraphData::default();
        // process-only loops declared ahead of the real circular wait
        for i in 0..DEFAULT_MAX_CYCLES {
            let (a, b) = (format!("Q{i}a"), format!("Q{i}b"));
            data.nodes.push(Node::process(a.clone()));
            data.nodes.push(Node::process(b.clone()));
            data.edges.push(Edge::request(a.clone(), b.clone()));
            data.edges.push(Edge::request(b, a));
        }
        let wait = circular_wait();
        data.nodes.extend(wait.nodes);
        data.edges.extend(wait.edges);
        let graph = Adjacency::from_graph_data(&data);

        let report = detect_deadlock(
            &graph,
            &DetectOptions { policy: DeadlockPolicy::Alternating, ..DetectOptions::default() },
        );

        assert!(report.has_deadlock);
        assert_eq!(report.cycles.len(), 1);
        assert!(!report.truncated);
        assert_eq!(report.affected_processes, vec!["P1", "P2"]);

        let any = detect_deadlock(&graph, &DetectOptions::default());
        assert!(any.truncated);
        assert_eq!(any.cycles.len(), DEFAULT_MAX_CYCLES);
    }

    #[test]
    fn test_undeclared_nodes_count_as_processes_only_for_any_cycle() {
        let mut graph = Adjacency::new();
        graph.add_edge("x", "y", None);
        graph.add_edge("y", "x", None);

        let report = detect_deadlock(&graph, &DetectOptions::default());
        assert_eq!(report.affected_processes, vec!["x", "y"]);
        assert_eq!(report.affected_nodes().len(), 2);
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(DeadlockPolicy::parse("Alternating"), Some(DeadlockPolicy::Alternating));
        assert_eq!(DeadlockPolicy::parse("any-cycle"), Some(DeadlockPolicy::AnyCycle));
        assert_eq!(DeadlockPolicy::parse("banker"), None);
    }

    #[test]
    fn test_report_serializes_cycles_as_arrays() {
        let graph = Adjacency::from_graph_data(&circular_wait());
        let report = detect_deadlock(&graph, &DetectOptions::default());
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["has_deadlock"], true);
        assert_eq!(json["policy"], "any-cycle");
        assert_eq!(json["cycle"].as_array().unwrap().len(), 5);
    }
}
