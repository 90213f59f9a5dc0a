// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use ragraph::detect::CycleDetector;
use ragraph::graph::Adjacency;

#[derive(Debug, Arbitrary)]
struct EdgeList {
    edges: Vec<(u8, u8)>,
    limit: u8,
}

fuzz_target!(|input: EdgeList| {
    let mut graph = Adjacency::new();
    for (from, to) in &input.edges {
        graph.add_edge(&from.to_string(), &to.to_string(), None);
    }

    let cyclic = CycleDetector::has_cycle(&graph);
    assert_eq!(cyclic, rebuilt_verdict(&graph));

    let set = CycleDetector::simple_cycles(&graph, usize::from(input.limit));
    if input.limit > 0 {
        assert_eq!(cyclic, !set.cycles.is_empty());
    }
    for cycle in &set.cycles {
        for (from, to) in cycle.edges() {
            assert!(graph.successors(from).contains(&to));
        }
    }
});

/// Verdict after a round trip through the plain id mapping
fn rebuilt_verdict(graph: &Adjacency) -> bool {
    let mut rebuilt = Adjacency::new();
    for (from, tos) in graph.to_map() {
        rebuilt.add_node(&from, None);
        for to in &tos {
            rebuilt.add_edge(&from, to, None);
        }
    }
    CycleDetector::has_cycle(&rebuilt)
}
