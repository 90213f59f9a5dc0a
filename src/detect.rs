// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Cycle detection over the allocation graph
//!
//! Traversal is a three-colour depth-first search driven by an explicit
//! stack of frames, so graph depth is bounded by heap rather than by the
//! call stack. Each call owns its working state; nothing is cached.

use crate::error::Result;
use crate::graph::Adjacency;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// Not reached yet
    White,
    /// On the active path
    Gray,
    /// Fully explored
    Black,
}

/// One node on the traversal stack
struct Frame {
    node: NodeIndex,
    successors: Vec<NodeIndex>,
    next: usize,
}

impl Frame {
    fn new(graph: &Adjacency, node: NodeIndex) -> Self {
        Self {
            node,
            successors: graph.successor_indices(node),
            next: 0,
        }
    }

    fn advance(&mut self) -> Option<NodeIndex> {
        let successor = self.successors.get(self.next).copied();
        self.next += 1;
        successor
    }
}

/// A closed cycle: the first and last ids are equal
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cycle {
    nodes: Vec<String>,
}

impl Cycle {
    fn closed(graph: &Adjacency, path: impl IntoIterator<Item = NodeIndex>) -> Self {
        let inner = graph.inner();
        let mut nodes: Vec<String> = path.into_iter().map(|idx| inner[idx].id.clone()).collect();
        if let Some(first) = nodes.first().cloned() {
            nodes.push(first);
        }
        Self { nodes }
    }

    /// The full closed sequence, e.g. `[A, B, A]`
    #[must_use]
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// Distinct members, without the closing repeat
    #[must_use]
    pub fn members(&self) -> &[String] {
        &self.nodes[..self.nodes.len().saturating_sub(1)]
    }

    /// Number of edges in the cycle
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }

    /// Always false for a cycle produced by the detector
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consecutive `(from, to)` pairs, closing edge included
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.nodes
            .windows(2)
            .map(|pair| (pair[0].as_str(), pair[1].as_str()))
    }

    /// Check if a node lies on the cycle
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.members().iter().any(|n| n == id)
    }
}

impl std::fmt::Display for Cycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.nodes.join(" -> "))
    }
}

impl Serialize for Cycle {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.nodes.serialize(serializer)
    }
}

/// Elementary cycles found by [`CycleDetector::simple_cycles`]
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleSet {
    /// Cycles in discovery order
    pub cycles: Vec<Cycle>,
    /// Set when the search stopped at the limit
    pub truncated: bool,
}

/// Directed cycle detection
pub struct CycleDetector;

impl CycleDetector {
    /// Check whether the graph contains a directed cycle
    #[must_use]
    pub fn has_cycle(graph: &Adjacency) -> bool {
        Self::find_cycle(graph).is_some()
    }

    /// Find one cycle, if any.
    ///
    /// Roots are tried in node insertion order and successors in edge
    /// insertion order, so the reported cycle is stable for a given graph.
    /// The search stops at the first back-edge; the cycle runs from the
    /// ancestor it points at down to the current node and back.
    #[must_use]
    pub fn find_cycle(graph: &Adjacency) -> Option<Cycle> {
        let inner = graph.inner();
        let mut color = vec![Color::White; inner.node_count()];
        let mut path: Vec<Frame> = Vec::new();

        for root in inner.node_indices() {
            if color[root.index()] != Color::White {
                continue;
            }
            color[root.index()] = Color::Gray;
            path.push(Frame::new(graph, root));

            while let Some(frame) = path.last_mut() {
                let Some(next) = frame.advance() else {
                    color[frame.node.index()] = Color::Black;
                    path.pop();
                    continue;
                };

                match color[next.index()] {
                    Color::White => {
                        color[next.index()] = Color::Gray;
                        path.push(Frame::new(graph, next));
                    }
                    Color::Gray => {
                        if let Some(start) = path.iter().position(|f| f.node == next) {
                            return Some(Cycle::closed(
                                graph,
                                path[start..].iter().map(|f| f.node),
                            ));
                        }
                    }
                    Color::Black => {}
                }
            }
        }

        None
    }

    /// [`Self::has_cycle`] over an untyped adjacency mapping
    ///
    /// # Errors
    ///
    /// [`crate::Error::InvalidInput`] if `value` is not a mapping of id to
    /// an array of ids.
    pub fn has_cycle_json(value: &Value) -> Result<bool> {
        Adjacency::from_json(value).map(|graph| Self::has_cycle(&graph))
    }

    /// [`Self::find_cycle`] over an untyped adjacency mapping
    ///
    /// # Errors
    ///
    /// [`crate::Error::InvalidInput`] if `value` is not a mapping of id to
    /// an array of ids.
    pub fn find_cycle_json(value: &Value) -> Result<Option<Cycle>> {
        Adjacency::from_json(value).map(|graph| Self::find_cycle(&graph))
    }

    /// Enumerate elementary cycles, at most `limit` of them.
    ///
    /// Johnson's circuit search. Each strongly connected component is
    /// searched from its lowest-index node; nodes that cannot currently get
    /// back to that root stay blocked until a cycle through them is found,
    /// so the work between two reported cycles is linear in the component.
    /// The root is then removed and the rest of the component is split
    /// again. Every cycle is rooted at its lowest-index node, so rotations
    /// are reported once.
    #[must_use]
    pub fn simple_cycles(graph: &Adjacency, limit: usize) -> CycleSet {
        let mut set = CycleSet::default();
        if limit == 0 {
            set.truncated = Self::has_cycle(graph);
            return set;
        }

        let all: Vec<NodeIndex> = graph.inner().node_indices().collect();
        let mut pending = cyclic_components(graph, &all);
        let mut search = CircuitSearch::new(graph.node_count());

        while let Some(mut component) = pending.pop() {
            component.sort_unstable();
            let root = component[0];

            search.enter(&component);
            let full = search.circuits(graph, root, limit, &mut set.cycles);
            search.leave(&component);

            if full {
                set.truncated = true;
                return set;
            }
            pending.extend(cyclic_components(graph, &component[1..]));
        }

        set
    }
}

/// Working state of Johnson's search, indexed by node index
struct CircuitSearch {
    in_scope: Vec<bool>,
    blocked: Vec<bool>,
    closed: Vec<bool>,
    /// Nodes to unblock once the keyed node is unblocked
    waiting: Vec<HashSet<usize>>,
}

impl CircuitSearch {
    fn new(size: usize) -> Self {
        Self {
            in_scope: vec![false; size],
            blocked: vec![false; size],
            closed: vec![false; size],
            waiting: vec![HashSet::new(); size],
        }
    }

    fn enter(&mut self, component: &[NodeIndex]) {
        for node in component {
            self.in_scope[node.index()] = true;
        }
    }

    fn leave(&mut self, component: &[NodeIndex]) {
        for node in component {
            let i = node.index();
            self.in_scope[i] = false;
            self.blocked[i] = false;
            self.closed[i] = false;
            self.waiting[i].clear();
        }
    }

    fn frame(&self, graph: &Adjacency, node: NodeIndex) -> Frame {
        let mut frame = Frame::new(graph, node);
        frame.successors.retain(|s| self.in_scope[s.index()]);
        frame
    }

    /// Cycles through `root` inside the current scope, appended to `out`.
    /// Returns `true` once `out` holds `limit` cycles.
    fn circuits(
        &mut self,
        graph: &Adjacency,
        root: NodeIndex,
        limit: usize,
        out: &mut Vec<Cycle>,
    ) -> bool {
        let mut path = vec![self.frame(graph, root)];
        self.blocked[root.index()] = true;

        while let Some(frame) = path.last_mut() {
            let Some(next) = frame.advance() else {
                if let Some(done) = path.pop() {
                    self.retire(&done);
                }
                continue;
            };

            if next == root {
                out.push(Cycle::closed(graph, path.iter().map(|f| f.node)));
                for f in &path {
                    self.closed[f.node.index()] = true;
                }
                if out.len() >= limit {
                    return true;
                }
            } else if !self.blocked[next.index()] {
                self.blocked[next.index()] = true;
                self.closed[next.index()] = false;
                let frame = self.frame(graph, next);
                path.push(frame);
            }
        }

        false
    }

    /// A node whose successors are exhausted: unblock it if it lies on a
    /// found cycle, otherwise park it behind each successor.
    fn retire(&mut self, frame: &Frame) {
        let node = frame.node.index();
        if self.closed[node] {
            self.unblock(node);
        } else {
            for s in &frame.successors {
                self.waiting[s.index()].insert(node);
            }
        }
    }

    fn unblock(&mut self, node: usize) {
        let mut stack = vec![node];
        while let Some(n) = stack.pop() {
            if self.blocked[n] {
                self.blocked[n] = false;
                stack.extend(self.waiting[n].drain());
            }
        }
    }
}

/// Strongly connected components among `members` that contain a cycle:
/// more than one node, or a single node with a self-loop.
fn cyclic_components(graph: &Adjacency, members: &[NodeIndex]) -> Vec<Vec<NodeIndex>> {
    let inner = graph.inner();
    let mut sub: DiGraph<NodeIndex, ()> = DiGraph::with_capacity(members.len(), 0);
    let mut local: HashMap<NodeIndex, NodeIndex> = HashMap::with_capacity(members.len());
    for &node in members {
        local.insert(node, sub.add_node(node));
    }
    for &node in members {
        let from = local[&node];
        for succ in inner.neighbors(node) {
            if let Some(&to) = local.get(&succ) {
                sub.update_edge(from, to, ());
            }
        }
    }

    petgraph::algo::tarjan_scc(&sub)
        .into_iter()
        .filter(|scc| scc.len() > 1 || sub.find_edge(scc[0], scc[0]).is_some())
        .map(|scc| scc.into_iter().map(|idx| sub[idx]).collect())
        .collect()
}
