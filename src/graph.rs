// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Adjacency structure for the allocation graph, with petgraph backing for algorithms

use crate::error::{Error, Result};
use crate::types::{Edge, EdgeKind, GraphData, NodeKind};
use petgraph::graph::{DiGraph, NodeIndex};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// A node as stored in the adjacency graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vertex {
    /// Node ID
    pub id: String,
    /// Declared kind; `None` for ids only seen in edges
    pub kind: Option<NodeKind>,
}

/// Directed adjacency: node id -> ordered successor ids.
///
/// Edges may name ids that were never declared. Those ids become nodes of
/// unknown kind. Repeated `(from, to)` pairs are stored once.
#[derive(Debug, Clone, Default)]
pub struct Adjacency {
    /// The underlying directed graph
    graph: DiGraph<Vertex, Option<EdgeKind>>,
    /// Map from node ID to node index
    node_indices: HashMap<String, NodeIndex>,
}

impl Adjacency {
    /// Create a new empty graph
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a graph document: declared nodes first, then edges
    #[must_use]
    pub fn from_graph_data(data: &GraphData) -> Self {
        let mut adjacency = Self::new();
        for node in &data.nodes {
            adjacency.add_node(&node.id, Some(node.kind));
        }
        for edge in &data.edges {
            adjacency.add_edge(&edge.from, &edge.to, Some(edge.kind));
        }
        adjacency
    }

    /// Build from an edge list alone
    pub fn from_edges<'a>(edges: impl IntoIterator<Item = &'a Edge>) -> Self {
        let mut adjacency = Self::new();
        for edge in edges {
            adjacency.add_edge(&edge.from, &edge.to, Some(edge.kind));
        }
        adjacency
    }

    /// Build from an untyped adjacency mapping such as `{"A": ["B"], "B": []}`.
    ///
    /// Successor ids may be strings or integers.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] if `value` is not an object, or a value in it
    /// is not an array of ids.
    pub fn from_json(value: &Value) -> Result<Self> {
        let map = match value {
            Value::Object(map) => map,
            Value::Null => return Err(Error::invalid_input("graph is missing")),
            other => {
                return Err(Error::invalid_input(format!(
                    "expected a mapping of node id to successor ids, found {}",
                    json_type(other)
                )))
            }
        };

        let mut adjacency = Self::new();
        for (id, successors) in map {
            adjacency.add_node(id, None);
            let list = successors.as_array().ok_or_else(|| {
                Error::invalid_input(format!(
                    "successors of '{id}' must be an array, found {}",
                    json_type(successors)
                ))
            })?;
            for successor in list {
                let to = id_from_value(successor).ok_or_else(|| {
                    Error::invalid_input(format!(
                        "successor of '{id}' must be a string or integer id, found {}",
                        json_type(successor)
                    ))
                })?;
                adjacency.add_edge(id, &to, None);
            }
        }
        Ok(adjacency)
    }

    /// Parse and build from JSON text
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] on malformed JSON or a non-mapping document.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_json(&value)
    }

    /// Add a node, or fill in the kind of a node first seen in an edge
    pub fn add_node(&mut self, id: &str, kind: Option<NodeKind>) -> NodeIndex {
        if let Some(&idx) = self.node_indices.get(id) {
            if kind.is_some() && self.graph[idx].kind.is_none() {
                self.graph[idx].kind = kind;
            }
            return idx;
        }
        let idx = self.graph.add_node(Vertex {
            id: id.to_string(),
            kind,
        });
        self.node_indices.insert(id.to_string(), idx);
        idx
    }

    /// Add a directed edge. Returns `false` if the pair was already present.
    pub fn add_edge(&mut self, from: &str, to: &str, kind: Option<EdgeKind>) -> bool {
        let from_idx = self.add_node(from, None);
        let to_idx = self.add_node(to, None);
        if self.graph.find_edge(from_idx, to_idx).is_some() {
            return false;
        }
        self.graph.add_edge(from_idx, to_idx, kind);
        true
    }

    /// Get node count
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Get edge count
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Check if the graph is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Check if a node exists
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.node_indices.contains_key(id)
    }

    /// Declared kind of a node
    #[must_use]
    pub fn kind_of(&self, id: &str) -> Option<NodeKind> {
        self.node_indices
            .get(id)
            .and_then(|&idx| self.graph[idx].kind)
    }

    /// Node ids in insertion order
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.graph.node_weights().map(|v| v.id.as_str())
    }

    /// Successors of a node in the order their edges were added
    #[must_use]
    pub fn successors(&self, id: &str) -> Vec<&str> {
        match self.node_indices.get(id) {
            Some(&idx) => self
                .successor_indices(idx)
                .into_iter()
                .map(|s| self.graph[s].id.as_str())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Snapshot as an ordered map, for stable output
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, Vec<String>> {
        self.graph
            .node_indices()
            .map(|idx| {
                let successors = self
                    .successor_indices(idx)
                    .into_iter()
                    .map(|s| self.graph[s].id.clone())
                    .collect();
                (self.graph[idx].id.clone(), successors)
            })
            .collect()
    }

    /// Copy keeping only edges that join a declared process and a declared
    /// resource. Node indices are unchanged.
    ///
    /// Every cycle of the result alternates between processes and resources,
    /// and every such cycle of `self` survives.
    #[must_use]
    pub fn alternating(&self) -> Self {
        let graph = self.graph.filter_map(
            |_, vertex| Some(vertex.clone()),
            |edge, kind| {
                let (from, to) = self.graph.edge_endpoints(edge)?;
                match (self.graph[from].kind, self.graph[to].kind) {
                    (Some(a), Some(b)) if a != b => Some(*kind),
                    _ => None,
                }
            },
        );
        Self {
            graph,
            node_indices: self.node_indices.clone(),
        }
    }

    /// Access to the petgraph backing
    #[must_use]
    pub fn inner(&self) -> &DiGraph<Vertex, Option<EdgeKind>> {
        &self.graph
    }

    /// Successor indices in insertion order.
    ///
    /// petgraph walks outgoing edges newest first, so the list is reversed.
    pub(crate) fn successor_indices(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut successors: Vec<NodeIndex> = self.graph.neighbors(idx).collect();
        successors.reverse();
        successors
    }
}

/// Graph input as received at the boundary: a full document or a bare mapping
#[derive(Debug, Clone)]
pub enum GraphInput {
    /// `{ "nodes": [...], "edges": [...] }`
    Document(GraphData),
    /// `{ "A": ["B"], ... }`
    Mapping(Adjacency),
}

impl GraphInput {
    /// Decide which shape `value` has and parse it.
    ///
    /// An object is a document when its `nodes` or `edges` key holds an
    /// array of objects; anything else is read as an adjacency mapping.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] if neither shape parses.
    pub fn from_json(value: Value) -> Result<Self> {
        if looks_like_document(&value) {
            let data: GraphData = serde_json::from_value(value)?;
            Ok(Self::Document(data))
        } else {
            Adjacency::from_json(&value).map(Self::Mapping)
        }
    }

    /// Parse JSON text
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] on malformed JSON or an unrecognised shape.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_json(value)
    }

    /// Build the adjacency used for detection
    #[must_use]
    pub fn to_adjacency(&self) -> Adjacency {
        match self {
            Self::Document(data) => Adjacency::from_graph_data(data),
            Self::Mapping(adjacency) => adjacency.clone(),
        }
    }

    /// The document, if the input carried one
    #[must_use]
    pub fn document(&self) -> Option<&GraphData> {
        match self {
            Self::Document(data) => Some(data),
            Self::Mapping(_) => None,
        }
    }
}

fn looks_like_document(value: &Value) -> bool {
    let Some(map) = value.as_object() else {
        return false;
    };
    ["nodes", "edges"].iter().any(|key| {
        map.get(*key)
            .and_then(Value::as_array)
            .is_some_and(|items| items.iter().all(Value::is_object))
    })
}

fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Node;
    use serde_json::json;

    #[test]
    fn test_add_edge_is_idempotent() {
        let mut graph = Adjacency::new();

        assert!(graph.add_edge("P1", "R1", Some(EdgeKind::Request)));
        assert!(!graph.add_edge("P1", "R1", Some(EdgeKind::Request)));

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_successors_keep_declaration_order() {
        let mut graph = Adjacency::new();
        graph.add_edge("A", "C", None);
        graph.add_edge("A", "B", None);
        graph.add_edge("A", "D", None);

        assert_eq!(graph.successors("A"), vec!["C", "B", "D"]);
        assert!(graph.successors("missing").is_empty());
    }

    #[test]
    fn test_undeclared_edge_endpoint_becomes_node() {
        let data = GraphData {
            nodes: vec![Node::process("P1")],
            edges: vec![Edge::request("P1", "R9")],
            stats: None,
        };

        let graph = Adjacency::from_graph_data(&data);

        assert!(graph.contains("R9"));
        assert_eq!(graph.kind_of("P1"), Some(NodeKind::Process));
        assert_eq!(graph.kind_of("R9"), None);
        assert!(graph.successors("R9").is_empty());
    }

    #[test]
    fn test_from_json_mapping() {
        let graph = Adjacency::from_json(&json!({"A": ["B", 3], "B": []})).unwrap();

        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.successors("A"), vec!["B", "3"]);
    }

    #[test]
    fn test_from_json_rejects_non_mapping() {
        for bad in [json!(null), json!([["A", "B"]]), json!("A->B"), json!(4)] {
            let err = Adjacency::from_json(&bad).unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)), "{bad} gave {err:?}");
        }
    }

    #[test]
    fn test_from_json_rejects_bad_successors() {
        let err = Adjacency::from_json(&json!({"A": "B"})).unwrap_err();
        assert!(err.to_string().contains("must be an array"));

        let err = Adjacency::from_json(&json!({"A": [{"id": "B"}]})).unwrap_err();
        assert!(err.to_string().contains("string or integer"));
    }

    #[test]
    fn test_from_json_str_maps_parse_errors() {
        let err = Adjacency::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_graph_input_detects_shape() {
        let doc = json!({
            "nodes": [{"id": "P1", "type": "process"}, {"id": 7, "type": "resource"}],
            "edges": [{"from": "P1", "to": 7, "type": "request"}]
        });
        let input = GraphInput::from_json(doc).unwrap();
        let data = input.document().expect("document");
        assert_eq!(data.nodes[1].id, "7");
        assert_eq!(data.edges[0].units, 1);

        let mapping = GraphInput::from_json(json!({"A": ["B"]})).unwrap();
        assert!(mapping.document().is_none());
        assert_eq!(mapping.to_adjacency().edge_count(), 1);
    }

    #[test]
    fn test_alternating_drops_same_kind_and_unknown_edges() {
        let data = GraphData {
            nodes: vec![Node::process("P1"), Node::process("P2"), Node::resource("R1")],
            edges: vec![
                Edge::request("P1", "P2"),
                Edge::request("P1", "R1"),
                Edge::allocation("R1", "P2"),
                Edge::request("P2", "ghost"),
            ],
            stats: None,
        };
        let graph = Adjacency::from_graph_data(&data);

        let strict = graph.alternating();

        assert_eq!(strict.node_count(), graph.node_count());
        assert_eq!(strict.edge_count(), 2);
        assert_eq!(strict.successors("P1"), vec!["R1"]);
        assert_eq!(strict.successors("R1"), vec!["P2"]);
        assert!(strict.successors("P2").is_empty());
        assert_eq!(strict.kind_of("R1"), Some(NodeKind::Resource));
    }

    #[test]
    fn test_to_map_is_sorted() {
        let mut graph = Adjacency::new();
        graph.add_edge("b", "a", None);
        graph.add_node("c", None);

        let map = graph.to_map();
        let keys: Vec<_> = map.keys().cloned().collect();

        assert_eq!(keys, vec!["a", "b", "c"]);
        assert_eq!(map["b"], vec!["a".to_string()]);
    }
}
