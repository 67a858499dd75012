//! The directed graph backing the call-graph store: one node per
//! `(project, qualified_name)`, edges carrying [`crate::model::CallKind`] and
//! call-site location.
//!
//! Generalizes a single-project dependency graph (`petgraph::graph::DiGraph`,
//! forward/reverse adjacency via `edges_directed`, `kosaraju_scc` for cycle
//! detection) into a multi-project function-call graph. Uses
//! `StableDiGraph` rather than plain `DiGraph` because `remove_for_file`
//! removes nodes out of order and a swap-remove would silently invalidate
//! indices the store still holds in `node_index`.

use std::collections::HashMap;

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::Direction;

use crate::model::{CallKind, FunctionNode};

#[derive(Debug, Clone)]
pub struct GraphNode {
    pub project: String,
    pub node: FunctionNode,
    /// `true` for nodes created only as the target of a call whose own
    /// `FunctionNode` was never indexed (an external or unresolved callee).
    pub external: bool,
}

#[derive(Debug, Clone)]
pub struct GraphEdge {
    pub kind: CallKind,
    pub caller_file: String,
    pub caller_line: usize,
}

#[derive(Default)]
pub struct CallGraph {
    pub(crate) graph: StableDiGraph<GraphNode, GraphEdge>,
    pub(crate) index: HashMap<(String, String), NodeIndex>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_index(&self, project: &str, qname: &str) -> Option<NodeIndex> {
        self.index.get(&(project.to_string(), qname.to_string())).copied()
    }

    pub fn node(&self, idx: NodeIndex) -> &GraphNode {
        &self.graph[idx]
    }

    pub fn qname_of(&self, idx: NodeIndex) -> &str {
        &self.graph[idx].node.qualified_name
    }

    pub fn ensure_node(&mut self, project: &str, node: FunctionNode, external: bool) -> NodeIndex {
        let key = (project.to_string(), node.qualified_name.clone());
        if let Some(&idx) = self.index.get(&key) {
            if !external {
                self.graph[idx] = GraphNode {
                    project: project.to_string(),
                    node,
                    external: false,
                };
            }
            return idx;
        }
        let idx = self.graph.add_node(GraphNode {
            project: project.to_string(),
            node,
            external,
        });
        self.index.insert(key, idx);
        idx
    }

    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, edge: GraphEdge) {
        self.graph.add_edge(from, to, edge);
    }

    pub fn callees(&self, idx: NodeIndex) -> impl Iterator<Item = (NodeIndex, &GraphEdge)> {
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (e.target(), e.weight()))
    }

    pub fn callers(&self, idx: NodeIndex) -> impl Iterator<Item = (NodeIndex, &GraphEdge)> {
        self.graph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| (e.source(), e.weight()))
    }

    /// Remove every node owned by `file_path` within `project`. Nodes that
    /// only appear as call *targets* from other files are untouched, per the
    /// `remove_for_file` contract.
    pub fn remove_for_file(&mut self, project: &str, file_path: &str) {
        let to_remove: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|&idx| {
                let n = &self.graph[idx];
                n.project == project && n.node.file_path == file_path && !n.external
            })
            .collect();
        for idx in to_remove {
            let key = (project.to_string(), self.graph[idx].node.qualified_name.clone());
            self.graph.remove_node(idx);
            self.index.remove(&key);
        }
        // Prune now-orphaned external nodes (no remaining edges) created
        // solely as placeholders for callees from the removed file.
        let orphan_externals: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|&idx| {
                let n = &self.graph[idx];
                n.external
                    && self.graph.edges_directed(idx, Direction::Incoming).next().is_none()
                    && self.graph.edges_directed(idx, Direction::Outgoing).next().is_none()
            })
            .collect();
        for idx in orphan_externals {
            let key = (
                self.graph[idx].project.clone(),
                self.graph[idx].node.qualified_name.clone(),
            );
            self.graph.remove_node(idx);
            self.index.remove(&key);
        }
    }

    pub fn strongly_connected_components(&self, project: &str) -> Vec<Vec<String>> {
        petgraph::algo::kosaraju_scc(&self.graph)
            .into_iter()
            .filter(|component| component.len() > 1)
            .map(|component| {
                component
                    .into_iter()
                    .filter(|&idx| self.graph[idx].project == project)
                    .map(|idx| self.graph[idx].node.qualified_name.clone())
                    .collect::<Vec<_>>()
            })
            .filter(|component: &Vec<String>| component.len() > 1)
            .collect()
    }
}

use petgraph::visit::EdgeRef;
