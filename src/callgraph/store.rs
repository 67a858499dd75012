//! Call-Graph Store: persists `FunctionNode`/`CallSite` records and answers
//! structural queries over the in-memory adjacency built from them (spec
//! §4.5).
//!
//! Persistence follows a `to_serializable`/`from_serializable` pair: the
//! graph lives in memory for the life of the process, snapshotted to disk
//! with `bincode` so a restart doesn't require a full re-index.

use std::path::Path;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::model::{CallSite, FunctionNode, InterfaceImplementation};

use super::graph::{CallGraph, GraphEdge};
use super::query;

#[derive(Serialize, Deserialize)]
struct SerializableNode {
    project: String,
    node: FunctionNode,
    external: bool,
}

#[derive(Serialize, Deserialize)]
struct SerializableEdge {
    from: String,
    to: String,
    project: String,
    kind: crate::model::CallKind,
    caller_file: String,
    caller_line: usize,
}

#[derive(Serialize, Deserialize, Default)]
struct Snapshot {
    nodes: Vec<SerializableNode>,
    edges: Vec<SerializableEdge>,
    implementations: Vec<InterfaceImplementation>,
}

pub struct CallGraphStore {
    inner: RwLock<CallGraph>,
    implementations: RwLock<Vec<(String, InterfaceImplementation)>>,
}

impl CallGraphStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(CallGraph::new()),
            implementations: RwLock::new(Vec::new()),
        }
    }

    /// Insert or replace `FunctionNode`s. One node per qualified name per
    /// project; re-upserting an existing qname overwrites its attributes.
    pub fn upsert_nodes(&self, project: &str, nodes: Vec<FunctionNode>) -> EngineResult<()> {
        let mut graph = self.inner.write();
        for node in nodes {
            graph.ensure_node(project, node, false);
        }
        Ok(())
    }

    /// Insert call edges. A callee that has no matching `FunctionNode` yet
    /// gets a placeholder external node so the edge can still be recorded;
    /// external calls are expected, not an error.
    pub fn upsert_calls(&self, project: &str, calls: Vec<CallSite>) -> EngineResult<()> {
        let mut graph = self.inner.write();
        for call in calls {
            let from = graph
                .node_index(project, &call.caller_qname)
                .ok_or_else(|| {
                    EngineError::internal(format!(
                        "call site references unknown caller `{}`; upsert_nodes must run before upsert_calls",
                        call.caller_qname
                    ))
                })?;
            let to = match graph.node_index(project, &call.callee_qname) {
                Some(idx) => idx,
                None => graph.ensure_node(
                    project,
                    FunctionNode {
                        qualified_name: call.callee_qname.clone(),
                        name: call.callee_qname.clone(),
                        file_path: String::new(),
                        language: String::new(),
                        start_line: 0,
                        end_line: 0,
                        params: Vec::new(),
                        return_type: None,
                        is_exported: false,
                        is_async: false,
                    },
                    true,
                ),
            };
            graph.add_edge(
                from,
                to,
                GraphEdge {
                    kind: call.kind,
                    caller_file: call.caller_file,
                    caller_line: call.caller_line,
                },
            );
        }
        Ok(())
    }

    pub fn upsert_implementations(&self, project: &str, impls: Vec<InterfaceImplementation>) {
        let mut guard = self.implementations.write();
        guard.retain(|(p, i)| !(p == project && impls.iter().any(|n| n.interface_qname == i.interface_qname && n.concrete_qname == i.concrete_qname)));
        guard.extend(impls.into_iter().map(|i| (project.to_string(), i)));
    }

    /// Remove all nodes/calls owned by `file_path`; callees referenced only
    /// from other files are left in place.
    pub fn remove_for_file(&self, project: &str, file_path: &str) -> EngineResult<()> {
        self.inner.write().remove_for_file(project, file_path);
        self.implementations
            .write()
            .retain(|(p, i)| !(p == project && i.concrete_qname.starts_with(file_path)));
        Ok(())
    }

    pub fn find_callers(&self, project: &str, qname: &str, depth: usize, limit: usize) -> Vec<query::PathHit> {
        query::find_callers(&self.inner.read(), project, qname, depth, limit)
    }

    pub fn find_callees(&self, project: &str, qname: &str, depth: usize, limit: usize) -> Vec<query::PathHit> {
        query::find_callees(&self.inner.read(), project, qname, depth, limit)
    }

    pub fn find_chain(
        &self,
        project: &str,
        from_qname: &str,
        to_qname: &str,
        max_paths: usize,
        max_depth: usize,
    ) -> Vec<Vec<String>> {
        query::find_chain(&self.inner.read(), project, from_qname, to_qname, max_paths, max_depth)
    }

    pub fn find_implementations(&self, project: &str, interface_qname: &str) -> Vec<InterfaceImplementation> {
        self.implementations
            .read()
            .iter()
            .filter(|(p, i)| p == project && i.interface_qname == interface_qname)
            .map(|(_, i)| i.clone())
            .collect()
    }

    pub fn file_dependencies(&self, project: &str, path: &str) -> Vec<String> {
        query::file_dependencies(&self.inner.read(), project, path)
    }

    pub fn file_dependents(&self, project: &str, path: &str) -> Vec<String> {
        query::file_dependents(&self.inner.read(), project, path)
    }

    pub fn circular_dependencies(&self, project: &str) -> Vec<Vec<String>> {
        self.inner.read().strongly_connected_components(project)
    }

    pub fn save_to_path(&self, path: &Path) -> EngineResult<()> {
        let graph = self.inner.read();
        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        for idx in graph.graph.node_indices() {
            let n = graph.node(idx);
            nodes.push(SerializableNode {
                project: n.project.clone(),
                node: n.node.clone(),
                external: n.external,
            });
        }
        for edge_ref in petgraph_edges(&graph) {
            edges.push(edge_ref);
        }
        let snapshot = Snapshot {
            nodes,
            edges,
            implementations: self
                .implementations
                .read()
                .iter()
                .map(|(_, i)| i.clone())
                .collect(),
        };
        let bytes = bincode::serialize(&snapshot)
            .map_err(|e| EngineError::internal(format!("call graph snapshot encode failed: {e}")))?;
        std::fs::write(path, bytes)
            .map_err(|e| EngineError::storage("callgraph_snapshot_write", e))?;
        Ok(())
    }

    pub fn load_from_path(&self, path: &Path) -> EngineResult<()> {
        let bytes = std::fs::read(path).map_err(|e| EngineError::storage("callgraph_snapshot_read", e))?;
        let snapshot: Snapshot = bincode::deserialize(&bytes)
            .map_err(|e| EngineError::internal(format!("call graph snapshot decode failed: {e}")))?;
        let mut graph = self.inner.write();
        *graph = CallGraph::new();
        for n in snapshot.nodes {
            graph.ensure_node(&n.project, n.node, n.external);
        }
        for e in snapshot.edges {
            let from = graph
                .node_index(&e.project, &e.from)
                .ok_or_else(|| EngineError::internal("snapshot edge references missing caller node"))?;
            let to = graph
                .node_index(&e.project, &e.to)
                .ok_or_else(|| EngineError::internal("snapshot edge references missing callee node"))?;
            graph.add_edge(
                from,
                to,
                GraphEdge {
                    kind: e.kind,
                    caller_file: e.caller_file,
                    caller_line: e.caller_line,
                },
            );
        }
        drop(graph);
        *self.implementations.write() = snapshot
            .implementations
            .into_iter()
            .map(|i| (i.concrete_qname.clone(), i))
            .collect();
        Ok(())
    }
}

impl Default for CallGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

fn petgraph_edges(graph: &CallGraph) -> Vec<SerializableEdge> {
    use petgraph::visit::EdgeRef;
    graph
        .graph
        .edge_references()
        .map(|e| {
            let source = &graph.graph[e.source()];
            let target = &graph.graph[e.target()];
            SerializableEdge {
                from: source.node.qualified_name.clone(),
                to: target.node.qualified_name.clone(),
                project: source.project.clone(),
                kind: e.weight().kind,
                caller_file: e.weight().caller_file.clone(),
                caller_line: e.weight().caller_line,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CallKind;

    fn node(qname: &str, file: &str) -> FunctionNode {
        FunctionNode {
            qualified_name: qname.to_string(),
            name: qname.to_string(),
            file_path: file.to_string(),
            language: "rust".to_string(),
            start_line: 1,
            end_line: 2,
            params: vec![],
            return_type: None,
            is_exported: true,
            is_async: false,
        }
    }

    fn call(caller: &str, callee: &str, file: &str) -> CallSite {
        CallSite {
            caller_qname: caller.to_string(),
            callee_qname: callee.to_string(),
            caller_file: file.to_string(),
            caller_line: 10,
            kind: CallKind::Direct,
        }
    }

    #[test]
    fn remove_for_file_drops_only_owned_nodes() {
        let store = CallGraphStore::new();
        store
            .upsert_nodes("p", vec![node("main", "a.rs"), node("helper", "b.rs")])
            .unwrap();
        store.upsert_calls("p", vec![call("main", "helper", "a.rs")]).unwrap();
        store.remove_for_file("p", "a.rs").unwrap();
        assert!(store.find_callees("p", "main", 1, 10).is_empty());
        assert_eq!(store.find_callers("p", "helper", 1, 10).len(), 0);
    }

    #[test]
    fn find_chain_self_loop_is_length_one() {
        let store = CallGraphStore::new();
        store.upsert_nodes("p", vec![node("a", "f.rs")]).unwrap();
        let chains = store.find_chain("p", "a", "a", 5, 10);
        assert_eq!(chains, vec![vec!["a".to_string()]]);
    }
}
