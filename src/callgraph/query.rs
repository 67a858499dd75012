//! Bounded graph traversals: `find_callers`, `find_callees`, `find_chain`,
//! `file_dependencies`, `file_dependents`.
//!
//! `find_callers`/`find_callees` generalize an impact-analysis
//! BFS-with-limits (queue of `(node, path, distance)`, visited set capped,
//! cycle pruning by path containment). `find_chain` mirrors the intent of a
//! shortest-path-between-two-symbols query but returns up to `max_paths`
//! distinct paths instead of a single result, ordered shortest-first with
//! deterministic lexicographic truncation.

use std::collections::{HashSet, VecDeque};

use petgraph::stable_graph::NodeIndex;
use petgraph::Direction;

use super::graph::CallGraph;

/// One reachable node from a traversal, with its distance from the origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathHit {
    pub qualified_name: String,
    pub distance: usize,
}

fn bounded_bfs(
    graph: &CallGraph,
    start: NodeIndex,
    direction: Direction,
    depth: usize,
    limit: usize,
) -> Vec<PathHit> {
    let mut visited = HashSet::new();
    visited.insert(start);
    let mut queue = VecDeque::new();
    queue.push_back((start, 0usize));
    let mut out = Vec::new();

    while let Some((node, dist)) = queue.pop_front() {
        if dist >= depth {
            continue;
        }
        let mut neighbors: Vec<NodeIndex> = graph
            .graph
            .neighbors_directed(node, direction)
            .filter(|n| !visited.contains(n))
            .collect();
        // Deterministic ordering: by qualified name, not graph insertion order.
        neighbors.sort_by(|a, b| graph.qname_of(*a).cmp(graph.qname_of(*b)));
        for next in neighbors {
            if visited.contains(&next) {
                continue;
            }
            visited.insert(next);
            out.push(PathHit {
                qualified_name: graph.qname_of(next).to_string(),
                distance: dist + 1,
            });
            if out.len() >= limit {
                return out;
            }
            queue.push_back((next, dist + 1));
        }
    }
    out
}

pub fn find_callers(graph: &CallGraph, project: &str, qname: &str, depth: usize, limit: usize) -> Vec<PathHit> {
    let Some(start) = graph.node_index(project, qname) else {
        return Vec::new();
    };
    bounded_bfs(graph, start, Direction::Incoming, depth, limit)
}

pub fn find_callees(graph: &CallGraph, project: &str, qname: &str, depth: usize, limit: usize) -> Vec<PathHit> {
    let Some(start) = graph.node_index(project, qname) else {
        return Vec::new();
    };
    bounded_bfs(graph, start, Direction::Outgoing, depth, limit)
}

/// Up to `max_paths` call chains from `from_qname` to `to_qname`, shortest
/// first, bounded by `max_depth`, paths simple (no repeated node).
pub fn find_chain(
    graph: &CallGraph,
    project: &str,
    from_qname: &str,
    to_qname: &str,
    max_paths: usize,
    max_depth: usize,
) -> Vec<Vec<String>> {
    if from_qname == to_qname {
        if graph.node_index(project, from_qname).is_some() {
            return vec![vec![from_qname.to_string()]];
        }
        return Vec::new();
    }
    let (Some(start), Some(target)) = (
        graph.node_index(project, from_qname),
        graph.node_index(project, to_qname),
    ) else {
        return Vec::new();
    };

    // BFS over paths (not just nodes) so multiple distinct routes to the
    // target can be discovered, capped to avoid combinatorial blowup on
    // dense graphs.
    const EXPLORED_CAP: usize = 5_000;
    let mut found: Vec<Vec<NodeIndex>> = Vec::new();
    let mut queue: VecDeque<Vec<NodeIndex>> = VecDeque::new();
    queue.push_back(vec![start]);
    let mut explored = 0usize;

    'bfs: while let Some(path) = queue.pop_front() {
        if path.len() - 1 >= max_depth {
            continue;
        }
        let current = *path.last().unwrap();
        let mut neighbors: Vec<NodeIndex> = graph.graph.neighbors_directed(current, Direction::Outgoing).collect();
        neighbors.sort_by(|a, b| graph.qname_of(*a).cmp(graph.qname_of(*b)));
        for next in neighbors {
            if path.contains(&next) {
                continue;
            }
            let mut extended = path.clone();
            extended.push(next);
            if next == target {
                found.push(extended.clone());
            } else {
                queue.push_back(extended);
            }
            explored += 1;
            if explored >= EXPLORED_CAP {
                break 'bfs;
            }
        }
    }

    found.sort_by(|a, b| {
        a.len().cmp(&b.len()).then_with(|| {
            let a_names: Vec<&str> = a.iter().map(|&n| graph.qname_of(n)).collect();
            let b_names: Vec<&str> = b.iter().map(|&n| graph.qname_of(n)).collect();
            a_names.cmp(&b_names)
        })
    });
    found.truncate(max_paths);
    found
        .into_iter()
        .map(|path| path.into_iter().map(|n| graph.qname_of(n).to_string()).collect())
        .collect()
}

pub fn file_dependencies(graph: &CallGraph, project: &str, path: &str) -> Vec<String> {
    let mut out: HashSet<String> = HashSet::new();
    for idx in graph.graph.node_indices() {
        let n = graph.node(idx);
        if n.project == project && n.node.file_path == path && !n.external {
            for (callee_idx, _) in graph.callees(idx) {
                let callee = graph.node(callee_idx);
                if callee.node.file_path != path && !callee.node.file_path.is_empty() {
                    out.insert(callee.node.file_path.clone());
                }
            }
        }
    }
    let mut out: Vec<String> = out.into_iter().collect();
    out.sort();
    out
}

pub fn file_dependents(graph: &CallGraph, project: &str, path: &str) -> Vec<String> {
    let mut out: HashSet<String> = HashSet::new();
    for idx in graph.graph.node_indices() {
        let n = graph.node(idx);
        if n.project == project && n.node.file_path == path {
            for (caller_idx, _) in graph.callers(idx) {
                let caller = graph.node(caller_idx);
                if caller.node.file_path != path && !caller.node.file_path.is_empty() {
                    out.insert(caller.node.file_path.clone());
                }
            }
        }
    }
    let mut out: Vec<String> = out.into_iter().collect();
    out.sort();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callgraph::graph::GraphEdge;
    use crate::model::{CallKind, FunctionNode};

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

    fn chain_graph() -> CallGraph {
        let mut g = CallGraph::new();
        let main = g.ensure_node("p", node("main", "main.rs"), false);
        let process = g.ensure_node("p", node("process", "process.rs"), false);
        let get_user = g.ensure_node("p", node("get_user", "user.rs"), false);
        let db_query = g.ensure_node("p", node("db_query", "db.rs"), false);
        for (a, b) in [(main, process), (process, get_user), (get_user, db_query)] {
            g.add_edge(
                a,
                b,
                GraphEdge {
                    kind: CallKind::Direct,
                    caller_file: "x".into(),
                    caller_line: 1,
                },
            );
        }
        g
    }

    #[test]
    fn find_chain_returns_full_sequence() {
        let g = chain_graph();
        let chains = find_chain(&g, "p", "main", "db_query", 5, 10);
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0], vec!["main", "process", "get_user", "db_query"]);
    }

    #[test]
    fn find_chain_respects_max_depth() {
        let g = chain_graph();
        let chains = find_chain(&g, "p", "main", "db_query", 5, 2);
        assert!(chains.is_empty());
    }

    #[test]
    fn find_callers_reports_distance_one_only() {
        let mut g = CallGraph::new();
        let auth = g.ensure_node("demo", node("authenticate", "auth.rs"), false);
        let login = g.ensure_node("demo", node("login_user", "auth.rs"), false);
        let api = g.ensure_node("demo", node("api_middleware", "mw.rs"), false);
        for caller in [login, api] {
            g.add_edge(
                caller,
                auth,
                GraphEdge {
                    kind: CallKind::Direct,
                    caller_file: "x".into(),
                    caller_line: 1,
                },
            );
        }
        let hits = find_callers(&g, "demo", "authenticate", 1, 10);
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.distance == 1));
    }
}
