use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, TableKey};
use crate::error::{Error, Result};

/// Summary of FK graph structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FkGraphSummary {
    pub nodes: usize,
    pub edges: usize,
}

/// Report for FK dependency ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FkGraphReport {
    pub summary: FkGraphSummary,
    pub topo_order: Option<Vec<String>>,
    pub cycle: Option<Vec<String>>,
}

/// Build a deterministic FK dependency report for a catalog.
pub fn build_fk_graph_report(catalog: &Catalog) -> FkGraphReport {
    let graph = DependencyGraph::from_catalog(catalog);
    let summary = FkGraphSummary {
        nodes: graph.len(),
        edges: graph.edge_count(),
    };

    match resolve_order(&graph) {
        Ok(order) => FkGraphReport {
            summary,
            topo_order: Some(order.iter().map(ToString::to_string).collect()),
            cycle: None,
        },
        Err(Error::CyclicDependency { cycle }) => FkGraphReport {
            summary,
            topo_order: None,
            cycle: Some(cycle.iter().map(ToString::to_string).collect()),
        },
        Err(_) => FkGraphReport {
            summary,
            topo_order: None,
            cycle: None,
        },
    }
}

/// Child -> parent dependency graph with nodes kept in discovery order.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<TableKey>,
    index: HashMap<TableKey, usize>,
    parents: Vec<Vec<usize>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Graph of every catalog table and the parents it references.
    pub fn from_catalog(catalog: &Catalog) -> Self {
        Self::from_parent_map(catalog.parent_map())
    }

    pub fn from_parent_map<I, P>(entries: I) -> Self
    where
        I: IntoIterator<Item = (TableKey, P)>,
        P: IntoIterator<Item = TableKey>,
    {
        let mut graph = Self::new();
        for (table, parents) in entries {
            graph.add_table(table, parents);
        }
        graph
    }

    /// Register `table` and its parents. Self references are ignored.
    pub fn add_table(&mut self, table: TableKey, parents: impl IntoIterator<Item = TableKey>) {
        let child = self.intern(table);
        for parent in parents {
            let parent = self.intern(parent);
            if parent != child && !self.parents[child].contains(&parent) {
                self.parents[child].push(parent);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.parents.iter().map(Vec::len).sum()
    }

    pub fn nodes(&self) -> &[TableKey] {
        &self.nodes
    }

    fn intern(&mut self, key: TableKey) -> usize {
        if let Some(idx) = self.index.get(&key) {
            return *idx;
        }
        let idx = self.nodes.len();
        self.index.insert(key.clone(), idx);
        self.nodes.push(key);
        self.parents.push(Vec::new());
        idx
    }
}

/// Order tables so every parent precedes its children (Kahn's algorithm).
///
/// Ties are broken by discovery order. A cycle yields `Error::CyclicDependency`
/// carrying one concrete cycle from the unresolved subgraph.
pub fn resolve_order(graph: &DependencyGraph) -> Result<Vec<TableKey>> {
    let count = graph.nodes.len();
    let mut indegree = vec![0_usize; count];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];

    for (child, parents) in graph.parents.iter().enumerate() {
        indegree[child] = parents.len();
        for parent in parents {
            dependents[*parent].push(child);
        }
    }

    let mut queue: VecDeque<usize> = (0..count).filter(|idx| indegree[*idx] == 0).collect();
    let mut order = Vec::with_capacity(count);

    while let Some(node) = queue.pop_front() {
        order.push(graph.nodes[node].clone());
        for dependent in &dependents[node] {
            indegree[*dependent] -= 1;
            if indegree[*dependent] == 0 {
                queue.push_back(*dependent);
            }
        }
    }

    if order.len() == count {
        return Ok(order);
    }

    let cycle = find_cycle(graph, &indegree)
        .into_iter()
        .map(|idx| graph.nodes[idx].clone())
        .collect();
    Err(Error::CyclicDependency { cycle })
}

/// Walk unresolved parent edges until a node repeats. Every unresolved node keeps at
/// least one unresolved parent, so the walk always closes a loop.
fn find_cycle(graph: &DependencyGraph, indegree: &[usize]) -> Vec<usize> {
    let Some(start) = (0..indegree.len()).find(|idx| indegree[*idx] > 0) else {
        return Vec::new();
    };

    let mut path = Vec::new();
    let mut seen_at: HashMap<usize, usize> = HashMap::new();
    let mut current = start;

    loop {
        if let Some(position) = seen_at.get(&current) {
            return path[*position..].to_vec();
        }
        seen_at.insert(current, path.len());
        path.push(current);

        match graph.parents[current]
            .iter()
            .find(|parent| indegree[**parent] > 0)
        {
            Some(parent) => current = *parent,
            None => return path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> TableKey {
        TableKey::new("public", name)
    }

    fn graph(entries: &[(&str, &[&str])]) -> DependencyGraph {
        DependencyGraph::from_parent_map(entries.iter().map(|(table, parents)| {
            (
                key(table),
                parents.iter().map(|p| key(p)).collect::<Vec<_>>(),
            )
        }))
    }

    #[test]
    fn parents_precede_children() {
        let graph = graph(&[
            ("orders", &["users", "products"]),
            ("order_items", &["orders", "products"]),
            ("users", &[]),
            ("products", &["vendors"]),
        ]);
        let order = resolve_order(&graph).expect("acyclic");
        assert_eq!(order.len(), 6);

        let position = |name: &str| order.iter().position(|k| k.table == name).unwrap();
        for (child, parents) in [
            ("orders", vec!["users", "products"]),
            ("order_items", vec!["orders", "products"]),
            ("products", vec!["vendors"]),
        ] {
            for parent in parents {
                assert!(position(parent) < position(child), "{parent} before {child}");
            }
        }
    }

    #[test]
    fn ties_follow_discovery_order() {
        let graph = graph(&[("c", &[]), ("a", &[]), ("b", &[])]);
        let order = resolve_order(&graph).expect("acyclic");
        let names: Vec<&str> = order.iter().map(|k| k.table.as_str()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn dependency_only_nodes_are_ordered() {
        let graph = graph(&[("child", &["external"])]);
        let order = resolve_order(&graph).expect("acyclic");
        let names: Vec<&str> = order.iter().map(|k| k.table.as_str()).collect();
        assert_eq!(names, vec!["external", "child"]);
    }

    #[test]
    fn self_reference_is_not_a_cycle() {
        let graph = graph(&[("employees", &["employees"])]);
        assert_eq!(graph.edge_count(), 0);
        assert!(resolve_order(&graph).is_ok());
    }

    #[test]
    fn three_table_cycle_is_reported_in_order() {
        let graph = graph(&[("a", &["b"]), ("b", &["c"]), ("c", &["a"]), ("d", &[])]);
        let err = resolve_order(&graph).expect_err("cycle");
        let Error::CyclicDependency { cycle } = err else {
            panic!("expected cycle error");
        };
        let names: Vec<&str> = cycle.iter().map(|k| k.table.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn cycle_witness_skips_downstream_tables() {
        let graph = graph(&[("tail", &["x"]), ("x", &["y"]), ("y", &["x"])]);
        let Err(Error::CyclicDependency { cycle }) = resolve_order(&graph) else {
            panic!("expected cycle error");
        };
        let mut names: Vec<&str> = cycle.iter().map(|k| k.table.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["x", "y"]);
    }
}
