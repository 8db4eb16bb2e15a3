// src/dag/graph.rs

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use petgraph::Direction;
use tracing::debug;

use crate::dag::task::Task;
use crate::errors::{BuildError, Result};
use crate::types::TaskId;

/// Task definitions keyed by identifier.
///
/// Dependencies may reference tasks that are added later; references are only
/// resolved by [`TaskGraph::validate`] / [`TaskGraph::topological_order`],
/// which must succeed before anything executes.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    tasks: BTreeMap<TaskId, Task>,
}

/// Index-based view of the graph. Edge direction: dependency -> dependent.
struct Indexed<'a> {
    graph: DiGraph<&'a str, ()>,
    index: HashMap<&'a str, NodeIndex>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task. Fails with [`BuildError::DuplicateTask`] if the identifier
    /// is already taken.
    pub fn add_task(&mut self, task: Task) -> Result<()> {
        if self.tasks.contains_key(&task.id) {
            return Err(BuildError::DuplicateTask(task.id));
        }
        debug!(task = %task.id, deps = ?task.deps, "adding task to graph");
        self.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    /// All task identifiers, in lexical order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Immediate dependencies of a task (its `after` list).
    pub fn dependencies_of(&self, id: &str) -> &[TaskId] {
        self.tasks
            .get(id)
            .map(|t| t.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Tasks without dependencies.
    pub fn roots(&self) -> Vec<TaskId> {
        self.tasks
            .values()
            .filter(|t| t.deps.is_empty())
            .map(|t| t.id.clone())
            .collect()
    }

    /// Run every graph-construction check without computing the order.
    pub fn validate(&self) -> Result<()> {
        self.topological_order().map(|_| ())
    }

    /// Layer the graph into batches (Kahn's algorithm).
    ///
    /// Each batch only contains tasks whose dependencies all sit in earlier
    /// batches; identifiers within a batch are in lexical order. Fails with
    /// [`BuildError::MissingDependency`] or [`BuildError::Cycle`]; a partial
    /// order is never returned.
    pub fn topological_order(&self) -> Result<Vec<Vec<TaskId>>> {
        self.check_dependencies_exist()?;
        let indexed = self.indexed();
        let graph = &indexed.graph;

        let mut in_degree: HashMap<NodeIndex, usize> = graph
            .node_indices()
            .map(|n| (n, graph.neighbors_directed(n, Direction::Incoming).count()))
            .collect();

        let mut ready: Vec<NodeIndex> = in_degree
            .iter()
            .filter(|(_, deg)| **deg == 0)
            .map(|(n, _)| *n)
            .collect();

        let mut batches: Vec<Vec<TaskId>> = Vec::new();
        let mut placed = 0usize;

        while !ready.is_empty() {
            ready.sort_by_key(|n| graph[*n]);
            let mut next = Vec::new();

            for node in ready.iter() {
                for dependent in graph.neighbors_directed(*node, Direction::Outgoing) {
                    if let Some(deg) = in_degree.get_mut(&dependent) {
                        *deg -= 1;
                        if *deg == 0 {
                            next.push(dependent);
                        }
                    }
                }
            }

            placed += ready.len();
            batches.push(ready.iter().map(|n| graph[*n].to_string()).collect());
            ready = next;
        }

        if placed < graph.node_count() {
            let member = cycle_member(graph);
            return Err(BuildError::Cycle(member));
        }

        Ok(batches)
    }

    /// Transitive set of tasks that depend, directly or indirectly, on `id`.
    ///
    /// Does not include `id` itself. Unknown identifiers yield an empty set.
    pub fn dependents_of(&self, id: &str) -> BTreeSet<TaskId> {
        let indexed = self.indexed();
        let Some(start) = indexed.index.get(id).copied() else {
            return BTreeSet::new();
        };

        let mut out = BTreeSet::new();
        let mut dfs = Dfs::new(&indexed.graph, start);
        while let Some(node) = dfs.next(&indexed.graph) {
            if node != start {
                out.insert(indexed.graph[node].to_string());
            }
        }
        out
    }

    /// `ids` plus all of their transitive dependents, ignoring unknown ids.
    pub fn closure_of<'a, I>(&self, ids: I) -> BTreeSet<TaskId>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut out = BTreeSet::new();
        for id in ids {
            if !self.contains(id) {
                continue;
            }
            out.insert(id.to_string());
            out.extend(self.dependents_of(id));
        }
        out
    }

    fn check_dependencies_exist(&self) -> Result<()> {
        for task in self.tasks.values() {
            for dep in &task.deps {
                if !self.tasks.contains_key(dep) {
                    return Err(BuildError::MissingDependency {
                        task: task.id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn indexed(&self) -> Indexed<'_> {
        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let mut index = HashMap::new();

        for id in self.tasks.keys() {
            index.insert(id.as_str(), graph.add_node(id.as_str()));
        }

        for task in self.tasks.values() {
            let Some(&to) = index.get(task.id.as_str()) else {
                continue;
            };
            for dep in &task.deps {
                if let Some(&from) = index.get(dep.as_str()) {
                    graph.update_edge(from, to, ());
                }
            }
        }

        Indexed { graph, index }
    }
}

/// Pick the lexically smallest task that actually sits on a cycle.
///
/// Nodes left over after Kahn's algorithm also include tasks merely
/// downstream of a cycle, so look at strongly connected components instead.
fn cycle_member(graph: &DiGraph<&str, ()>) -> TaskId {
    tarjan_scc(graph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
        .flatten()
        .map(|n| graph[n])
        .min()
        .unwrap_or_default()
        .to_string()
}
