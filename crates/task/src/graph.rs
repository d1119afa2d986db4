//! Petgraph-based task DAG
//!
//! Edges point from a task to each task it depends on, so `Outgoing` edges
//! are dependencies and `Incoming` edges are dependents.

use indexmap::IndexMap;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::{algo, Direction};
use std::collections::{HashMap, HashSet, VecDeque};
use taleweave_core::{Error, Result, Task, TaskId, TaskKind};

/// Immutable dependency graph of one job's tasks
#[derive(Debug, Clone)]
pub struct TaskGraph {
    graph: DiGraph<Task, ()>,
    task_map: HashMap<TaskId, NodeIndex>,
}

impl TaskGraph {
    pub fn builder() -> TaskGraphBuilder {
        TaskGraphBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.task_map.get(id).map(|idx| &self.graph[*idx])
    }

    /// Tasks in the order they were added
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.graph.node_indices().map(move |idx| &self.graph[idx])
    }

    pub fn count_by_kind(&self, kind: TaskKind) -> usize {
        self.tasks().filter(|t| t.kind == kind).count()
    }

    /// Tasks that `id` depends on
    pub fn dependencies(&self, id: &TaskId) -> Vec<&TaskId> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Tasks that depend directly on `id`
    pub fn dependents(&self, id: &TaskId) -> Vec<&TaskId> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Every task reachable through dependents of `id`, excluding `id`
    pub fn descendants(&self, id: &TaskId) -> Vec<TaskId> {
        let Some(&start) = self.task_map.get(id) else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([start]);
        let mut out = Vec::new();
        while let Some(node) = queue.pop_front() {
            for edge in self.graph.edges_directed(node, Direction::Incoming) {
                let dependent = edge.source();
                if seen.insert(dependent) {
                    out.push(self.graph[dependent].id.clone());
                    queue.push_back(dependent);
                }
            }
        }
        out
    }

    /// Tasks ordered so that every dependency precedes its dependents
    pub fn topological_order(&self) -> Vec<&Task> {
        // Cycles are rejected at build time, so toposort cannot fail here
        let mut order: Vec<&Task> = algo::toposort(&self.graph, None)
            .unwrap_or_default()
            .into_iter()
            .map(|idx| &self.graph[idx])
            .collect();
        order.reverse();
        order
    }

    /// Tasks without dependencies
    pub fn roots(&self) -> Vec<&TaskId> {
        self.graph
            .node_indices()
            .filter(|&idx| {
                self.graph
                    .edges_directed(idx, Direction::Outgoing)
                    .next()
                    .is_none()
            })
            .map(|idx| &self.graph[idx].id)
            .collect()
    }

    fn neighbors(&self, id: &TaskId, direction: Direction) -> Vec<&TaskId> {
        let Some(&idx) = self.task_map.get(id) else {
            return Vec::new();
        };
        let mut ids: Vec<&TaskId> = self
            .graph
            .edges_directed(idx, direction)
            .map(|edge| match direction {
                Direction::Outgoing => &self.graph[edge.target()].id,
                Direction::Incoming => &self.graph[edge.source()].id,
            })
            .collect();
        ids.sort();
        ids
    }
}

/// Builder for TaskGraph
pub struct TaskGraphBuilder {
    tasks: IndexMap<TaskId, Task>,
}

impl TaskGraphBuilder {
    pub fn new() -> Self {
        Self {
            tasks: IndexMap::new(),
        }
    }

    /// Add a task; ids must be unique
    pub fn add_task(&mut self, task: Task) -> Result<&mut Self> {
        if self.tasks.contains_key(&task.id) {
            return Err(Error::invalid_spec(format!("duplicate task id '{}'", task.id)));
        }
        self.tasks.insert(task.id.clone(), task);
        Ok(self)
    }

    /// Wire up dependency edges and reject dangling references and cycles
    pub fn build(self) -> Result<TaskGraph> {
        let mut graph = DiGraph::with_capacity(self.tasks.len(), self.tasks.len());
        let mut task_map = HashMap::with_capacity(self.tasks.len());

        let mut edges = Vec::new();
        for (id, task) in self.tasks {
            for dep in &task.depends_on {
                edges.push((id.clone(), dep.clone()));
            }
            let idx = graph.add_node(task);
            task_map.insert(id, idx);
        }

        for (from, to) in edges {
            let target = task_map.get(&to).ok_or_else(|| {
                Error::invalid_spec(format!("task '{from}' depends on unknown task '{to}'"))
            })?;
            graph.add_edge(task_map[&from], *target, ());
        }

        if let Err(cycle) = algo::toposort(&graph, None) {
            let id = &graph[cycle.node_id()].id;
            return Err(Error::invalid_spec(format!(
                "circular dependency detected involving task '{id}'"
            )));
        }

        Ok(TaskGraph { graph, task_map })
    }
}

impl Default for TaskGraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}
