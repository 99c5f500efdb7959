//! Task dependency graph for parallel execution
//!
//! A directed acyclic graph over task names. Edges run from a dependency to
//! its dependents. Validation checks dangling references, detects cycles with
//! three-colour DFS, and computes a topological order with Kahn's algorithm;
//! queries (ready set, execution levels, critical path) assume a validated
//! graph.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use thiserror::Error;

/// Errors surfaced while building or validating the dependency graph
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("task '{0}' already exists in the graph")]
    DuplicateTask(String),

    #[error("task '{0}' not found in graph")]
    TaskNotFound(String),

    #[error("missing dependencies:\n{}", format_missing(.0))]
    MissingDependencies(Vec<(String, String)>),

    #[error("cycle detected in task dependencies: {}", .0.join(" -> "))]
    CycleDetected(Vec<String>),
}

fn format_missing(missing: &[(String, String)]) -> String {
    missing
        .iter()
        .map(|(task, dep)| format!("task '{task}' depends on undefined task '{dep}'"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A node in the dependency graph
///
/// Nodes hold sets of names rather than references to each other, so the
/// bidirectional dependency/dependent relationship never creates an ownership
/// cycle.
#[derive(Debug, Clone, Default)]
pub struct GraphNode {
    pub name: String,
    pub dependencies: BTreeSet<String>,
    pub dependents: BTreeSet<String>,
    pub in_degree: usize,
    pub out_degree: usize,
}

impl GraphNode {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

/// Dependency graph over a workflow's tasks
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    nodes: HashMap<String, GraphNode>,

    /// Insertion order, for deterministic iteration and reporting
    order: Vec<String>,

    topological_order: Vec<String>,
    validated: bool,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, name: &str) -> Option<&GraphNode> {
        self.nodes.get(name)
    }

    /// Names in insertion order
    pub fn task_names(&self) -> &[String] {
        &self.order
    }

    /// Topological order computed by [`validate`](Self::validate); empty until then
    pub fn topological_order(&self) -> &[String] {
        &self.topological_order
    }

    /// Whether the graph has passed [`validate`](Self::validate) unchanged
    pub fn is_validated(&self) -> bool {
        self.validated
    }

    /// Add a task with its dependencies
    ///
    /// Dependencies may reference tasks that have not been added yet; the
    /// references are resolved by `validate`.
    pub fn add_task(&mut self, name: &str, dependencies: &[String]) -> Result<(), GraphError> {
        if self.nodes.contains_key(name) {
            return Err(GraphError::DuplicateTask(name.to_string()));
        }

        self.nodes.insert(name.to_string(), GraphNode::new(name));
        self.order.push(name.to_string());

        for dep in dependencies {
            self.add_dependency(name, dep)?;
        }

        self.validated = false;
        Ok(())
    }

    /// Record that `task_name` depends on `dependency_name`
    pub fn add_dependency(&mut self, task_name: &str, dependency_name: &str) -> Result<(), GraphError> {
        let node = self
            .nodes
            .get_mut(task_name)
            .ok_or_else(|| GraphError::TaskNotFound(task_name.to_string()))?;

        node.dependencies.insert(dependency_name.to_string());

        if let Some(dep_node) = self.nodes.get_mut(dependency_name) {
            dep_node.dependents.insert(task_name.to_string());
        }

        self.validated = false;
        Ok(())
    }

    /// Validate the graph structure and compute the topological order
    ///
    /// Runs three checks in order, aborting on the first failure: dangling
    /// references (all reported together), cycle detection, and Kahn's
    /// algorithm for the topological order.
    pub fn validate(&mut self) -> Result<(), GraphError> {
        let mut missing = Vec::new();
        for name in &self.order {
            for dep in &self.nodes[name].dependencies {
                if !self.nodes.contains_key(dep) {
                    missing.push((name.clone(), dep.clone()));
                }
            }
        }
        if !missing.is_empty() {
            return Err(GraphError::MissingDependencies(missing));
        }

        // Dependent sets and degrees may be stale for edges that were added
        // before their target node existed; rebuild them from the dependency
        // sets, which are authoritative.
        self.rebuild_edges();

        self.detect_cycles()?;
        self.compute_topological_order()?;

        self.validated = true;
        Ok(())
    }

    fn rebuild_edges(&mut self) {
        let mut dependents: HashMap<String, BTreeSet<String>> = HashMap::new();
        for name in &self.order {
            for dep in &self.nodes[name].dependencies {
                dependents.entry(dep.clone()).or_default().insert(name.clone());
            }
        }

        for name in &self.order {
            let node = self.nodes.get_mut(name).expect("node exists for ordered name");
            node.dependents = dependents.remove(name).unwrap_or_default();
            node.in_degree = node.dependencies.len();
            node.out_degree = node.dependents.len();
        }
    }

    /// Three-colour DFS over dependency -> dependent edges
    fn detect_cycles(&self) -> Result<(), GraphError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Colour {
            White,
            Grey,
            Black,
        }

        fn dfs(
            node: &str,
            nodes: &HashMap<String, GraphNode>,
            colours: &mut HashMap<String, Colour>,
            path: &mut Vec<String>,
        ) -> Result<(), GraphError> {
            colours.insert(node.to_string(), Colour::Grey);
            path.push(node.to_string());

            for neighbour in &nodes[node].dependents {
                match colours[neighbour.as_str()] {
                    Colour::Grey => {
                        // Back edge: the cycle runs from the ancestor on the
                        // current path to this neighbour and back.
                        let start = path
                            .iter()
                            .position(|n| n == neighbour)
                            .expect("grey node is on the current path");
                        let mut cycle: Vec<String> = path[start..].to_vec();
                        cycle.push(neighbour.clone());
                        return Err(GraphError::CycleDetected(cycle));
                    }
                    Colour::White => dfs(neighbour, nodes, colours, path)?,
                    Colour::Black => {}
                }
            }

            colours.insert(node.to_string(), Colour::Black);
            path.pop();
            Ok(())
        }

        let mut colours: HashMap<String, Colour> =
            self.order.iter().map(|n| (n.clone(), Colour::White)).collect();

        for name in &self.order {
            if colours[name.as_str()] == Colour::White {
                let mut path = Vec::new();
                dfs(name, &self.nodes, &mut colours, &mut path)?;
            }
        }

        Ok(())
    }

    /// Kahn's algorithm over a working copy of the in-degrees
    fn compute_topological_order(&mut self) -> Result<(), GraphError> {
        let mut in_degree: HashMap<&str, usize> = self
            .order
            .iter()
            .map(|n| (n.as_str(), self.nodes[n].in_degree))
            .collect();

        let mut queue: VecDeque<&str> = self
            .order
            .iter()
            .filter(|n| in_degree[n.as_str()] == 0)
            .map(|n| n.as_str())
            .collect();

        let mut topological = Vec::with_capacity(self.nodes.len());

        while let Some(current) = queue.pop_front() {
            topological.push(current.to_string());

            for dependent in &self.nodes[current].dependents {
                let degree = in_degree
                    .get_mut(dependent.as_str())
                    .expect("dependent is a known node");
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(dependent);
                }
            }
        }

        // A cycle here should have been caught by the DFS pass.
        if topological.len() != self.nodes.len() {
            return Err(GraphError::CycleDetected(vec![
                "<cycle detected but path not determined>".to_string(),
            ]));
        }

        self.topological_order = topological;
        Ok(())
    }

    /// Tasks not yet completed whose dependencies are all completed
    pub fn ready_tasks(&self, completed: &HashSet<String>) -> Vec<String> {
        self.order
            .iter()
            .filter(|name| {
                !completed.contains(*name)
                    && self.nodes[*name].dependencies.iter().all(|d| completed.contains(d))
            })
            .cloned()
            .collect()
    }

    /// Tasks grouped by execution level; tasks in one level can run in parallel
    pub fn execution_levels(&self) -> Vec<Vec<String>> {
        let mut levels = Vec::new();
        let mut completed: HashSet<String> = HashSet::new();

        while completed.len() < self.nodes.len() {
            let ready = self.ready_tasks(&completed);
            if ready.is_empty() {
                // Unreachable on a validated graph.
                break;
            }
            completed.extend(ready.iter().cloned());
            levels.push(ready);
        }

        levels
    }

    /// The longest dependency chain, reconstructed from a DP pass over the
    /// topological order
    pub fn critical_path(&self) -> Vec<String> {
        if self.topological_order.is_empty() {
            return Vec::new();
        }

        let mut longest: HashMap<&str, usize> = self.order.iter().map(|n| (n.as_str(), 0)).collect();
        let mut parent: HashMap<&str, &str> = HashMap::new();

        for task in &self.topological_order {
            for dependent in &self.nodes[task.as_str()].dependents {
                let candidate = longest[task.as_str()] + 1;
                if candidate > longest[dependent.as_str()] {
                    longest.insert(dependent.as_str(), candidate);
                    parent.insert(dependent.as_str(), task.as_str());
                }
            }
        }

        let mut end = self.order[0].as_str();
        for name in &self.order {
            if longest[name.as_str()] > longest[end] {
                end = name.as_str();
            }
        }

        let mut path = vec![end.to_string()];
        let mut current = end;
        while let Some(prev) = parent.get(current) {
            path.push((*prev).to_string());
            current = prev;
        }
        path.reverse();
        path
    }

    /// Simple ASCII rendering: execution levels, then the critical path
    pub fn visualize_ascii(&self) -> String {
        let mut lines = vec!["Task Dependency Graph:".to_string(), "=".repeat(30)];

        for (i, level) in self.execution_levels().iter().enumerate() {
            lines.push(String::new());
            lines.push(format!("Level {i} (can run in parallel):"));

            let mut sorted = level.clone();
            sorted.sort();
            for task in sorted {
                let deps: Vec<&str> = self.nodes[task.as_str()]
                    .dependencies
                    .iter()
                    .map(String::as_str)
                    .collect();
                if deps.is_empty() {
                    lines.push(format!("  {task} (no dependencies)"));
                } else {
                    lines.push(format!("  {task} <- {}", deps.join(", ")));
                }
            }
        }

        let critical = self.critical_path();
        if critical.len() > 1 {
            lines.push(String::new());
            lines.push(format!("Critical Path: {}", critical.join(" -> ")));
        }

        lines.join("\n")
    }
}
