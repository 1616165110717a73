//! Project dependency graph built from "blocked by" relations.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use serde::Serialize;
use tracing::warn;

use crate::types::{Project, Warning};

/// Directed graph over the projects of one snapshot. An edge `a -> b` means
/// "a is blocked by b": b has to finish first.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DependencyGraph {
    nodes: Vec<String>,
    edges: HashMap<String, BTreeSet<String>>,
    cycles: Vec<Vec<String>>,
    /// Component index of every node that sits on some cycle.
    #[serde(skip)]
    cyclic: HashMap<String, usize>,
}

impl DependencyGraph {
    /// Build the graph and run cycle detection. Edges come only from
    /// `blocked_by`; `blocks` is used to cross-check the relation from the
    /// other side.
    pub fn build(projects: &[Project]) -> (Self, Vec<Warning>) {
        let by_id: HashMap<&str, &Project> = projects.iter().map(|p| (p.id.as_str(), p)).collect();
        let mut warnings = Vec::new();
        let mut edges: HashMap<String, BTreeSet<String>> = HashMap::new();

        for project in projects {
            for blocker_id in &project.blocked_by {
                let Some(blocker) = by_id.get(blocker_id.as_str()) else {
                    warnings.push(Warning::UnknownDependency {
                        project_id: project.id.clone(),
                        dependency_id: blocker_id.clone(),
                    });
                    continue;
                };
                if !blocker.blocks.contains(&project.id) {
                    warnings.push(Warning::InconsistentRelation {
                        project_id: project.id.clone(),
                        blocker_id: blocker_id.clone(),
                    });
                }
                edges
                    .entry(project.id.clone())
                    .or_default()
                    .insert(blocker_id.clone());
            }

            // A `blocks` entry with no matching `blocked_by` adds no edge.
            for dependent_id in &project.blocks {
                match by_id.get(dependent_id.as_str()) {
                    None => warnings.push(Warning::UnknownDependency {
                        project_id: project.id.clone(),
                        dependency_id: dependent_id.clone(),
                    }),
                    Some(dependent) if !dependent.blocked_by.contains(&project.id) => {
                        warnings.push(Warning::InconsistentRelation {
                            project_id: dependent_id.clone(),
                            blocker_id: project.id.clone(),
                        })
                    }
                    Some(_) => {}
                }
            }
        }

        let mut graph = Self {
            nodes: projects.iter().map(|p| p.id.clone()).collect(),
            edges,
            cycles: Vec::new(),
            cyclic: HashMap::new(),
        };
        let (cycles, cyclic) = {
            let components = cyclic_components(&graph);
            let cyclic: HashMap<String, usize> = components
                .iter()
                .enumerate()
                .flat_map(|(i, nodes)| nodes.iter().map(move |n| (n.to_string(), i)))
                .collect();
            (elementary_cycles(&graph, &components), cyclic)
        };
        graph.cycles = cycles;
        graph.cyclic = cyclic;
        for cycle in &graph.cycles {
            warn!(cycle = %cycle.join(" -> "), "dependency cycle detected");
            warnings.push(Warning::CycleDetected {
                cycle: cycle.clone(),
            });
        }

        (graph, warnings)
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// Projects `id` is blocked by.
    pub fn blockers_of(&self, id: &str) -> impl Iterator<Item = &str> {
        self.edges
            .get(id)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// Projects blocked by `id`.
    pub fn dependents_of<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.nodes
            .iter()
            .filter(move |n| self.edges.get(n.as_str()).is_some_and(|b| b.contains(id)))
            .map(String::as_str)
    }

    /// All `(blocked, blocker)` pairs, in node order.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.nodes.iter().flat_map(move |from| {
            self.blockers_of(from).map(move |to| (from.as_str(), to))
        })
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum()
    }

    pub fn cycles(&self) -> &[Vec<String>] {
        &self.cycles
    }

    /// False once any cycle was found. The graph stays inspectable.
    pub fn is_valid(&self) -> bool {
        self.cyclic.is_empty()
    }

    /// Whether the edge `from -> to` lies on some cycle, so its arrow should
    /// be suppressed. True exactly when the edge exists and both ends share a
    /// strongly connected component.
    pub fn in_cycle_edge(&self, from: &str, to: &str) -> bool {
        self.edges.get(from).is_some_and(|b| b.contains(to))
            && matches!(
                (self.cyclic.get(from), self.cyclic.get(to)),
                (Some(a), Some(b)) if a == b
            )
    }

    /// Nodes ordered so every blocker precedes what it blocks, ties broken by
    /// snapshot order. `None` for a cyclic graph.
    pub fn topological_order(&self) -> Option<Vec<String>> {
        if !self.is_valid() {
            return None;
        }

        let mut pending: HashMap<&str, usize> = self
            .nodes
            .iter()
            .map(|n| (n.as_str(), self.blockers_of(n).count()))
            .collect();
        let mut ready: VecDeque<&str> = self
            .nodes
            .iter()
            .map(String::as_str)
            .filter(|n| pending[n] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(node) = ready.pop_front() {
            order.push(node.to_string());
            for dependent in self.dependents_of(node) {
                if let Some(count) = pending.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push_back(dependent);
                    }
                }
            }
        }

        (order.len() == self.nodes.len()).then_some(order)
    }
}

/// Upper bound on reported cycles. Densely linked components can hold an
/// exponential number of them; `in_cycle_edge` stays exact past the cap.
const MAX_REPORTED_CYCLES: usize = 256;

/// Every distinct elementary cycle, each starting at its smallest id, sorted.
/// Self-loops are cycles of length one.
pub fn detect_cycles(graph: &DependencyGraph) -> Vec<Vec<String>> {
    elementary_cycles(graph, &cyclic_components(graph))
}

/// Strongly connected components that contain a cycle: more than one node,
/// or a single node blocked by itself. Iterative Tarjan.
fn cyclic_components(graph: &DependencyGraph) -> Vec<Vec<&str>> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut low: HashMap<&str, usize> = HashMap::new();
    let mut on_stack: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = Vec::new();
    let mut components = Vec::new();

    for root in &graph.nodes {
        if index.contains_key(root.as_str()) {
            continue;
        }

        let mut frames: Vec<(&str, std::vec::IntoIter<&str>)> = Vec::new();
        let mut pending = Some(root.as_str());

        loop {
            if let Some(node) = pending.take() {
                let n = index.len();
                index.insert(node, n);
                low.insert(node, n);
                stack.push(node);
                on_stack.insert(node);
                frames.push((node, graph.blockers_of(node).collect::<Vec<_>>().into_iter()));
            }

            let Some((node, blockers)) = frames.last_mut() else {
                break;
            };
            let node = *node;

            if let Some(next) = blockers.next() {
                match index.get(next) {
                    None => pending = Some(next),
                    Some(&i) if on_stack.contains(next) => {
                        let l = low.entry(node).or_insert(i);
                        *l = (*l).min(i);
                    }
                    Some(_) => {}
                }
                continue;
            }

            frames.pop();
            let node_low = low[node];
            if let Some((parent, _)) = frames.last() {
                let l = low.entry(*parent).or_insert(node_low);
                *l = (*l).min(node_low);
            }
            if node_low == index[node] {
                let mut component = Vec::new();
                while let Some(member) = stack.pop() {
                    on_stack.remove(member);
                    component.push(member);
                    if member == node {
                        break;
                    }
                }
                let self_loop = graph.blockers_of(node).any(|b| b == node);
                if component.len() > 1 || self_loop {
                    component.sort_unstable();
                    components.push(component);
                }
            }
        }
    }

    components
}

/// Enumerates the cycles of each component by depth-first search from every
/// member in id order. A search from `start` only enters larger ids of the
/// same component and closes a cycle on an edge back to `start`, so every
/// cycle is found once, already rotated to its smallest id.
fn elementary_cycles(graph: &DependencyGraph, components: &[Vec<&str>]) -> Vec<Vec<String>> {
    let mut cycles = Vec::new();

    'components: for component in components {
        let members: HashSet<&str> = component.iter().copied().collect();

        for &start in component {
            let mut path: Vec<&str> = vec![start];
            let mut on_path: HashSet<&str> = HashSet::from([start]);
            let mut stack: Vec<std::vec::IntoIter<&str>> =
                vec![graph.blockers_of(start).collect::<Vec<_>>().into_iter()];

            while let Some(next) = stack.last_mut().map(Iterator::next) {
                let Some(next) = next else {
                    stack.pop();
                    if let Some(done) = path.pop() {
                        on_path.remove(done);
                    }
                    continue;
                };

                if next == start {
                    cycles.push(path.iter().map(|s| s.to_string()).collect());
                    if cycles.len() >= MAX_REPORTED_CYCLES {
                        warn!(limit = MAX_REPORTED_CYCLES, "too many dependency cycles, list truncated");
                        break 'components;
                    }
                } else if next > start && members.contains(next) && on_path.insert(next) {
                    path.push(next);
                    stack.push(graph.blockers_of(next).collect::<Vec<_>>().into_iter());
                }
            }
        }
    }

    cycles.sort();
    cycles
}
