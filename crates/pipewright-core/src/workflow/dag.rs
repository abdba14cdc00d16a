//! Dependency graph construction and deterministic topological ordering.
//!
//! Uses `petgraph` to model producer -> consumer relationships between steps,
//! derived by matching each step's data dependencies against the outputs
//! other steps declare. Selection tokens never contribute edges.
//!
//! The scheduler is Kahn's algorithm with a sorted ready set: among all steps
//! whose producers have run, the lexicographically smallest usid goes next.
//! The resulting order is therefore independent of the input step order.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use pipewright_types::workflow::StepDescriptor;

use super::definition::WorkflowError;

// ---------------------------------------------------------------------------
// Dependency graph
// ---------------------------------------------------------------------------

/// Producer -> consumer graph over step usids.
///
/// Nodes are usids; each edge is labelled with the output name that links the
/// two steps. Parallel edges are kept when a consumer depends on several
/// outputs of the same producer.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<String, String>,
    nodes: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Build the graph from the step list. Unmatched dependency names are ignored.
    pub fn build(steps: &[StepDescriptor]) -> Self {
        let mut graph = DiGraph::<String, String>::new();
        let mut nodes = HashMap::with_capacity(steps.len());
        for step in steps {
            let idx = graph.add_node(step.usid.clone());
            nodes.insert(step.usid.clone(), idx);
        }

        // Later producers of the same output name win.
        let mut producers: HashMap<&str, &str> = HashMap::new();
        for step in steps {
            for output in &step.outputs {
                producers.insert(output.as_str(), step.usid.as_str());
            }
        }

        for step in steps {
            let consumer = nodes[&step.usid];
            for dep in step.data_dependencies() {
                if let Some(producer) = producers.get(dep) {
                    graph.add_edge(nodes[*producer], consumer, dep.to_string());
                }
            }
        }

        Self { graph, nodes }
    }

    /// Consumers of a producer's outputs, one entry per linking dependency.
    pub fn consumers(&self, usid: &str) -> Vec<&str> {
        let Some(&idx) = self.nodes.get(usid) else {
            return Vec::new();
        };
        let mut consumers: Vec<&str> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| self.graph[e.target()].as_str())
            .collect();
        consumers.sort_unstable();
        consumers
    }

    /// Producer -> consumers mapping. Producers without consumers are omitted.
    pub fn adjacency(&self) -> BTreeMap<String, Vec<String>> {
        let mut map = BTreeMap::new();
        for usid in self.nodes.keys() {
            let consumers = self.consumers(usid);
            if !consumers.is_empty() {
                map.insert(
                    usid.clone(),
                    consumers.into_iter().map(str::to_string).collect(),
                );
            }
        }
        map
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Deterministic topological order over all step usids.
    ///
    /// Fails with `WorkflowError::CycleDetected` naming the steps that could
    /// never become ready.
    pub fn execution_order(&self) -> Result<Vec<String>, WorkflowError> {
        let mut in_degree: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|idx| {
                let incoming = self.graph.edges_directed(idx, Direction::Incoming).count();
                (idx, incoming)
            })
            .collect();

        let mut ready: BTreeSet<(&str, NodeIndex)> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(idx, _)| (self.graph[*idx].as_str(), *idx))
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some((usid, idx)) = ready.pop_first() {
            order.push(usid.to_string());
            for consumer in self.graph.neighbors_directed(idx, Direction::Outgoing) {
                // neighbors_directed yields once per parallel edge
                if let Some(degree) = in_degree.get_mut(&consumer) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert((self.graph[consumer].as_str(), consumer));
                    }
                }
            }
        }

        if order.len() < self.graph.node_count() {
            let mut stuck: Vec<&str> = in_degree
                .iter()
                .filter(|(_, degree)| **degree > 0)
                .map(|(idx, _)| self.graph[*idx].as_str())
                .collect();
            stuck.sort_unstable();
            return Err(WorkflowError::CycleDetected(format!(
                "steps never became ready: {}",
                stuck.join(", ")
            )));
        }

        Ok(order)
    }
}

/// Build the dependency graph and compute the execution order in one call.
pub fn execution_order(steps: &[StepDescriptor]) -> Result<Vec<String>, WorkflowError> {
    DependencyGraph::build(steps).execution_order()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
