//! Equation sequencing within a Gauss-Seidel pass.

use super::plan::SolvePlan;
use super::OrderingStrategy;
use crate::registry::Equation;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// Resolves the pass order for a plan as equation indices.
pub fn execution_order(plan: &SolvePlan, strategy: OrderingStrategy) -> Vec<usize> {
    match strategy {
        OrderingStrategy::Registry => (0..plan.equations.len()).collect(),
        OrderingStrategy::DependencyBlocks => {
            dependency_blocks(&plan.equations).into_iter().flatten().collect()
        }
    }
}

/// Strongly connected components of the current-quarter dependency
/// graph, in topological order. Each block is a set of simultaneous
/// equations; within a block the calibrated registry order is kept.
///
/// Only offset-0 reads create edges; lagged references resolve to
/// already-solved quarters and impose no ordering.
pub fn dependency_blocks(equations: &[Equation]) -> Vec<Vec<usize>> {
    let producer: HashMap<_, _> = equations
        .iter()
        .enumerate()
        .map(|(i, eq)| (eq.target(), i))
        .collect();

    let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(equations.len(), 0);
    let nodes: Vec<NodeIndex> = (0..equations.len()).map(|i| graph.add_node(i)).collect();

    for (i, eq) in equations.iter().enumerate() {
        for read in &eq.parsed.reads {
            if read.offset != 0 {
                continue;
            }
            if let Some(&j) = producer.get(&read.var) {
                if j != i {
                    graph.add_edge(nodes[j], nodes[i], ());
                }
            }
        }
    }

    // tarjan_scc yields components in reverse topological order.
    let mut sccs = tarjan_scc(&graph);
    sccs.reverse();
    sccs.into_iter()
        .map(|scc| {
            let mut block: Vec<usize> = scc.into_iter().map(|n| graph[n]).collect();
            block.sort_unstable();
            block
        })
        .collect()
}
