use anyhow::{Result, bail};
use geo::Coord;
use petgraph::algo::dijkstra;
use petgraph::graph::{NodeIndex, UnGraph};

use crate::domain::{GraphEdge, UnifiedGraph};
use crate::geometry::{Bounds, kernel};

/// Subgraph over the kept node indices, re-indexed densely in ascending
/// order. Edges survive only when both ends are kept.
fn subgraph(graph: &UnifiedGraph, keep: &[bool]) -> UnifiedGraph {
    let mut sliced = UnifiedGraph::new();
    let mut remap = vec![usize::MAX; graph.node_count()];

    for (index, node) in graph.nodes.iter().enumerate() {
        if keep[index] {
            remap[index] = sliced.add_node(node.source, node.position);
        }
    }
    for edge in &graph.edges {
        if keep[edge.source] && keep[edge.target] {
            sliced.add_edge(GraphEdge {
                source: remap[edge.source],
                target: remap[edge.target],
                ..*edge
            });
        }
    }
    sliced
}

/// Nodes inside `region` and the edges between them
pub fn slice_region(graph: &UnifiedGraph, region: &Bounds) -> UnifiedGraph {
    let keep: Vec<bool> = graph
        .nodes
        .iter()
        .map(|n| region.contains(n.position))
        .collect();
    subgraph(graph, &keep)
}

/// Index of the node closest to `c`, ties going to the lowest index
pub fn nearest_node(graph: &UnifiedGraph, c: Coord<f64>) -> Option<usize> {
    graph
        .nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (i, kernel::distance(c, n.position)))
        .filter(|(_, d)| d.is_finite())
        .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
        .map(|(i, _)| i)
}

/// Everything reachable from `origin` within `budget_secs` when edge cost
/// (meters) is travelled at `speed` meters per second.
pub fn slice_by_budget(
    graph: &UnifiedGraph,
    origin: usize,
    budget_secs: f64,
    speed: f64,
) -> Result<UnifiedGraph> {
    if origin >= graph.node_count() {
        bail!(
            "origin node {} out of range ({} nodes)",
            origin,
            graph.node_count()
        );
    }
    if !(speed > 0.0) {
        bail!("travel speed must be positive, got {}", speed);
    }
    if budget_secs < 0.0 {
        bail!("time budget must not be negative, got {}", budget_secs);
    }

    let mut routing = UnGraph::<(), f64>::with_capacity(graph.node_count(), graph.edge_count());
    for _ in &graph.nodes {
        routing.add_node(());
    }
    for edge in &graph.edges {
        routing.add_edge(
            NodeIndex::new(edge.source),
            NodeIndex::new(edge.target),
            edge.cost.max(0.0),
        );
    }

    let max_cost = budget_secs * speed;
    let costs = dijkstra(&routing, NodeIndex::new(origin), None, |e| *e.weight());

    let mut keep = vec![false; graph.node_count()];
    for (node, cost) in costs {
        if cost <= max_cost {
            keep[node.index()] = true;
        }
    }

    let sliced = subgraph(graph, &keep);
    tracing::debug!(
        nodes = sliced.node_count(),
        edges = sliced.edge_count(),
        max_cost,
        "sliced graph by time budget"
    );
    Ok(sliced)
}
