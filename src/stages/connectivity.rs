use petgraph::unionfind::UnionFind;
use rstar::RTree;
use rstar::primitives::GeomWithData;

use crate::domain::{EdgeType, GraphEdge, UnifiedGraph};
use crate::error::ConnectivityRepairExhausted;
use crate::geometry::kernel;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectivityReport {
    /// Components before any repair
    pub initial_components: usize,
    /// Components left after repair
    pub components: usize,
    /// Connector edges added
    pub connectors: usize,
    pub iterations: usize,
    /// Node indices outside the main component, ascending
    pub unreachable: Vec<usize>,
    pub exhausted: Option<ConnectivityRepairExhausted>,
}

impl ConnectivityReport {
    pub fn is_connected(&self) -> bool {
        self.components <= 1
    }
}

/// Connected components as ascending node index lists, ordered by their
/// smallest index.
pub fn components(graph: &UnifiedGraph) -> Vec<Vec<usize>> {
    let n = graph.node_count();
    let mut sets = UnionFind::<usize>::new(n);
    for edge in &graph.edges {
        sets.union(edge.source, edge.target);
    }

    let mut slot_of_root = vec![usize::MAX; n];
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for node in 0..n {
        let root = sets.find_mut(node);
        if slot_of_root[root] == usize::MAX {
            slot_of_root[root] = groups.len();
            groups.push(Vec::new());
        }
        groups[slot_of_root[root]].push(node);
    }
    groups
}

/// Largest component, ties going to the one holding the smallest index
fn main_component(groups: &[Vec<usize>]) -> usize {
    let mut main = 0;
    for (i, group) in groups.iter().enumerate() {
        if group.len() > groups[main].len() {
            main = i;
        }
    }
    main
}

type IndexedNode = GeomWithData<[f64; 2], usize>;

/// Closest `(main node, other node, distance)` pair, ties by node index
fn closest_pair(
    graph: &UnifiedGraph,
    main_tree: &RTree<IndexedNode>,
    other: &[usize],
) -> Option<(usize, usize, f64)> {
    let mut best: Option<(usize, usize, f64)> = None;
    for &node in other {
        let position = graph.nodes[node].position;
        if !(position.x.is_finite() && position.y.is_finite()) {
            continue;
        }
        let Some(nearest) = main_tree.nearest_neighbor(&[position.x, position.y]) else {
            continue;
        };
        let distance = kernel::distance(position, graph.nodes[nearest.data].position);
        let better = match best {
            None => true,
            Some((best_main, best_other, best_distance)) => {
                distance
                    .total_cmp(&best_distance)
                    .then(node.cmp(&best_other))
                    .then(nearest.data.cmp(&best_main))
                    .is_lt()
            }
        };
        if better {
            best = Some((nearest.data, node, distance));
        }
    }
    best
}

/// Verify the graph is one component and join stray components to the
/// main one with `connector` edges.
///
/// Each pass links every other component to the main component at its
/// closest node pair. Passes are capped at the initial component count;
/// whatever is still detached afterwards is reported as unreachable.
pub fn repair_connectivity(graph: &mut UnifiedGraph) -> ConnectivityReport {
    let mut groups = components(graph);
    let mut report = ConnectivityReport {
        initial_components: groups.len(),
        components: groups.len(),
        ..Default::default()
    };

    tracing::debug!(components = groups.len(), "verifying connectivity");

    while groups.len() > 1 && report.iterations < report.initial_components {
        report.iterations += 1;

        let main = main_component(&groups);
        let main_tree: RTree<IndexedNode> = RTree::bulk_load(
            groups[main]
                .iter()
                .map(|&i| graph.nodes[i].position)
                .zip(groups[main].iter().copied())
                .filter(|(p, _)| p.x.is_finite() && p.y.is_finite())
                .map(|(p, i)| GeomWithData::new([p.x, p.y], i))
                .collect(),
        );

        let mut added = 0;
        for (i, group) in groups.iter().enumerate() {
            if i == main {
                continue;
            }
            if let Some((a, b, distance)) = closest_pair(graph, &main_tree, group) {
                graph.add_edge(GraphEdge::new(a, b, distance, EdgeType::Connector));
                added += 1;
            }
        }
        report.connectors += added;

        groups = components(graph);
        if added == 0 {
            break;
        }
    }

    report.components = groups.len();
    if groups.len() > 1 {
        let main = main_component(&groups);
        let mut unreachable: Vec<usize> = groups
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != main)
            .flat_map(|(_, group)| group.iter().copied())
            .collect();
        unreachable.sort_unstable();

        let exhausted = ConnectivityRepairExhausted {
            iterations: report.iterations,
            components: groups.len(),
            unreachable: unreachable.clone(),
        };
        tracing::warn!("{}", exhausted);
        report.unreachable = unreachable;
        report.exhausted = Some(exhausted);
    } else if report.connectors > 0 {
        tracing::info!(connectors = report.connectors, "graph repaired into one component");
    }

    report
}
