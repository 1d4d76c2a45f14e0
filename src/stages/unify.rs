use rstar::RTree;
use rstar::primitives::GeomWithData;
use std::collections::HashMap;

use super::boundary::BoundaryOutput;
use super::grid::TerrainGrid;
use crate::config::PipelineConfig;
use crate::domain::{
    ConnectionEdge, EdgeType, GraphEdge, NodeRef, RoadSegment, UnifiedGraph, WaterObstacle,
};
use crate::geometry::kernel;

/// Everything the unifier merges, borrowed from earlier stages
pub struct GraphParts<'a> {
    pub terrain: &'a TerrainGrid,
    pub obstacles: &'a [WaterObstacle],
    pub boundary: &'a BoundaryOutput,
    pub connections: &'a [ConnectionEdge],
    pub roads: &'a [RoadSegment],
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UnifyReport {
    /// Road vertices linked to a terrain point
    pub road_snaps: usize,
    /// Road segments with no vertex close enough to any terrain point
    pub unsnapped_roads: usize,
    /// Edges dropped because an endpoint was never added as a node
    pub dangling: usize,
}

type IndexedNode = GeomWithData<[f64; 2], usize>;

/// Merge every edge set into one graph with dense node indices.
///
/// Node order is terrain points (routable only), then boundary nodes, then
/// road vertices. Water terrain points carry no edges and are left out.
pub fn unify_graph(parts: &GraphParts, config: &PipelineConfig) -> (UnifiedGraph, UnifyReport) {
    let mut graph = UnifiedGraph::new();
    let mut report = UnifyReport::default();

    for point in parts.terrain.points.iter().filter(|p| p.is_routable()) {
        graph.add_node(NodeRef::Terrain(point.id), point.position);
    }
    for node in &parts.boundary.nodes {
        graph.add_node(NodeRef::Boundary(node.id), node.position);
    }

    let crossability: HashMap<u64, u8> = parts
        .obstacles
        .iter()
        .map(|o| (o.id, o.crossability))
        .collect();

    for edge in &parts.terrain.edges {
        match endpoints(&graph, NodeRef::Terrain(edge.source), NodeRef::Terrain(edge.target)) {
            Some((s, t)) => graph.add_edge(GraphEdge::new(s, t, edge.length, EdgeType::Terrain)),
            None => report.dangling += 1,
        }
    }

    for edge in &parts.boundary.edges {
        match endpoints(&graph, NodeRef::Boundary(edge.source), NodeRef::Boundary(edge.target)) {
            Some((s, t)) => {
                let score = crossability
                    .get(&edge.water_obstacle_id)
                    .copied()
                    .unwrap_or(0);
                graph.add_edge(
                    GraphEdge::new(s, t, edge.length, EdgeType::Water)
                        .with_obstacle(edge.water_obstacle_id, score),
                );
            }
            None => report.dangling += 1,
        }
    }

    for edge in parts.connections {
        match endpoints(
            &graph,
            NodeRef::Terrain(edge.terrain_point_id),
            NodeRef::Boundary(edge.boundary_node_id),
        ) {
            Some((s, t)) => {
                let mut unified = GraphEdge::new(s, t, edge.distance, EdgeType::Connection);
                unified.obstacle_id = Some(edge.water_obstacle_id);
                graph.add_edge(unified);
            }
            None => report.dangling += 1,
        }
    }

    if config.roads && !parts.roads.is_empty() {
        add_roads(&mut graph, parts.roads, config.road_snap_distance, &mut report);
    }

    if report.dangling > 0 {
        tracing::warn!(dangling = report.dangling, "edges with unknown endpoints dropped");
    }
    tracing::debug!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        road_snaps = report.road_snaps,
        "graph unified"
    );

    (graph, report)
}

fn endpoints(graph: &UnifiedGraph, source: NodeRef, target: NodeRef) -> Option<(usize, usize)> {
    Some((graph.index_of(source)?, graph.index_of(target)?))
}

/// Add road vertices and segments, then snap every vertex to the nearest
/// routable terrain point within `snap_distance`.
fn add_roads(
    graph: &mut UnifiedGraph,
    roads: &[RoadSegment],
    snap_distance: f64,
    report: &mut UnifyReport,
) {
    let terrain_tree: RTree<IndexedNode> = RTree::bulk_load(
        graph
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| matches!(n.source, NodeRef::Terrain(_)))
            .map(|(i, n)| GeomWithData::new([n.position.x, n.position.y], i))
            .collect(),
    );

    let mut snapped: HashMap<usize, usize> = HashMap::new();
    for road in roads {
        let indices: Vec<usize> = road
            .node_ids
            .iter()
            .zip(&road.points)
            .map(|(&id, &position)| graph.add_node(NodeRef::Road(id), position))
            .collect();

        for pair in indices.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if a == b {
                continue;
            }
            let length = kernel::distance(graph.nodes[a].position, graph.nodes[b].position);
            graph.add_edge(GraphEdge::new(a, b, length, EdgeType::Road));
        }

        let mut any_snapped = false;
        for &road_node in &indices {
            if snapped.contains_key(&road_node) {
                any_snapped = true;
                continue;
            }
            let position = graph.nodes[road_node].position;
            let Some(nearest) = terrain_tree.nearest_neighbor(&[position.x, position.y]) else {
                continue;
            };
            let terrain_node = nearest.data;
            let distance = kernel::distance(position, graph.nodes[terrain_node].position);
            if distance > snap_distance {
                continue;
            }
            graph.add_edge(GraphEdge::new(road_node, terrain_node, distance, EdgeType::Road));
            snapped.insert(road_node, terrain_node);
            report.road_snaps += 1;
            any_snapped = true;
        }

        if !any_snapped {
            report.unsnapped_roads += 1;
            tracing::debug!(way = road.way_id, "road too far from terrain to snap");
        }
    }
}
