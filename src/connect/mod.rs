//! Connection strategies joining boundary terrain points to the boundary
//! nodes of water obstacles.
//!
//! Every strategy proposes [`Candidate`]s through the common
//! [`ConnectionStrategy`] interface. Failures come back as
//! [`GeometryError`] values and the caller walks an explicit fallback
//! chain; whichever strategy succeeds, its candidates then go through the
//! shared post-filter (no obstacle crossing, distance bound, per-point and
//! per-node caps).

pub mod buffer_partition;
pub mod filter;
pub mod nearest;
pub mod voronoi;

use geo::Coord;
use rstar::RTree;
use rstar::primitives::GeomWithData;

use crate::config::{PipelineConfig, StrategyKind};
use crate::domain::{BoundaryNode, ConnectionEdge, TerrainClass, TerrainPoint};
use crate::error::GeometryError;
use crate::geometry::ObstacleIndex;

pub use buffer_partition::BufferPartition;
pub use filter::{FilterReport, filter_candidates};
pub use nearest::NearestNeighbor;
pub use voronoi::{VoronoiOnNodes, VoronoiOnTerrainPoints};

type IndexedNode = GeomWithData<[f64; 2], usize>;

/// Read-only view of everything a strategy may look at
pub struct ConnectionInput<'a> {
    /// Terrain points classified `boundary`; land and water points never
    /// take part in connections
    pub points: Vec<&'a TerrainPoint>,
    pub nodes: &'a [BoundaryNode],
    pub obstacles: &'a ObstacleIndex,
    node_tree: RTree<IndexedNode>,
}

impl<'a> ConnectionInput<'a> {
    pub fn new(
        terrain: &'a [TerrainPoint],
        nodes: &'a [BoundaryNode],
        obstacles: &'a ObstacleIndex,
    ) -> Self {
        let points: Vec<&TerrainPoint> = terrain
            .iter()
            .filter(|p| p.class == TerrainClass::Boundary)
            .collect();
        let node_tree = RTree::bulk_load(
            nodes
                .iter()
                .enumerate()
                .map(|(i, n)| GeomWithData::new([n.position.x, n.position.y], i))
                .collect(),
        );

        Self {
            points,
            nodes,
            obstacles,
            node_tree,
        }
    }

    pub fn point_position(&self, point: usize) -> Coord<f64> {
        self.points[point].position
    }

    pub fn node_position(&self, node: usize) -> Coord<f64> {
        self.nodes[node].position
    }

    pub(crate) fn node_tree(&self) -> &RTree<IndexedNode> {
        &self.node_tree
    }
}

/// Proposed link between `input.points[point]` and `input.nodes[node]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub point: usize,
    pub node: usize,
    pub distance: f64,
}

impl Candidate {
    pub fn new(input: &ConnectionInput, point: usize, node: usize) -> Self {
        Self {
            point,
            node,
            distance: crate::geometry::kernel::distance(
                input.point_position(point),
                input.node_position(node),
            ),
        }
    }
}

pub trait ConnectionStrategy {
    fn kind(&self) -> StrategyKind;

    fn assign_connections(
        &self,
        input: &ConnectionInput,
        config: &PipelineConfig,
    ) -> Result<Vec<Candidate>, GeometryError>;
}

/// Strategies to try, in order, for the configured kind
pub fn fallback_chain(kind: StrategyKind) -> Vec<Box<dyn ConnectionStrategy>> {
    match kind {
        StrategyKind::Nearest => vec![Box::new(NearestNeighbor::unbounded())],
        StrategyKind::Buffer => vec![Box::new(BufferPartition)],
        StrategyKind::Voronoi => vec![Box::new(VoronoiOnNodes), Box::new(BufferPartition)],
        StrategyKind::ReversedVoronoi => vec![
            Box::new(VoronoiOnTerrainPoints),
            Box::new(NearestNeighbor::unbounded()),
        ],
    }
}

/// Result of the connection stage
#[derive(Debug, Default)]
pub struct ConnectionOutcome {
    pub edges: Vec<ConnectionEdge>,
    /// Strategy whose candidates were kept; `None` when nothing ran
    pub strategy_used: Option<StrategyKind>,
    /// Strategies that failed before one succeeded
    pub fallbacks: Vec<(StrategyKind, GeometryError)>,
    pub filter: FilterReport,
    /// Boundary terrain points left without any connection
    pub unconnected_points: Vec<u64>,
    /// Boundary nodes left without any connection
    pub unconnected_nodes: Vec<u64>,
}

/// Run the configured strategy (falling back along its chain) and apply
/// the post-filter.
pub fn build_connections(input: &ConnectionInput, config: &PipelineConfig) -> ConnectionOutcome {
    let mut outcome = ConnectionOutcome::default();

    if input.points.is_empty() || input.nodes.is_empty() {
        outcome.unconnected_points = input.points.iter().map(|p| p.id).collect();
        outcome.unconnected_nodes = input.nodes.iter().map(|n| n.id).collect();
        return outcome;
    }

    let mut candidates = Vec::new();
    for strategy in fallback_chain(config.strategy) {
        match strategy.assign_connections(input, config) {
            Ok(found) => {
                outcome.strategy_used = Some(strategy.kind());
                candidates = found;
                break;
            }
            Err(e) => {
                tracing::warn!(
                    strategy = strategy.kind().as_str(),
                    "connection strategy failed, falling back: {}",
                    e
                );
                outcome.fallbacks.push((strategy.kind(), e));
            }
        }
    }

    let Some(strategy_used) = outcome.strategy_used else {
        outcome.unconnected_points = input.points.iter().map(|p| p.id).collect();
        outcome.unconnected_nodes = input.nodes.iter().map(|n| n.id).collect();
        return outcome;
    };

    let (accepted, report) = filter_candidates(candidates, input, config);
    outcome.filter = report;

    let mut point_seen = vec![false; input.points.len()];
    let mut node_seen = vec![false; input.nodes.len()];
    for candidate in &accepted {
        point_seen[candidate.point] = true;
        node_seen[candidate.node] = true;
    }

    outcome.unconnected_points = input
        .points
        .iter()
        .zip(&point_seen)
        .filter(|(_, seen)| !**seen)
        .map(|(p, _)| p.id)
        .collect();
    outcome.unconnected_nodes = input
        .nodes
        .iter()
        .zip(&node_seen)
        .filter(|(_, seen)| !**seen)
        .map(|(n, _)| n.id)
        .collect();

    for point_id in &outcome.unconnected_points {
        tracing::trace!("{}", GeometryError::NoCandidate { point_id: *point_id });
    }

    outcome.edges = accepted
        .into_iter()
        .map(|c| {
            let node = &input.nodes[c.node];
            ConnectionEdge {
                terrain_point_id: input.points[c.point].id,
                boundary_node_id: node.id,
                water_obstacle_id: node.water_obstacle_id,
                distance: c.distance,
                strategy: strategy_used,
            }
        })
        .collect();

    tracing::debug!(
        strategy = strategy_used.as_str(),
        edges = outcome.edges.len(),
        unconnected_points = outcome.unconnected_points.len(),
        unconnected_nodes = outcome.unconnected_nodes.len(),
        "connections built"
    );

    outcome
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::config::BoundarySampling;
    use crate::domain::WaterObstacle;
    use crate::stages::boundary::extract_boundaries;
    use geo::{Polygon, polygon};

    pub fn square(min: f64, max: f64) -> Polygon<f64> {
        polygon![
            (x: min, y: min),
            (x: max, y: min),
            (x: max, y: max),
            (x: min, y: max),
        ]
    }

    /// Boundary nodes of a single square obstacle
    pub fn square_nodes(min: f64, max: f64, spacing: f64) -> Vec<BoundaryNode> {
        let obstacle = WaterObstacle {
            id: 0,
            polygon: square(min, max),
            crossability: 0,
            source_ids: vec![1],
        };
        extract_boundaries(&[obstacle], spacing, BoundarySampling::Interpolated).nodes
    }

    pub fn boundary_point(id: u64, x: f64, y: f64) -> TerrainPoint {
        TerrainPoint::new(id, Coord { x, y }, TerrainClass::Boundary)
    }

    /// Boundary points on a square ring `offset` meters outside `min..max`
    pub fn ring_points(min: f64, max: f64, offset: f64, step: f64) -> Vec<TerrainPoint> {
        let lo = min - offset;
        let hi = max + offset;
        let steps = ((hi - lo) / step).round() as usize;
        let mut coords = Vec::new();
        for i in 0..steps {
            let t = lo + i as f64 * step;
            coords.push((t, lo));
            coords.push((hi, t));
            coords.push((hi - (t - lo), hi));
            coords.push((lo, hi - (t - lo)));
        }
        coords
            .into_iter()
            .enumerate()
            .map(|(i, (x, y))| boundary_point(i as u64, x, y))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use geo::Line;

    fn config(strategy: StrategyKind) -> PipelineConfig {
        PipelineConfig {
            strategy,
            ..Default::default()
        }
    }

    fn std_dev_per_node(outcome: &ConnectionOutcome, nodes: &[BoundaryNode]) -> f64 {
        let counts: Vec<f64> = nodes
            .iter()
            .map(|n| {
                outcome
                    .edges
                    .iter()
                    .filter(|e| e.boundary_node_id == n.id)
                    .count() as f64
            })
            .collect();
        let mean = counts.iter().sum::<f64>() / counts.len() as f64;
        (counts.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / counts.len() as f64).sqrt()
    }

    #[test]
    fn test_square_scenario_nearest() {
        let nodes = square_nodes(0.0, 100.0, 25.0);
        assert_eq!(nodes.len(), 16);

        let terrain = vec![boundary_point(0, 150.0, 50.0)];
        let obstacles = ObstacleIndex::new(vec![square(0.0, 100.0)]);
        let input = ConnectionInput::new(&terrain, &nodes, &obstacles);

        let outcome = build_connections(&input, &config(StrategyKind::Nearest));
        assert_eq!(outcome.strategy_used, Some(StrategyKind::Nearest));
        assert_eq!(outcome.edges.len(), 1);

        let edge = outcome.edges[0];
        let node = nodes.iter().find(|n| n.id == edge.boundary_node_id).unwrap();
        assert_eq!(node.position, Coord { x: 100.0, y: 50.0 });
        assert_eq!(edge.distance, 50.0);
        assert_eq!(edge.water_obstacle_id, 0);
        assert!(outcome.unconnected_points.is_empty());
    }

    #[test]
    fn test_only_boundary_points_take_part() {
        let nodes = square_nodes(0.0, 100.0, 25.0);
        let terrain = vec![
            TerrainPoint::new(0, Coord { x: 50.0, y: 50.0 }, TerrainClass::Water),
            TerrainPoint::new(1, Coord { x: 500.0, y: 500.0 }, TerrainClass::Land),
            boundary_point(2, 110.0, 50.0),
        ];
        let obstacles = ObstacleIndex::new(vec![square(0.0, 100.0)]);
        let input = ConnectionInput::new(&terrain, &nodes, &obstacles);
        assert_eq!(input.points.len(), 1);

        for kind in [
            StrategyKind::Nearest,
            StrategyKind::Buffer,
            StrategyKind::Voronoi,
            StrategyKind::ReversedVoronoi,
        ] {
            let outcome = build_connections(&input, &config(kind));
            assert!(outcome.edges.iter().all(|e| e.terrain_point_id == 2));
        }
    }

    #[test]
    fn test_no_strategy_produces_crossing_or_long_edges() {
        let nodes = square_nodes(0.0, 100.0, 10.0);
        let terrain = ring_points(0.0, 100.0, 15.0, 10.0);
        let obstacles = ObstacleIndex::new(vec![square(0.0, 100.0)]);
        let input = ConnectionInput::new(&terrain, &nodes, &obstacles);

        for kind in [
            StrategyKind::Nearest,
            StrategyKind::Buffer,
            StrategyKind::Voronoi,
            StrategyKind::ReversedVoronoi,
        ] {
            let cfg = PipelineConfig {
                strategy: kind,
                max_connection_distance: 40.0,
                ..Default::default()
            };
            let outcome = build_connections(&input, &cfg);
            assert_eq!(outcome.strategy_used, Some(kind));
            assert!(!outcome.edges.is_empty(), "{:?} produced no edges", kind);

            for edge in &outcome.edges {
                let p = terrain.iter().find(|p| p.id == edge.terrain_point_id).unwrap();
                let n = nodes.iter().find(|n| n.id == edge.boundary_node_id).unwrap();
                assert!(edge.distance <= 40.0);
                assert!(!crate::geometry::kernel::crosses(
                    Line::new(p.position, n.position),
                    &square(0.0, 100.0)
                ));
                assert_eq!(edge.strategy, kind);
            }
        }
    }

    #[test]
    fn test_caps_are_enforced() {
        let nodes = square_nodes(0.0, 100.0, 50.0);
        let terrain = ring_points(0.0, 100.0, 5.0, 5.0);
        let obstacles = ObstacleIndex::new(vec![square(0.0, 100.0)]);
        let input = ConnectionInput::new(&terrain, &nodes, &obstacles);

        let cfg = PipelineConfig {
            strategy: StrategyKind::Nearest,
            max_connections_per_node: 3,
            ..Default::default()
        };
        let outcome = build_connections(&input, &cfg);

        for node in &nodes {
            let count = outcome
                .edges
                .iter()
                .filter(|e| e.boundary_node_id == node.id)
                .count();
            assert!(count <= 3);
        }
        assert!(!outcome.unconnected_points.is_empty());
    }

    #[test]
    fn test_reversed_voronoi_is_more_even_than_nearest() {
        let nodes = square_nodes(0.0, 100.0, 50.0);
        let terrain = ring_points(0.0, 100.0, 10.0, 10.0);
        let obstacles = ObstacleIndex::new(vec![square(0.0, 100.0)]);
        let input = ConnectionInput::new(&terrain, &nodes, &obstacles);

        let nearest = build_connections(&input, &config(StrategyKind::Nearest));
        let reversed = build_connections(&input, &config(StrategyKind::ReversedVoronoi));
        assert_eq!(reversed.strategy_used, Some(StrategyKind::ReversedVoronoi));

        assert!(std_dev_per_node(&reversed, &nodes) <= std_dev_per_node(&nearest, &nodes));
    }

    #[test]
    fn test_voronoi_falls_back_to_buffer_on_degenerate_seeds() {
        // a single boundary node cannot seed a Voronoi diagram
        let nodes = vec![BoundaryNode {
            id: 0,
            water_obstacle_id: 0,
            sequence_index: 0,
            position: Coord { x: 100.0, y: 50.0 },
        }];
        let terrain = vec![boundary_point(0, 120.0, 50.0)];
        let obstacles = ObstacleIndex::new(vec![]);
        let input = ConnectionInput::new(&terrain, &nodes, &obstacles);

        let outcome = build_connections(&input, &config(StrategyKind::Voronoi));
        assert_eq!(outcome.strategy_used, Some(StrategyKind::Buffer));
        assert_eq!(outcome.fallbacks.len(), 1);
        assert!(matches!(outcome.fallbacks[0].1, GeometryError::Degenerate(_)));
        assert_eq!(outcome.edges.len(), 1);
        assert_eq!(outcome.edges[0].strategy, StrategyKind::Buffer);
    }

    #[test]
    fn test_reversed_voronoi_falls_back_to_nearest() {
        let nodes = square_nodes(0.0, 100.0, 25.0);
        let terrain = vec![boundary_point(0, 150.0, 50.0)];
        let obstacles = ObstacleIndex::new(vec![square(0.0, 100.0)]);
        let input = ConnectionInput::new(&terrain, &nodes, &obstacles);

        let outcome = build_connections(&input, &config(StrategyKind::ReversedVoronoi));
        assert_eq!(outcome.strategy_used, Some(StrategyKind::Nearest));
        assert_eq!(outcome.edges.len(), 1);
    }

    #[test]
    fn test_empty_input_reports_everything_unconnected() {
        let nodes = square_nodes(0.0, 100.0, 25.0);
        let terrain: Vec<TerrainPoint> = Vec::new();
        let obstacles = ObstacleIndex::new(vec![square(0.0, 100.0)]);
        let input = ConnectionInput::new(&terrain, &nodes, &obstacles);

        let outcome = build_connections(&input, &config(StrategyKind::Voronoi));
        assert!(outcome.edges.is_empty());
        assert_eq!(outcome.strategy_used, None);
        assert_eq!(outcome.unconnected_nodes.len(), 16);
    }
}
