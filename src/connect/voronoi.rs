//! Voronoi-partition strategies.
//!
//! A Voronoi cell of seed `s` is the set of positions closer to `s` than to
//! any other seed, so cell membership is answered by a nearest-vertex query
//! on the Delaunay triangulation of the seeds. Cells are clipped to the
//! seed envelope grown by `max_connection_distance`.
//!
//! Construction goes through a recovery ladder:
//! 1. seeds closer than `voronoi_tolerance` are merged
//! 2. if the diagram still cannot be built, seeds are jittered
//!    deterministically by up to `voronoi_tolerance`
//! 3. otherwise an error is returned and the caller falls back

use geo::Coord;
use spade::{DelaunayTriangulation, HasPosition, Point2, Triangulation};
use std::collections::{BTreeMap, BTreeSet};

use super::{Candidate, ConnectionInput, ConnectionStrategy};
use crate::config::{PipelineConfig, StrategyKind};
use crate::error::GeometryError;
use crate::geometry::{Bounds, kernel};

/// Relative slack under which two seed distances count as a tie
const TIE_EPSILON: f64 = 1e-9;

/// A Voronoi site as the caller sees it
#[derive(Debug, Clone, Copy)]
pub(crate) struct Site {
    pub position: Coord<f64>,
    /// Caller's index, returned by [`VoronoiCells::owner`]
    pub index: usize,
    /// Entity id; equidistant sites resolve to the lowest one
    pub id: u64,
}

#[derive(Debug, Clone, Copy)]
struct Seed {
    position: Point2<f64>,
    /// Position before any jitter, used for tie checks
    origin: Coord<f64>,
    index: usize,
    id: u64,
}

impl HasPosition for Seed {
    type Scalar = f64;

    fn position(&self) -> Point2<f64> {
        self.position
    }
}

/// Voronoi cells over a set of seeds, clipped to an envelope
pub(crate) struct VoronoiCells {
    triangulation: DelaunayTriangulation<Seed>,
    envelope: Bounds,
}

impl VoronoiCells {
    pub(crate) fn build(
        sites: &[Site],
        tolerance: f64,
        clip_margin: f64,
    ) -> Result<Self, GeometryError> {
        let positions: Vec<Coord<f64>> = sites.iter().map(|s| s.position).collect();
        let envelope = Bounds::from_points(&positions)
            .ok_or_else(|| GeometryError::Degenerate("no finite Voronoi seeds".to_string()))?
            .expanded(clip_margin);

        let distinct = merge_close_seeds(sites, tolerance);
        if distinct.len() < 2 {
            return Err(GeometryError::Degenerate(format!(
                "{} distinct Voronoi seed(s)",
                distinct.len()
            )));
        }

        let seeds: Vec<Seed> = distinct
            .iter()
            .map(|site| Seed {
                position: Point2::new(site.position.x, site.position.y),
                origin: site.position,
                index: site.index,
                id: site.id,
            })
            .collect();

        let triangulation = match triangulate(seeds.clone()) {
            Ok(t) => t,
            Err(first) => {
                tracing::debug!("voronoi construction failed ({}), jittering seeds", first);
                let jittered: Vec<Seed> = seeds
                    .into_iter()
                    .map(|seed| {
                        let (dx, dy) = kernel::jitter(seed.index as u64);
                        Seed {
                            position: Point2::new(
                                seed.origin.x + dx * tolerance,
                                seed.origin.y + dy * tolerance,
                            ),
                            ..seed
                        }
                    })
                    .collect();
                triangulate(jittered)?
            }
        };

        Ok(Self {
            triangulation,
            envelope,
        })
    }

    /// Caller index of the seed whose cell contains `c`. A position on a
    /// cell border belongs to the lowest id among the tied seeds.
    pub(crate) fn owner(&self, c: Coord<f64>) -> Option<usize> {
        if !self.envelope.contains(c) {
            return None;
        }
        let nearest = self
            .triangulation
            .nearest_neighbor(Point2::new(c.x, c.y))?;
        let best_d = kernel::distance(c, nearest.data().origin);
        let slack = TIE_EPSILON * best_d.max(1.0);

        // seeds equidistant from `c` lie on one empty circle, so they are
        // reachable from each other over Delaunay edges
        let mut best = *nearest.data();
        let mut visited = BTreeSet::from([best.index]);
        let mut stack = vec![nearest];
        while let Some(vertex) = stack.pop() {
            for edge in vertex.out_edges() {
                let neighbour = edge.to();
                let seed = *neighbour.data();
                if !visited.insert(seed.index) {
                    continue;
                }
                if (kernel::distance(c, seed.origin) - best_d).abs() <= slack {
                    if seed.id < best.id {
                        best = seed;
                    }
                    stack.push(neighbour);
                }
            }
        }
        Some(best.index)
    }
}

/// Keep one seed, the lowest id, of every group closer than `tolerance`.
/// Groups stay in order of first appearance.
fn merge_close_seeds(sites: &[Site], tolerance: f64) -> Vec<Site> {
    let key_of = |c: Coord<f64>| -> (i64, i64) {
        if tolerance > 0.0 {
            ((c.x / tolerance).round() as i64, (c.y / tolerance).round() as i64)
        } else {
            (c.x.to_bits() as i64, c.y.to_bits() as i64)
        }
    };
    let mut kept: BTreeMap<(i64, i64), Site> = BTreeMap::new();
    let mut order = Vec::new();

    for site in sites {
        let c = site.position;
        if !(c.x.is_finite() && c.y.is_finite()) {
            continue;
        }
        let key = key_of(c);
        match kept.get_mut(&key) {
            Some(existing) if site.id < existing.id => *existing = *site,
            Some(_) => {}
            None => {
                kept.insert(key, *site);
                order.push(key);
            }
        }
    }

    order.into_iter().filter_map(|key| kept.remove(&key)).collect()
}

fn triangulate(seeds: Vec<Seed>) -> Result<DelaunayTriangulation<Seed>, GeometryError> {
    let triangulation = DelaunayTriangulation::<Seed>::bulk_load(seeds)
        .map_err(|e| GeometryError::SpatialLibrary(format!("{:?}", e)))?;

    // with three or more collinear seeds the diagram has no vertices
    if triangulation.num_vertices() > 2 && triangulation.num_inner_faces() == 0 {
        return Err(GeometryError::SpatialLibrary(
            "all Voronoi seeds are collinear".to_string(),
        ));
    }
    Ok(triangulation)
}

/// Cells seeded by boundary nodes; each terrain point links to the node
/// whose cell contains it.
pub struct VoronoiOnNodes;

impl ConnectionStrategy for VoronoiOnNodes {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Voronoi
    }

    fn assign_connections(
        &self,
        input: &ConnectionInput,
        config: &PipelineConfig,
    ) -> Result<Vec<Candidate>, GeometryError> {
        let seeds: Vec<Site> = input
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| Site {
                position: n.position,
                index: i,
                id: n.id,
            })
            .collect();
        let cells = VoronoiCells::build(
            &seeds,
            config.voronoi_tolerance,
            config.max_connection_distance,
        )?;

        Ok((0..input.points.len())
            .filter_map(|point| {
                let node = cells.owner(input.point_position(point))?;
                Some(Candidate::new(input, point, node))
            })
            .collect())
    }
}

/// Cells seeded by boundary terrain points; each boundary node links to the
/// point whose cell contains it. Node load ends up spread more evenly than
/// with node-seeded cells.
pub struct VoronoiOnTerrainPoints;

impl ConnectionStrategy for VoronoiOnTerrainPoints {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ReversedVoronoi
    }

    fn assign_connections(
        &self,
        input: &ConnectionInput,
        config: &PipelineConfig,
    ) -> Result<Vec<Candidate>, GeometryError> {
        let seeds: Vec<Site> = input
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| Site {
                position: p.position,
                index: i,
                id: p.id,
            })
            .collect();
        let cells = VoronoiCells::build(
            &seeds,
            config.voronoi_tolerance,
            config.max_connection_distance,
        )?;

        Ok((0..input.nodes.len())
            .filter_map(|node| {
                let point = cells.owner(input.node_position(node))?;
                Some(Candidate::new(input, point, node))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connect::test_support::*;
    use crate::domain::BoundaryNode;
    use crate::geometry::ObstacleIndex;

    fn seeds(coords: &[(f64, f64)]) -> Vec<Site> {
        coords
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| Site {
                position: Coord { x, y },
                index: i,
                id: i as u64,
            })
            .collect()
    }

    fn node(id: u64, x: f64, y: f64) -> BoundaryNode {
        BoundaryNode {
            id,
            water_obstacle_id: 0,
            sequence_index: id as usize,
            position: Coord { x, y },
        }
    }

    #[test]
    fn test_owner_is_nearest_seed() {
        let cells =
            VoronoiCells::build(&seeds(&[(0.0, 0.0), (10.0, 0.0), (5.0, 10.0)]), 0.01, 50.0)
                .unwrap();
        assert_eq!(cells.owner(Coord { x: 1.0, y: 1.0 }), Some(0));
        assert_eq!(cells.owner(Coord { x: 9.0, y: 0.5 }), Some(1));
        assert_eq!(cells.owner(Coord { x: 5.0, y: 9.0 }), Some(2));
        // clipped away
        assert_eq!(cells.owner(Coord { x: 500.0, y: 0.0 }), None);
    }

    #[test]
    fn test_duplicate_seeds_are_merged() {
        let cells = VoronoiCells::build(
            &seeds(&[(0.0, 0.0), (0.0, 0.0), (10.0, 0.0), (5.0, 10.0)]),
            0.01,
            50.0,
        )
        .unwrap();
        assert_eq!(cells.owner(Coord { x: 0.5, y: 0.5 }), Some(0));
    }

    #[test]
    fn test_single_seed_is_degenerate() {
        let result = VoronoiCells::build(&seeds(&[(0.0, 0.0), (0.0, 0.0)]), 0.01, 50.0);
        assert!(matches!(result, Err(GeometryError::Degenerate(_))));
    }

    #[test]
    fn test_collinear_seeds_recover_by_jitter() {
        let cells = VoronoiCells::build(
            &seeds(&[(0.0, 0.0), (10.0, 0.0), (20.0, 0.0), (30.0, 0.0)]),
            0.01,
            50.0,
        )
        .unwrap();
        assert_eq!(cells.owner(Coord { x: 19.0, y: 3.0 }), Some(2));
        assert_eq!(cells.owner(Coord { x: 31.0, y: -3.0 }), Some(3));
    }

    #[test]
    fn test_two_seeds_need_no_recovery() {
        let cells = VoronoiCells::build(&seeds(&[(0.0, 0.0), (10.0, 0.0)]), 0.01, 50.0).unwrap();
        assert_eq!(cells.owner(Coord { x: 2.0, y: 7.0 }), Some(0));
        assert_eq!(cells.owner(Coord { x: 8.0, y: -7.0 }), Some(1));
    }

    #[test]
    fn test_cell_border_goes_to_lowest_id() {
        // ids run against the index order
        let mut sites = seeds(&[(10.0, 0.0), (-10.0, 0.0), (0.0, 30.0), (0.0, -30.0)]);
        for (site, id) in sites.iter_mut().zip([7, 3, 5, 1]) {
            site.id = id;
        }
        let cells = VoronoiCells::build(&sites, 0.01, 50.0).unwrap();
        assert_eq!(cells.owner(Coord { x: 0.0, y: 0.0 }), Some(1));

        // four cocircular seeds around the query
        let mut square = seeds(&[(10.0, 0.0), (0.0, 10.0), (-10.0, 0.0), (0.0, -10.0)]);
        for (site, id) in square.iter_mut().zip([8, 6, 9, 2]) {
            site.id = id;
        }
        let cells = VoronoiCells::build(&square, 0.01, 50.0).unwrap();
        assert_eq!(cells.owner(Coord { x: 0.0, y: 0.0 }), Some(3));
    }

    #[test]
    fn test_merged_seeds_keep_lowest_id() {
        let mut sites = seeds(&[(0.0, 0.0), (0.0, 0.0), (10.0, 0.0), (5.0, 10.0)]);
        sites[0].id = 42;
        let cells = VoronoiCells::build(&sites, 0.01, 50.0).unwrap();
        assert_eq!(cells.owner(Coord { x: 0.5, y: 0.5 }), Some(1));
    }

    #[test]
    fn test_node_cells_tie_to_lowest_node_id() {
        let terrain = vec![boundary_point(0, 0.0, 0.0)];
        let obstacles = ObstacleIndex::new(vec![]);

        for nodes in [
            vec![node(7, 10.0, 0.0), node(3, -10.0, 0.0), node(5, 0.0, 30.0)],
            vec![node(3, -10.0, 0.0), node(7, 10.0, 0.0), node(5, 0.0, 30.0)],
        ] {
            let input = ConnectionInput::new(&terrain, &nodes, &obstacles);
            let found = VoronoiOnNodes
                .assign_connections(&input, &PipelineConfig::default())
                .unwrap();
            assert_eq!(found.len(), 1);
            assert_eq!(nodes[found[0].node].id, 3);
        }
    }

    #[test]
    fn test_point_cells_tie_to_lowest_point_id() {
        let nodes = vec![node(0, 0.0, 0.0)];
        let obstacles = ObstacleIndex::new(vec![]);

        for terrain in [
            vec![
                boundary_point(9, 10.0, 0.0),
                boundary_point(4, -10.0, 0.0),
                boundary_point(6, 0.0, 30.0),
            ],
            vec![
                boundary_point(4, -10.0, 0.0),
                boundary_point(9, 10.0, 0.0),
                boundary_point(6, 0.0, 30.0),
            ],
        ] {
            let input = ConnectionInput::new(&terrain, &nodes, &obstacles);
            let found = VoronoiOnTerrainPoints
                .assign_connections(&input, &PipelineConfig::default())
                .unwrap();
            assert_eq!(found.len(), 1);
            assert_eq!(input.points[found[0].point].id, 4);
        }
    }
}
