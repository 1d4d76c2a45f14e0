use geo::{Coord, Line};
use rayon::prelude::*;
use spade::{DelaunayTriangulation, HasPosition, Point2, Triangulation};
use std::collections::HashMap;

use crate::config::{GridConfig, GridKind};
use crate::domain::{TerrainClass, TerrainEdge, TerrainPoint};
use crate::geometry::{Bounds, ObstacleIndex, kernel};

/// Fraction of the spacing a Delaunay sample may drift from its lattice slot
const SAMPLE_JITTER: f64 = 0.3;

/// Delaunay edges longer than this many spacings are hull artifacts
const MAX_DELAUNAY_EDGE: f64 = 2.0;

#[derive(Debug, Default)]
pub struct TerrainGrid {
    pub points: Vec<TerrainPoint>,
    pub edges: Vec<TerrainEdge>,
}

impl TerrainGrid {
    pub fn count(&self, class: TerrainClass) -> usize {
        self.points.iter().filter(|p| p.class == class).count()
    }
}

/// Lattice slot of a sample, used as the deterministic merge key
type Slot = (usize, usize);

struct Lattice {
    kind: GridKind,
    origin: Coord<f64>,
    spacing: f64,
    row_step: f64,
    rows: usize,
    cols: usize,
}

impl Lattice {
    fn new(area: &Bounds, config: &GridConfig) -> Self {
        let spacing = config.spacing;
        let row_step = match config.kind {
            GridKind::Hex => spacing * 3f64.sqrt() / 2.0,
            GridKind::Square | GridKind::Delaunay => spacing,
        };
        Self {
            kind: config.kind,
            origin: Coord {
                x: area.min_x,
                y: area.min_y,
            },
            spacing,
            row_step,
            rows: (area.height() / row_step).floor() as usize + 1,
            cols: (area.width() / spacing).floor() as usize + 1,
        }
    }

    fn position(&self, (row, col): Slot) -> Coord<f64> {
        let mut x = self.origin.x + col as f64 * self.spacing;
        let mut y = self.origin.y + row as f64 * self.row_step;

        match self.kind {
            GridKind::Hex if row % 2 == 1 => x += self.spacing / 2.0,
            GridKind::Delaunay => {
                let (dx, dy) = kernel::jitter(((row as u64) << 32) | col as u64);
                x += dx * SAMPLE_JITTER * self.spacing;
                y += dy * SAMPLE_JITTER * self.spacing;
            }
            _ => {}
        }
        Coord { x, y }
    }

    /// Forward neighbours of a slot, so each undirected pair is listed once
    fn forward_neighbours(&self, (row, col): Slot) -> Vec<Slot> {
        let mut out = vec![(row, col + 1)];
        match self.kind {
            GridKind::Square | GridKind::Delaunay => {
                out.push((row + 1, col));
                out.push((row + 1, col + 1));
                if col > 0 {
                    out.push((row + 1, col - 1));
                }
            }
            GridKind::Hex => {
                // odd rows are shifted right by half a spacing
                if row % 2 == 0 {
                    if col > 0 {
                        out.push((row + 1, col - 1));
                    }
                    out.push((row + 1, col));
                } else {
                    out.push((row + 1, col));
                    out.push((row + 1, col + 1));
                }
            }
        }
        out
    }

    /// Row/column ranges of the chunks covering the lattice
    fn chunks(&self, chunk_size: f64) -> Vec<(std::ops::Range<usize>, std::ops::Range<usize>)> {
        let rows_per_chunk = ((chunk_size / self.row_step).floor() as usize).max(1);
        let cols_per_chunk = ((chunk_size / self.spacing).floor() as usize).max(1);

        let mut chunks = Vec::new();
        for row_start in (0..self.rows).step_by(rows_per_chunk) {
            for col_start in (0..self.cols).step_by(cols_per_chunk) {
                chunks.push((
                    row_start..(row_start + rows_per_chunk).min(self.rows),
                    col_start..(col_start + cols_per_chunk).min(self.cols),
                ));
            }
        }
        chunks
    }
}

fn classify(position: Coord<f64>, obstacles: &ObstacleIndex, adjacency: f64) -> TerrainClass {
    if obstacles.containing(position).is_some() {
        TerrainClass::Water
    } else if obstacles.nearest_within(position, adjacency).is_some() {
        TerrainClass::Boundary
    } else {
        TerrainClass::Land
    }
}

/// Tile `area` with terrain samples, classify them against the obstacles
/// and link routable neighbours.
///
/// Chunks of `config.chunk_size` meters are sampled and classified in
/// parallel; the merge sorts by lattice slot so ids never depend on thread
/// scheduling.
pub fn generate_grid(area: &Bounds, obstacles: &ObstacleIndex, config: &GridConfig) -> TerrainGrid {
    let lattice = Lattice::new(area, config);
    let adjacency = config.adjacency_distance();
    let chunks = lattice.chunks(config.chunk_size);

    tracing::debug!(
        rows = lattice.rows,
        cols = lattice.cols,
        chunks = chunks.len(),
        "sampling terrain"
    );

    let mut samples: Vec<(Slot, Coord<f64>, TerrainClass)> = chunks
        .par_iter()
        .flat_map_iter(|(rows, cols)| {
            let lattice = &lattice;
            rows.clone().flat_map(move |row| {
                cols.clone().map(move |col| {
                    let position = lattice.position((row, col));
                    ((row, col), position, classify(position, obstacles, adjacency))
                })
            })
        })
        .collect();
    samples.sort_by_key(|(slot, _, _)| *slot);

    let mut slots: HashMap<Slot, usize> = HashMap::with_capacity(samples.len());
    let points: Vec<TerrainPoint> = samples
        .into_iter()
        .enumerate()
        .map(|(i, (slot, position, class))| {
            slots.insert(slot, i);
            TerrainPoint::new(i as u64, position, class)
        })
        .collect();

    let candidates = match lattice.kind {
        GridKind::Delaunay => match delaunay_pairs(&points, config.spacing) {
            Ok(pairs) => pairs,
            Err(e) => {
                tracing::warn!("delaunay triangulation failed ({:?}), using lattice edges", e);
                lattice_pairs(&lattice, &slots, &points)
            }
        },
        GridKind::Square | GridKind::Hex => lattice_pairs(&lattice, &slots, &points),
    };

    let edges: Vec<TerrainEdge> = candidates
        .par_iter()
        .filter_map(|&(a, b)| {
            let (pa, pb) = (&points[a], &points[b]);
            if obstacles.crosses_any(Line::new(pa.position, pb.position)) {
                return None;
            }
            Some(TerrainEdge {
                source: pa.id,
                target: pb.id,
                length: kernel::distance(pa.position, pb.position),
            })
        })
        .collect();

    TerrainGrid { points, edges }
}

fn lattice_pairs(
    lattice: &Lattice,
    slots: &HashMap<Slot, usize>,
    points: &[TerrainPoint],
) -> Vec<(usize, usize)> {
    let mut ordered: Vec<(&Slot, &usize)> = slots.iter().collect();
    ordered.sort_by_key(|(_, i)| **i);

    let mut pairs = Vec::new();
    for (slot, &a) in ordered {
        if !points[a].is_routable() {
            continue;
        }
        for neighbour in lattice.forward_neighbours(*slot) {
            if let Some(&b) = slots.get(&neighbour)
                && points[b].is_routable()
            {
                pairs.push((a, b));
            }
        }
    }
    pairs
}

#[derive(Debug, Clone, Copy)]
struct SampleVertex {
    position: Point2<f64>,
    index: usize,
}

impl HasPosition for SampleVertex {
    type Scalar = f64;

    fn position(&self) -> Point2<f64> {
        self.position
    }
}

/// Delaunay edges between routable samples, in ascending index order
fn delaunay_pairs(
    points: &[TerrainPoint],
    spacing: f64,
) -> Result<Vec<(usize, usize)>, spade::InsertionError> {
    let vertices: Vec<SampleVertex> = points
        .iter()
        .enumerate()
        .filter(|(_, p)| p.is_routable())
        .map(|(index, p)| SampleVertex {
            position: Point2::new(p.position.x, p.position.y),
            index,
        })
        .collect();

    let triangulation = DelaunayTriangulation::<SampleVertex>::bulk_load(vertices)?;
    let max_length = MAX_DELAUNAY_EDGE * spacing;

    let mut pairs: Vec<(usize, usize)> = triangulation
        .undirected_edges()
        .filter_map(|edge| {
            let [a, b] = edge.vertices();
            let (a, b) = (a.data().index, b.data().index);
            let length = kernel::distance(points[a].position, points[b].position);
            (length <= max_length).then_some((a.min(b), a.max(b)))
        })
        .collect();
    pairs.sort_unstable();
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn config(kind: GridKind, spacing: f64) -> GridConfig {
        GridConfig {
            kind,
            spacing,
            chunk_size: 30.0,
            ..Default::default()
        }
    }

    fn pond() -> ObstacleIndex {
        ObstacleIndex::new(vec![polygon![
            (x: 40.0, y: 40.0),
            (x: 60.0, y: 40.0),
            (x: 60.0, y: 60.0),
            (x: 40.0, y: 60.0),
        ]])
    }

    #[test]
    fn test_square_grid_without_obstacles() {
        let area = Bounds::new(0.0, 0.0, 20.0, 20.0);
        let grid = generate_grid(&area, &ObstacleIndex::new(vec![]), &config(GridKind::Square, 10.0));

        assert_eq!(grid.points.len(), 9);
        assert_eq!(grid.count(TerrainClass::Land), 9);
        // 3x3 lattice: 12 orthogonal + 8 diagonal
        assert_eq!(grid.edges.len(), 20);
    }

    #[test]
    fn test_ids_follow_lattice_order_across_chunks() {
        let area = Bounds::new(0.0, 0.0, 100.0, 100.0);
        let grid = generate_grid(&area, &ObstacleIndex::new(vec![]), &config(GridKind::Square, 10.0));

        assert_eq!(grid.points.len(), 121);
        for (i, point) in grid.points.iter().enumerate() {
            assert_eq!(point.id, i as u64);
            let row = i / 11;
            let col = i % 11;
            assert_eq!(point.position, Coord { x: col as f64 * 10.0, y: row as f64 * 10.0 });
        }
    }

    #[test]
    fn test_classification_around_pond() {
        let area = Bounds::new(0.0, 0.0, 100.0, 100.0);
        let grid = generate_grid(&area, &pond(), &config(GridKind::Square, 10.0));

        let at = |x: f64, y: f64| {
            grid.points
                .iter()
                .find(|p| p.position == Coord { x, y })
                .unwrap()
                .class
        };
        assert_eq!(at(50.0, 50.0), TerrainClass::Water);
        assert_eq!(at(30.0, 50.0), TerrainClass::Boundary);
        assert_eq!(at(0.0, 0.0), TerrainClass::Land);
    }

    #[test]
    fn test_edges_avoid_water() {
        let area = Bounds::new(0.0, 0.0, 100.0, 100.0);
        let obstacles = pond();
        let grid = generate_grid(&area, &obstacles, &config(GridKind::Square, 10.0));

        for edge in &grid.edges {
            let a = &grid.points[edge.source as usize];
            let b = &grid.points[edge.target as usize];
            assert!(a.is_routable() && b.is_routable());
            assert!(!obstacles.crosses_any(Line::new(a.position, b.position)));
        }
    }

    #[test]
    fn test_hex_grid_degree() {
        let area = Bounds::new(0.0, 0.0, 100.0, 100.0);
        let grid = generate_grid(&area, &ObstacleIndex::new(vec![]), &config(GridKind::Hex, 10.0));

        let mut degree = vec![0usize; grid.points.len()];
        for edge in &grid.edges {
            degree[edge.source as usize] += 1;
            degree[edge.target as usize] += 1;
        }
        assert!(degree.iter().all(|&d| d <= 6));
        assert_eq!(degree.iter().max(), Some(&6));
    }

    #[test]
    fn test_delaunay_grid_connects_samples() {
        let area = Bounds::new(0.0, 0.0, 100.0, 100.0);
        let grid = generate_grid(&area, &pond(), &config(GridKind::Delaunay, 10.0));

        assert!(grid.count(TerrainClass::Water) > 0);
        assert!(!grid.edges.is_empty());
        for edge in &grid.edges {
            assert!(edge.length <= MAX_DELAUNAY_EDGE * 10.0);
        }
    }
}
