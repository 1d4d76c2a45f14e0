use geo::{Coord, LineString};

use crate::config::BoundarySampling;
use crate::domain::{BoundaryEdge, BoundaryNode, WaterObstacle};
use crate::error::GeometryError;
use crate::geometry::kernel;

/// Minimum nodes for a ring to enclose anything
const MIN_RING_NODES: usize = 3;

/// Relative slack so a sample landing exactly on the ring start is not
/// emitted twice
const CLOSURE_EPSILON: f64 = 1e-9;

#[derive(Debug, Default)]
pub struct BoundaryOutput {
    pub nodes: Vec<BoundaryNode>,
    pub edges: Vec<BoundaryEdge>,
    /// Obstacles skipped for having fewer than three ring nodes
    pub degenerate: usize,
}

/// Ring coordinates without the closing duplicate or repeated vertices
fn ring_vertices(ring: &LineString<f64>) -> Vec<Coord<f64>> {
    let mut vertices: Vec<Coord<f64>> = Vec::with_capacity(ring.0.len());
    for &c in &ring.0 {
        if vertices.last() != Some(&c) {
            vertices.push(c);
        }
    }
    if vertices.len() > 1 && vertices.first() == vertices.last() {
        vertices.pop();
    }
    vertices
}

/// Points every `spacing` meters along the closed ring, starting at its
/// first vertex
fn interpolate_ring(vertices: &[Coord<f64>], spacing: f64) -> Vec<Coord<f64>> {
    let n = vertices.len();
    if n < 2 {
        return vertices.to_vec();
    }

    let segments: Vec<(Coord<f64>, Coord<f64>, f64)> = (0..n)
        .map(|i| {
            let a = vertices[i];
            let b = vertices[(i + 1) % n];
            (a, b, kernel::distance(a, b))
        })
        .collect();
    let total: f64 = segments.iter().map(|(_, _, len)| len).sum();
    let limit = total - CLOSURE_EPSILON * spacing;

    let mut samples = Vec::new();
    let mut k = 0usize;
    let mut walked = 0.0;
    for (a, b, len) in segments {
        if len <= 0.0 {
            continue;
        }
        loop {
            let next = k as f64 * spacing;
            if next >= walked + len || next >= limit {
                break;
            }
            let t = (next - walked) / len;
            samples.push(Coord {
                x: a.x + t * (b.x - a.x),
                y: a.y + t * (b.y - a.y),
            });
            k += 1;
        }
        walked += len;
    }
    samples
}

/// Ordered boundary positions of one obstacle's exterior ring
pub fn sample_ring(
    obstacle: &WaterObstacle,
    spacing: f64,
    sampling: BoundarySampling,
) -> Result<Vec<Coord<f64>>, GeometryError> {
    let vertices = ring_vertices(obstacle.polygon.exterior());
    let samples = match sampling {
        BoundarySampling::Vertices => vertices,
        BoundarySampling::Interpolated => interpolate_ring(&vertices, spacing),
    };

    if samples.len() < MIN_RING_NODES {
        return Err(GeometryError::Degenerate(format!(
            "obstacle {} has {} ring nodes after sampling",
            obstacle.id,
            samples.len()
        )));
    }
    Ok(samples)
}

/// Sample boundary nodes on every obstacle ring and link them into closed
/// rings.
///
/// Node ids are global and follow obstacle order, then ring order, so
/// "next" is always `sequence_index + 1` and the last node wraps to the
/// first.
pub fn extract_boundaries(
    obstacles: &[WaterObstacle],
    spacing: f64,
    sampling: BoundarySampling,
) -> BoundaryOutput {
    let mut output = BoundaryOutput::default();

    for obstacle in obstacles {
        let samples = match sample_ring(obstacle, spacing, sampling) {
            Ok(samples) => samples,
            Err(e) => {
                tracing::warn!("skipping obstacle: {}", e);
                output.degenerate += 1;
                continue;
            }
        };

        let first_id = output.nodes.len() as u64;
        let count = samples.len();
        for (sequence_index, position) in samples.into_iter().enumerate() {
            output.nodes.push(BoundaryNode {
                id: first_id + sequence_index as u64,
                water_obstacle_id: obstacle.id,
                sequence_index,
                position,
            });
        }

        let ring = &output.nodes[first_id as usize..];
        let edges: Vec<BoundaryEdge> = (0..count)
            .map(|i| {
                let a = &ring[i];
                let b = &ring[(i + 1) % count];
                BoundaryEdge {
                    source: a.id,
                    target: b.id,
                    water_obstacle_id: obstacle.id,
                    length: kernel::distance(a.position, b.position),
                }
            })
            .collect();
        output.edges.extend(edges);
    }

    output
}
