use geo::Coord;

use super::{Candidate, ConnectionInput, ConnectionStrategy};
use crate::config::{PipelineConfig, StrategyKind};
use crate::error::GeometryError;
use crate::geometry::kernel;

/// Index of the closest boundary node to `c`, ties going to the lowest
/// node id. `radius` bounds the search when given.
pub(crate) fn nearest_node(
    input: &ConnectionInput,
    c: Coord<f64>,
    radius: Option<f64>,
) -> Option<usize> {
    let mut best: Option<(f64, u64, usize)> = None;

    for entry in input.node_tree().nearest_neighbor_iter(&[c.x, c.y]) {
        let node = entry.data;
        let d = kernel::distance(c, input.node_position(node));
        if radius.is_some_and(|r| d > r) {
            break;
        }
        // results arrive in distance order, so the first farther one ends
        // the run of ties
        if let Some((best_d, _, _)) = best
            && d > best_d
        {
            break;
        }

        let id = input.nodes[node].id;
        match best {
            Some((_, best_id, _)) if best_id <= id => {}
            _ => best = Some((d, id, node)),
        }
    }

    best.map(|(_, _, node)| node)
}

/// Each boundary terrain point links to its single closest boundary node.
pub struct NearestNeighbor {
    radius: Option<f64>,
}

impl NearestNeighbor {
    pub fn unbounded() -> Self {
        Self { radius: None }
    }

    pub fn within(radius: f64) -> Self {
        Self {
            radius: Some(radius),
        }
    }
}

impl ConnectionStrategy for NearestNeighbor {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Nearest
    }

    fn assign_connections(
        &self,
        input: &ConnectionInput,
        _config: &PipelineConfig,
    ) -> Result<Vec<Candidate>, GeometryError> {
        Ok((0..input.points.len())
            .filter_map(|point| {
                let node = nearest_node(input, input.point_position(point), self.radius)?;
                Some(Candidate::new(input, point, node))
            })
            .collect())
    }
}
