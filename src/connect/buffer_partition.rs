use super::nearest::nearest_node;
use super::{Candidate, ConnectionInput, ConnectionStrategy};
use crate::config::{PipelineConfig, StrategyKind};
use crate::error::GeometryError;
use crate::geometry::kernel;

/// Every boundary node owns a disc of radius `buffer_distance`; a point
/// links to the closest node whose disc contains it. Points outside every
/// disc fall back to a nearest-node search within
/// `buffer_distance * buffer_fallback_factor`.
pub struct BufferPartition;

impl ConnectionStrategy for BufferPartition {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Buffer
    }

    fn assign_connections(
        &self,
        input: &ConnectionInput,
        config: &PipelineConfig,
    ) -> Result<Vec<Candidate>, GeometryError> {
        let radius = config.buffer_distance;
        let fallback_radius = radius * config.buffer_fallback_factor.max(1.0);
        let mut fallbacks = 0usize;

        let candidates = (0..input.points.len())
            .filter_map(|point| {
                let c = input.point_position(point);
                let owner = input
                    .node_tree()
                    .locate_within_distance([c.x, c.y], radius * radius)
                    .map(|entry| entry.data)
                    .min_by(|&a, &b| {
                        let da = kernel::distance(c, input.node_position(a));
                        let db = kernel::distance(c, input.node_position(b));
                        da.total_cmp(&db)
                            .then(input.nodes[a].id.cmp(&input.nodes[b].id))
                    });

                let node = match owner {
                    Some(node) => node,
                    None => {
                        fallbacks += 1;
                        nearest_node(input, c, Some(fallback_radius))?
                    }
                };
                Some(Candidate::new(input, point, node))
            })
            .collect();

        if fallbacks > 0 {
            tracing::debug!(fallbacks, "points outside every node buffer");
        }
        Ok(candidates)
    }
}
