use geo::{Coord, Line};
use rayon::prelude::*;
use std::collections::HashSet;

use super::{Candidate, ConnectionInput};
use crate::config::PipelineConfig;
use crate::geometry::kernel;

/// Segments are shortened by this much at the node end before the crossing
/// test, since boundary nodes sit on the obstacle ring itself.
const NODE_END_TRIM: f64 = 1e-3;

/// Counts of candidates dropped by each rule
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FilterReport {
    pub duplicate: usize,
    pub too_far: usize,
    pub crossing: usize,
    pub over_cap: usize,
}

fn trimmed_segment(point: Coord<f64>, node: Coord<f64>) -> Option<Line<f64>> {
    let length = kernel::distance(point, node);
    if length <= 2.0 * NODE_END_TRIM {
        return None;
    }
    let keep = (length - NODE_END_TRIM) / length;
    Some(Line::new(
        point,
        Coord {
            x: point.x + keep * (node.x - point.x),
            y: point.y + keep * (node.y - point.y),
        },
    ))
}

/// Apply the shared post-filter to a strategy's candidates.
///
/// Drops duplicates, candidates longer than `max_connection_distance`, and
/// candidates whose segment crosses any obstacle. Per-point and per-node
/// caps are then filled greedily in (distance, point id, node id) order.
pub fn filter_candidates(
    candidates: Vec<Candidate>,
    input: &ConnectionInput,
    config: &PipelineConfig,
) -> (Vec<Candidate>, FilterReport) {
    let mut report = FilterReport::default();

    let total = candidates.len();
    let mut seen = HashSet::new();
    let unique: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| seen.insert((c.point, c.node)))
        .collect();
    report.duplicate = total - unique.len();

    let in_range: Vec<Candidate> = unique
        .into_iter()
        .filter(|c| c.distance <= config.max_connection_distance)
        .collect();
    report.too_far = seen.len() - in_range.len();

    let mut clear: Vec<Candidate> = in_range
        .par_iter()
        .filter(|c| {
            trimmed_segment(input.point_position(c.point), input.node_position(c.node))
                .is_none_or(|segment| !input.obstacles.crosses_any(segment))
        })
        .copied()
        .collect();
    report.crossing = in_range.len() - clear.len();

    clear.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then(input.points[a.point].id.cmp(&input.points[b.point].id))
            .then(input.nodes[a.node].id.cmp(&input.nodes[b.node].id))
    });

    let mut per_point = vec![0usize; input.points.len()];
    let mut per_node = vec![0usize; input.nodes.len()];
    let mut accepted = Vec::with_capacity(clear.len());
    for candidate in clear {
        if per_point[candidate.point] >= config.max_connections_per_point
            || per_node[candidate.node] >= config.max_connections_per_node
        {
            report.over_cap += 1;
            continue;
        }
        per_point[candidate.point] += 1;
        per_node[candidate.node] += 1;
        accepted.push(candidate);
    }

    (accepted, report)
}
