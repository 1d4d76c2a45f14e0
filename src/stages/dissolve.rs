use geo::{BoundingRect, Polygon};
use petgraph::unionfind::UnionFind;
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{AABB, RTree};
use std::collections::BTreeMap;

use super::buffer::BufferedFeature;
use crate::config::DissolveConfig;
use crate::domain::WaterObstacle;
use crate::geometry::kernel;

/// One buffer polygon with the feature it came from
struct Part<'a> {
    feature_id: u64,
    crossability: u8,
    polygon: &'a Polygon<f64>,
}

/// Cluster touching/overlapping buffers within each crossability bucket
/// and union every cluster into obstacles.
///
/// Buffers in different buckets never merge, even when they overlap.
/// Obstacle ids are assigned in (bucket, smallest feature id) order so the
/// output is identical across runs.
pub fn dissolve_buffers(buffers: &[BufferedFeature], config: &DissolveConfig) -> Vec<WaterObstacle> {
    let mut buckets: BTreeMap<u8, Vec<Part>> = BTreeMap::new();
    for buffered in buffers {
        for polygon in &buffered.polygons {
            buckets
                .entry(config.bucket_of(buffered.crossability))
                .or_default()
                .push(Part {
                    feature_id: buffered.feature_id,
                    crossability: buffered.crossability,
                    polygon,
                });
        }
    }

    let mut obstacles = Vec::new();
    for (bucket, parts) in buckets {
        let clusters = cluster_parts(&parts);
        tracing::debug!(
            bucket,
            parts = parts.len(),
            clusters = clusters.len(),
            "dissolving bucket"
        );

        for cluster in clusters {
            let polygons: Vec<Polygon<f64>> =
                cluster.iter().map(|&i| parts[i].polygon.clone()).collect();
            let crossability = cluster
                .iter()
                .map(|&i| parts[i].crossability)
                .min()
                .unwrap_or(0);
            let mut source_ids: Vec<u64> = cluster.iter().map(|&i| parts[i].feature_id).collect();
            source_ids.sort_unstable();
            source_ids.dedup();

            for polygon in kernel::union(&polygons) {
                obstacles.push(WaterObstacle {
                    id: obstacles.len() as u64,
                    polygon: kernel::simplify(&polygon, config.simplify_tolerance),
                    crossability,
                    source_ids: source_ids.clone(),
                });
            }
        }
    }

    obstacles
}

/// Distance-0 clustering: parts join when their polygons intersect.
/// Clusters come back ordered by their smallest feature id.
fn cluster_parts(parts: &[Part]) -> Vec<Vec<usize>> {
    let entries: Vec<GeomWithData<Rectangle<[f64; 2]>, usize>> = parts
        .iter()
        .enumerate()
        .filter_map(|(i, part)| {
            let rect = part.polygon.bounding_rect()?;
            Some(GeomWithData::new(
                Rectangle::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
                i,
            ))
        })
        .collect();
    let tree = RTree::bulk_load(entries);

    let mut uf = UnionFind::<usize>::new(parts.len());
    for (i, part) in parts.iter().enumerate() {
        let Some(rect) = part.polygon.bounding_rect() else {
            continue;
        };
        let envelope = AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);
        for candidate in tree.locate_in_envelope_intersecting(&envelope) {
            let j = candidate.data;
            if j > i && kernel::intersects(part.polygon, parts[j].polygon) {
                uf.union(i, j);
            }
        }
    }

    let mut by_root: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for i in 0..parts.len() {
        by_root.entry(uf.find_mut(i)).or_default().push(i);
    }

    let mut clusters: Vec<Vec<usize>> = by_root.into_values().collect();
    clusters.sort_by_key(|cluster| {
        cluster
            .iter()
            .map(|&i| (parts[i].feature_id, i))
            .min()
            .unwrap_or((u64::MAX, usize::MAX))
    });
    clusters
}
