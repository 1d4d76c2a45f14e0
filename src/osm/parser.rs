use geo::{Coord, LineString, Polygon};
use std::collections::HashMap;

use super::overpass::{Element, OverpassResponse};
use crate::domain::water::parse_width;
use crate::domain::{RoadClass, RoadSegment, WaterFeature, WaterGeometry, WaterType};
use crate::geometry::Projector;

/// Typed features pulled from one Overpass export
#[derive(Debug, Default)]
pub struct ExtractedFeatures {
    pub water: Vec<WaterFeature>,
    pub roads: Vec<RoadSegment>,
    /// Ways that matched a type filter but had too few resolvable nodes
    pub degenerate: usize,
}

fn build_node_lookup(response: &OverpassResponse) -> HashMap<u64, (f64, f64)> {
    response
        .elements
        .iter()
        .filter(|e| e.type_ == "node")
        .filter_map(|e| {
            let lat = e.lat?;
            let lon = e.lon?;
            Some((e.id, (lat, lon)))
        })
        .collect()
}

/// Projector centered on the extent of every node in the response
pub fn projector_for(response: &OverpassResponse) -> Option<Projector> {
    let coords: Vec<(f64, f64)> = build_node_lookup(response).into_values().collect();
    Projector::centered_on(&coords)
}

/// Resolve node refs, keeping ids and projected points in step
fn resolve_way(
    node_refs: &[u64],
    nodes: &HashMap<u64, (f64, f64)>,
    projector: &Projector,
) -> (Vec<u64>, Vec<Coord<f64>>) {
    node_refs
        .iter()
        .filter_map(|id| {
            let &(lat, lon) = nodes.get(id)?;
            Some((*id, projector.project(lat, lon)))
        })
        .unzip()
}

fn is_closed_way(points: &[Coord<f64>]) -> bool {
    match (points.first(), points.last()) {
        (Some(first), Some(last)) if points.len() >= 4 => {
            (first.x - last.x).abs() < 1e-9 && (first.y - last.y).abs() < 1e-9
        }
        _ => false,
    }
}

/// Area-tagged water (lakes, riverbanks, reservoirs) as opposed to centerlines
fn is_area_tagged(element: &Element) -> bool {
    element.tag("natural").as_deref() == Some("water")
        || element.tag("waterway").as_deref() == Some("riverbank")
        || matches!(
            element.tag("landuse").as_deref(),
            Some("reservoir") | Some("basin")
        )
}

/// Parse Overpass ways into water features and road segments
///
/// # Algorithm
/// 1. Build node_id → (lat, lon) lookup map from all node elements
/// 2. For each way:
///    - water tags → [`WaterFeature`] with derived width, buffer size and
///      crossability; area-tagged ways must be closed rings
///    - highway tags → [`RoadSegment`] (when a known road class)
/// 3. Project every coordinate to local meters
pub fn extract_features(response: &OverpassResponse, projector: &Projector) -> ExtractedFeatures {
    let nodes = build_node_lookup(response);
    let mut extracted = ExtractedFeatures::default();

    for element in &response.elements {
        if element.type_ != "way" || element.tags.is_none() {
            continue;
        }

        let node_refs = match &element.nodes {
            Some(n) => n,
            None => continue,
        };

        if let Some(water_type) = WaterType::from_tags(|k| element.tag(k)) {
            let (_, points) = resolve_way(node_refs, &nodes, projector);

            let geometry = if is_area_tagged(element) {
                if !is_closed_way(&points) {
                    extracted.degenerate += 1;
                    continue;
                }
                WaterGeometry::Area(Polygon::new(LineString::from(points), vec![]))
            } else {
                if points.len() < 2 {
                    extracted.degenerate += 1;
                    continue;
                }
                WaterGeometry::Line(LineString::from(points))
            };

            let width = element.tag("width").as_deref().and_then(parse_width);
            let intermittent = element.tag("intermittent").as_deref() == Some("yes")
                || element.tag("seasonal").as_deref() == Some("yes");

            extracted.water.push(WaterFeature::new(
                element.id,
                geometry,
                water_type,
                width,
                intermittent,
            ));
            continue;
        }

        let class = match element
            .tag("highway")
            .as_deref()
            .and_then(RoadClass::from_highway_tag)
        {
            Some(c) => c,
            None => continue,
        };

        let (node_ids, points) = resolve_way(node_refs, &nodes, projector);
        if points.len() < 2 {
            extracted.degenerate += 1;
            continue;
        }

        extracted
            .roads
            .push(RoadSegment::new(element.id, node_ids, points, class));
    }

    tracing::debug!(
        water = extracted.water.len(),
        roads = extracted.roads.len(),
        degenerate = extracted.degenerate,
        "extracted features"
    );

    extracted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: u64, lat: f64, lon: f64) -> Element {
        Element {
            type_: "node".to_string(),
            id,
            lat: Some(lat),
            lon: Some(lon),
            nodes: None,
            tags: None,
        }
    }

    fn way(id: u64, nodes: Vec<u64>, tags: &[(&str, &str)]) -> Element {
        Element {
            type_: "way".to_string(),
            id,
            lat: None,
            lon: None,
            nodes: Some(nodes),
            tags: Some(
                tags.iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
        }
    }

    fn sample() -> OverpassResponse {
        OverpassResponse {
            elements: vec![
                node(1, 52.500, 13.400),
                node(2, 52.500, 13.410),
                node(3, 52.505, 13.410),
                node(4, 52.505, 13.400),
                way(100, vec![1, 2], &[("waterway", "river"), ("width", "30 m")]),
                way(
                    101,
                    vec![1, 2, 3, 4, 1],
                    &[("natural", "water"), ("water", "pond")],
                ),
                way(102, vec![2, 3], &[("highway", "track")]),
                // not closed, area-tagged: degenerate
                way(103, vec![1, 2, 3], &[("natural", "water")]),
                // one resolvable node
                way(104, vec![1, 999], &[("waterway", "stream")]),
                way(105, vec![3, 4], &[("building", "yes")]),
            ],
        }
    }

    #[test]
    fn test_extract_features() {
        let response = sample();
        let projector = projector_for(&response).unwrap();
        let extracted = extract_features(&response, &projector);

        assert_eq!(extracted.water.len(), 2);
        assert_eq!(extracted.roads.len(), 1);
        assert_eq!(extracted.degenerate, 2);

        let river = &extracted.water[0];
        assert_eq!(river.id, 100);
        assert_eq!(river.water_type, WaterType::River);
        assert_eq!(river.width, 30.0);
        assert_eq!(river.buffer_size, 15.0);
        assert_eq!(river.crossability, 0);
        assert!(matches!(river.geometry, WaterGeometry::Line(_)));

        let pond = &extracted.water[1];
        assert_eq!(pond.water_type, WaterType::Pond);
        assert!(matches!(pond.geometry, WaterGeometry::Area(_)));

        let track = &extracted.roads[0];
        assert_eq!(track.class, RoadClass::Track);
        assert_eq!(track.node_ids, vec![2, 3]);
    }

    #[test]
    fn test_projector_for_centers_on_nodes() {
        let response = sample();
        let projector = projector_for(&response).unwrap();
        let (lat, lon) = projector.center();
        assert!((lat - 52.5025).abs() < 1e-9);
        assert!((lon - 13.405).abs() < 1e-9);
    }
}
