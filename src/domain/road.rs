use geo::Coord;

/// Road classification based on OSM highway tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoadClass {
    Motorway,
    Primary,
    Secondary,
    Tertiary,
    Residential,
    Track,
    Path,
}

impl RoadClass {
    /// Classify a highway tag value into a RoadClass
    pub fn from_highway_tag(tag: &str) -> Option<RoadClass> {
        match tag {
            "motorway" | "motorway_link" => Some(RoadClass::Motorway),
            "trunk" | "trunk_link" | "primary" | "primary_link" => Some(RoadClass::Primary),
            "secondary" | "secondary_link" => Some(RoadClass::Secondary),
            "tertiary" | "tertiary_link" => Some(RoadClass::Tertiary),
            "residential" | "living_street" | "unclassified" | "service" => {
                Some(RoadClass::Residential)
            }
            "track" => Some(RoadClass::Track),
            "path" | "footway" | "bridleway" | "cycleway" => Some(RoadClass::Path),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RoadClass::Motorway => "motorway",
            RoadClass::Primary => "primary",
            RoadClass::Secondary => "secondary",
            RoadClass::Tertiary => "tertiary",
            RoadClass::Residential => "residential",
            RoadClass::Track => "track",
            RoadClass::Path => "path",
        }
    }
}

/// A road way with its OSM node ids and projected coordinates
#[derive(Debug, Clone)]
pub struct RoadSegment {
    pub way_id: u64,
    /// OSM node ids, parallel to `points`
    pub node_ids: Vec<u64>,
    /// Points in projected meters
    pub points: Vec<Coord<f64>>,
    pub class: RoadClass,
}

impl RoadSegment {
    pub fn new(way_id: u64, node_ids: Vec<u64>, points: Vec<Coord<f64>>, class: RoadClass) -> Self {
        Self {
            way_id,
            node_ids,
            points,
            class,
        }
    }
}
