use geo::{LineString, Polygon};

/// Water feature classification based on OSM waterway/natural/water tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaterType {
    River,
    Stream,
    Canal,
    Ditch,
    Drain,
    Lake,
    Pond,
    Reservoir,
    Riverbank,
}

impl WaterType {
    /// Classify a tag set into a water type. Returns `None` for features the
    /// pipeline does not treat as obstacles.
    pub fn from_tags(get: impl Fn(&str) -> Option<String>) -> Option<WaterType> {
        if let Some(waterway) = get("waterway") {
            return match waterway.as_str() {
                "river" => Some(WaterType::River),
                "stream" | "brook" => Some(WaterType::Stream),
                "canal" => Some(WaterType::Canal),
                "ditch" => Some(WaterType::Ditch),
                "drain" => Some(WaterType::Drain),
                "riverbank" => Some(WaterType::Riverbank),
                _ => None,
            };
        }

        if get("natural").as_deref() == Some("water") {
            return match get("water").as_deref() {
                None | Some("lake") | Some("oxbow") | Some("lagoon") => Some(WaterType::Lake),
                Some("pond") => Some(WaterType::Pond),
                Some("reservoir") | Some("basin") => Some(WaterType::Reservoir),
                Some("river") => Some(WaterType::Riverbank),
                Some("canal") => Some(WaterType::Canal),
                Some(_) => None,
            };
        }

        match get("landuse").as_deref() {
            Some("reservoir") | Some("basin") => Some(WaterType::Reservoir),
            _ => None,
        }
    }

    /// Width in meters assumed when the feature has no usable `width` tag
    pub fn default_width(&self) -> f64 {
        match self {
            WaterType::River => 20.0,
            WaterType::Stream => 3.0,
            WaterType::Canal => 12.0,
            WaterType::Ditch => 1.5,
            WaterType::Drain => 1.0,
            WaterType::Lake
            | WaterType::Pond
            | WaterType::Reservoir
            | WaterType::Riverbank => 0.0,
        }
    }

    /// Smallest buffer radius applied to line features of this type
    fn min_line_buffer(&self) -> f64 {
        match self {
            WaterType::River => 5.0,
            WaterType::Canal => 4.0,
            WaterType::Stream => 2.0,
            _ => 1.0,
        }
    }

    /// Crossability before width and seasonality adjustments
    fn base_crossability(&self) -> i32 {
        match self {
            WaterType::Drain => 90,
            WaterType::Ditch => 80,
            WaterType::Stream => 60,
            WaterType::Pond => 20,
            WaterType::Canal => 10,
            WaterType::River => 10,
            WaterType::Lake | WaterType::Reservoir | WaterType::Riverbank => 0,
        }
    }
}

/// Meters of shore margin added around area water features
pub const SHORE_MARGIN: f64 = 2.0;

/// Centerline or outline of a water feature in projected meters
#[derive(Debug, Clone, PartialEq)]
pub enum WaterGeometry {
    Line(LineString<f64>),
    Area(Polygon<f64>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaterFeature {
    /// OSM way id
    pub id: u64,
    pub geometry: WaterGeometry,
    pub water_type: WaterType,
    /// Channel width in meters (0 for area features)
    pub width: f64,
    /// 0 = impassable, 100 = trivially crossable
    pub crossability: u8,
    /// Buffer radius in meters
    pub buffer_size: f64,
}

impl WaterFeature {
    pub fn new(
        id: u64,
        geometry: WaterGeometry,
        water_type: WaterType,
        width: Option<f64>,
        intermittent: bool,
    ) -> Self {
        let width = width
            .filter(|w| w.is_finite() && *w > 0.0)
            .unwrap_or_else(|| water_type.default_width());
        let crossability = crossability(water_type, width, intermittent);
        let buffer_size = buffer_size(&geometry, water_type, width);

        Self {
            id,
            geometry,
            water_type,
            width,
            crossability,
            buffer_size,
        }
    }
}

/// Buffer radius: half the channel width for lines (floored per type),
/// a fixed shore margin for areas.
pub fn buffer_size(geometry: &WaterGeometry, water_type: WaterType, width: f64) -> f64 {
    match geometry {
        WaterGeometry::Line(_) => (width / 2.0).max(water_type.min_line_buffer()),
        WaterGeometry::Area(_) => SHORE_MARGIN,
    }
}

/// Crossability score in 0..=100.
///
/// Wide channels lose 2 points per meter beyond 2m; seasonal water gains 20.
pub fn crossability(water_type: WaterType, width: f64, intermittent: bool) -> u8 {
    let mut score = water_type.base_crossability();

    if width > 2.0 {
        score -= ((width - 2.0) * 2.0).round() as i32;
    }
    if intermittent {
        score += 20;
    }

    score.clamp(0, 100) as u8
}

/// Parse an OSM `width` value: "12", "12 m", "12.5m", "3,5"
pub fn parse_width(raw: &str) -> Option<f64> {
    let trimmed = raw.trim().trim_end_matches('m').trim().replace(',', ".");
    trimmed.parse::<f64>().ok().filter(|w| w.is_finite() && *w > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn classify(pairs: &[(&str, &str)]) -> Option<WaterType> {
        let tags: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        WaterType::from_tags(|k| tags.get(k).cloned())
    }

    #[test]
    fn test_water_type_from_tags() {
        assert_eq!(classify(&[("waterway", "river")]), Some(WaterType::River));
        assert_eq!(classify(&[("waterway", "stream")]), Some(WaterType::Stream));
        assert_eq!(classify(&[("natural", "water")]), Some(WaterType::Lake));
        assert_eq!(
            classify(&[("natural", "water"), ("water", "pond")]),
            Some(WaterType::Pond)
        );
        assert_eq!(
            classify(&[("landuse", "reservoir")]),
            Some(WaterType::Reservoir)
        );
        assert_eq!(classify(&[("waterway", "dam")]), None);
        assert_eq!(classify(&[("highway", "primary")]), None);
    }

    #[test]
    fn test_parse_width() {
        assert_eq!(parse_width("12"), Some(12.0));
        assert_eq!(parse_width("12 m"), Some(12.0));
        assert_eq!(parse_width("12.5m"), Some(12.5));
        assert_eq!(parse_width("3,5"), Some(3.5));
        assert_eq!(parse_width("wide"), None);
        assert_eq!(parse_width("-4"), None);
    }

    #[test]
    fn test_crossability_rules() {
        assert_eq!(crossability(WaterType::Ditch, 1.5, false), 80);
        // 40m river: 10 - 76 clamps to 0
        assert_eq!(crossability(WaterType::River, 40.0, false), 0);
        // 4m stream: 60 - 4 = 56, seasonal +20
        assert_eq!(crossability(WaterType::Stream, 4.0, true), 76);
        assert_eq!(crossability(WaterType::Drain, 1.0, true), 100);
    }

    #[test]
    fn test_buffer_size_rule() {
        let line = WaterGeometry::Line(LineString::from(vec![(0.0, 0.0), (10.0, 0.0)]));
        assert_eq!(buffer_size(&line, WaterType::River, 30.0), 15.0);
        assert_eq!(buffer_size(&line, WaterType::River, 4.0), 5.0);

        let area = WaterGeometry::Area(Polygon::new(LineString::from(vec![(0.0, 0.0)]), vec![]));
        assert_eq!(buffer_size(&area, WaterType::Lake, 0.0), SHORE_MARGIN);
    }

    #[test]
    fn test_feature_falls_back_to_default_width() {
        let line = WaterGeometry::Line(LineString::from(vec![(0.0, 0.0), (10.0, 0.0)]));
        let feature = WaterFeature::new(7, line, WaterType::Stream, None, false);
        assert_eq!(feature.width, 3.0);
        assert_eq!(feature.crossability, 58);
        assert_eq!(feature.buffer_size, 2.0);
    }
}
