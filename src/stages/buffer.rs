use geo::{Area, Polygon};
use rayon::prelude::*;

use crate::domain::{WaterFeature, WaterGeometry};
use crate::error::GeometryError;
use crate::geometry::kernel;

/// Buffer polygons of one water feature
#[derive(Debug, Clone)]
pub struct BufferedFeature {
    pub feature_id: u64,
    pub crossability: u8,
    pub polygons: Vec<Polygon<f64>>,
}

#[derive(Debug, Default)]
pub struct BufferOutput {
    pub buffers: Vec<BufferedFeature>,
    /// Features whose buffer came out empty
    pub degenerate: usize,
}

fn buffer_feature(feature: &WaterFeature) -> Result<BufferedFeature, GeometryError> {
    let buffered = match &feature.geometry {
        WaterGeometry::Line(line) => kernel::buffer_line(line, feature.buffer_size),
        WaterGeometry::Area(polygon) => kernel::buffer_polygon(polygon, feature.buffer_size),
    };

    let polygons: Vec<Polygon<f64>> = buffered
        .0
        .into_iter()
        .filter(|p| p.unsigned_area() > 0.0)
        .collect();

    if polygons.is_empty() {
        return Err(GeometryError::Degenerate(format!(
            "water feature {} produced an empty buffer",
            feature.id
        )));
    }

    Ok(BufferedFeature {
        feature_id: feature.id,
        crossability: feature.crossability,
        polygons,
    })
}

/// Wrap every water feature in a buffer polygon sized by its buffer rule.
///
/// Features are buffered in parallel; output order follows input order.
pub fn build_buffers(features: &[WaterFeature]) -> BufferOutput {
    let results: Vec<Result<BufferedFeature, GeometryError>> =
        features.par_iter().map(buffer_feature).collect();

    let mut output = BufferOutput::default();
    for result in results {
        match result {
            Ok(buffered) => output.buffers.push(buffered),
            Err(e) => {
                tracing::warn!("skipping feature: {}", e);
                output.degenerate += 1;
            }
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WaterType;
    use geo::{LineString, polygon};

    fn river(id: u64, coords: Vec<(f64, f64)>, width: f64) -> WaterFeature {
        WaterFeature::new(
            id,
            WaterGeometry::Line(LineString::from(coords)),
            WaterType::River,
            Some(width),
            false,
        )
    }

    #[test]
    fn test_build_buffers_preserves_order() {
        let features = vec![
            river(10, vec![(0.0, 0.0), (100.0, 0.0)], 20.0),
            river(11, vec![(0.0, 500.0), (100.0, 500.0)], 20.0),
        ];
        let output = build_buffers(&features);

        assert_eq!(output.degenerate, 0);
        assert_eq!(output.buffers.len(), 2);
        assert_eq!(output.buffers[0].feature_id, 10);
        assert_eq!(output.buffers[1].feature_id, 11);
    }

    #[test]
    fn test_area_feature_grows_by_shore_margin() {
        let lake = WaterFeature::new(
            1,
            WaterGeometry::Area(polygon![
                (x: 0.0, y: 0.0),
                (x: 100.0, y: 0.0),
                (x: 100.0, y: 100.0),
                (x: 0.0, y: 100.0),
            ]),
            WaterType::Lake,
            None,
            false,
        );
        let output = build_buffers(&[lake]);
        let area: f64 = output.buffers[0]
            .polygons
            .iter()
            .map(|p| p.unsigned_area())
            .sum();
        assert!(area > 10_000.0);
        assert!(area < 104.0 * 104.0);
    }

    #[test]
    fn test_zero_length_line_is_degenerate() {
        let features = vec![river(5, vec![(10.0, 10.0), (10.0, 10.0)], 20.0)];
        let output = build_buffers(&features);
        // A zero-length line either buffers to a disc or to nothing; it must
        // never abort the stage.
        assert_eq!(output.buffers.len() + output.degenerate, 1);
    }
}
