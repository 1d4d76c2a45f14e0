use anyhow::{Result, bail};
use geo::Coord;

/// Meters per degree of latitude on the WGS84 sphere approximation
const METERS_PER_DEGREE: f64 = 111320.0;

/// Sphere radius of EPSG:3857
const WEB_MERCATOR_RADIUS: f64 = 6378137.0;

/// Latitude limit of the Web Mercator square
const WEB_MERCATOR_MAX_LAT: f64 = 85.051_128_779_806_59;

/// EPSG codes exported coordinates can be written in
pub const SUPPORTED_SRIDS: [u32; 2] = [3857, 4326];

/// Local equirectangular projection from WGS84 to planar meters
///
/// - x = (lon - center_lon) * cos(center_lat) * 111320
/// - y = (lat - center_lat) * 111320
///
/// Accurate enough for the city/region extents the pipeline tiles; all
/// downstream distances are planar Euclidean in this frame.
#[derive(Debug, Clone)]
pub struct Projector {
    center_lat: f64,
    center_lon: f64,
    cos_lat: f64,
}

impl Projector {
    /// Create a new projector centered at the given (lat, lon)
    pub fn new(center: (f64, f64)) -> Self {
        let (lat, lon) = center;
        Self {
            center_lat: lat,
            center_lon: lon,
            cos_lat: lat.to_radians().cos(),
        }
    }

    /// Center the projection on the middle of a set of (lat, lon) points
    pub fn centered_on(points: &[(f64, f64)]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let (mut min_lat, mut max_lat) = (f64::MAX, f64::MIN);
        let (mut min_lon, mut max_lon) = (f64::MAX, f64::MIN);
        for &(lat, lon) in points {
            min_lat = min_lat.min(lat);
            max_lat = max_lat.max(lat);
            min_lon = min_lon.min(lon);
            max_lon = max_lon.max(lon);
        }
        Some(Self::new((
            (min_lat + max_lat) / 2.0,
            (min_lon + max_lon) / 2.0,
        )))
    }

    pub fn center(&self) -> (f64, f64) {
        (self.center_lat, self.center_lon)
    }

    /// Project a lat/lon point to local meters
    pub fn project(&self, lat: f64, lon: f64) -> Coord<f64> {
        let x = (lon - self.center_lon) * self.cos_lat * METERS_PER_DEGREE;
        let y = (lat - self.center_lat) * METERS_PER_DEGREE;

        Coord { x, y }
    }

    /// Inverse of [`Projector::project`], returns (lat, lon)
    pub fn unproject(&self, coord: Coord<f64>) -> (f64, f64) {
        let lat = coord.y / METERS_PER_DEGREE + self.center_lat;
        let lon = if self.cos_lat.abs() > f64::EPSILON {
            coord.x / (self.cos_lat * METERS_PER_DEGREE) + self.center_lon
        } else {
            self.center_lon
        };
        (lat, lon)
    }
}

/// Spherical Web Mercator (EPSG:3857) meters for a lat/lon
pub fn web_mercator(lat: f64, lon: f64) -> Coord<f64> {
    let lat = lat.clamp(-WEB_MERCATOR_MAX_LAT, WEB_MERCATOR_MAX_LAT);
    Coord {
        x: WEB_MERCATOR_RADIUS * lon.to_radians(),
        y: WEB_MERCATOR_RADIUS
            * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0)
                .tan()
                .ln(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StorageCrs {
    WebMercator,
    LonLat,
}

/// Coordinate frame of an exported graph.
///
/// Stage geometry lives in the local [`Projector`] frame; on export every
/// position is taken back to WGS84 and written in `srid`. Edge costs stay
/// in local meters around [`OutputFrame::origin`].
#[derive(Debug, Clone)]
pub struct OutputFrame {
    projector: Projector,
    srid: u32,
    crs: StorageCrs,
}

impl OutputFrame {
    pub fn new(projector: Projector, srid: u32) -> Result<Self> {
        let crs = match srid {
            3857 => StorageCrs::WebMercator,
            4326 => StorageCrs::LonLat,
            other => bail!(
                "storage_srid {} is not supported (expected one of {:?})",
                other,
                SUPPORTED_SRIDS
            ),
        };
        Ok(Self {
            projector,
            srid,
            crs,
        })
    }

    pub fn srid(&self) -> u32 {
        self.srid
    }

    /// (lat, lon) of the local frame's origin
    pub fn origin(&self) -> (f64, f64) {
        self.projector.center()
    }

    /// Local pipeline meters to `srid` coordinates (x = lon for 4326)
    pub fn transform(&self, local: Coord<f64>) -> Coord<f64> {
        let (lat, lon) = self.projector.unproject(local);
        match self.crs {
            StorageCrs::WebMercator => web_mercator(lat, lon),
            StorageCrs::LonLat => Coord { x: lon, y: lat },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projector_center() {
        let proj = Projector::new((52.52, 13.405));
        let c = proj.project(52.52, 13.405);
        assert!(c.x.abs() < 0.01);
        assert!(c.y.abs() < 0.01);
    }

    #[test]
    fn test_projector_1km() {
        let proj = Projector::new((52.52, 13.405));

        // 0.009 degrees latitude is roughly 1 km
        let c = proj.project(52.52 + 0.009, 13.405);
        assert!((c.y - 1000.0).abs() < 50.0);
    }

    #[test]
    fn test_unproject_inverts_project() {
        let proj = Projector::new((52.52, 13.405));
        let c = proj.project(52.53, 13.42);
        let (lat, lon) = proj.unproject(c);
        assert!((lat - 52.53).abs() < 1e-9);
        assert!((lon - 13.42).abs() < 1e-9);
    }

    #[test]
    fn test_centered_on() {
        let proj = Projector::centered_on(&[(10.0, 20.0), (12.0, 24.0)]).unwrap();
        assert_eq!(proj.center(), (11.0, 22.0));
        assert!(Projector::centered_on(&[]).is_none());
    }

    #[test]
    fn test_web_mercator_known_values() {
        let origin = web_mercator(0.0, 0.0);
        assert!(origin.x.abs() < 1e-6 && origin.y.abs() < 1e-6);

        // lon 13.4 is about 1,491,681 m east in EPSG:3857
        let c = web_mercator(52.5, 13.4);
        assert!((c.x - 1_491_681.0).abs() < 5.0);
        assert!((c.y - 6_891_041.0).abs() < 50.0);
    }

    #[test]
    fn test_output_frame_transforms_local_meters() {
        let proj = Projector::new((52.5, 13.4));
        let local = proj.project(52.501, 13.402);

        let mercator = OutputFrame::new(proj.clone(), 3857).unwrap();
        let expected = web_mercator(52.501, 13.402);
        let c = mercator.transform(local);
        assert!((c.x - expected.x).abs() < 1e-3);
        assert!((c.y - expected.y).abs() < 1e-3);
        assert_eq!(mercator.origin(), (52.5, 13.4));

        let lon_lat = OutputFrame::new(proj.clone(), 4326).unwrap();
        let c = lon_lat.transform(local);
        assert!((c.x - 13.402).abs() < 1e-9);
        assert!((c.y - 52.501).abs() < 1e-9);

        assert!(OutputFrame::new(proj, 27700).is_err());
    }
}
