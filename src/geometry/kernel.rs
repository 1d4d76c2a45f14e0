//! Thin wrappers over the geometry library.
//!
//! Every function here is pure: buffering, union and simplification come
//! from `geo`, the obstacle lookups are backed by an `rstar` R-tree over
//! polygon envelopes.

use geo::line_measures::Distance;
use geo::{
    BooleanOps, BoundingRect, Buffer, Closest, ClosestPoint, Contains, Coord, Euclidean,
    Intersects, Line, LineString, MultiPolygon, Point, Polygon, Relate, Simplify,
};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{AABB, RTree};

/// DE-9IM pattern for "a lower-dimensional geometry crosses a polygon":
/// interiors meet and the line interior also reaches the exterior.
const CROSSES_LINE_POLYGON: &str = "T*T******";

pub fn distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    Euclidean.distance(&Point::from(a), &Point::from(b))
}

pub fn buffer_line(line: &LineString<f64>, distance: f64) -> MultiPolygon<f64> {
    line.buffer(distance)
}

pub fn buffer_polygon(polygon: &Polygon<f64>, distance: f64) -> MultiPolygon<f64> {
    polygon.buffer(distance)
}

/// Union of all polygons into one multipolygon
pub fn union(polygons: &[Polygon<f64>]) -> MultiPolygon<f64> {
    let mut iter = polygons.iter();
    let Some(first) = iter.next() else {
        return MultiPolygon::new(Vec::new());
    };

    let mut merged = MultiPolygon::new(vec![first.clone()]);
    for polygon in iter {
        merged = merged.union(&MultiPolygon::new(vec![polygon.clone()]));
    }
    merged
}

/// Douglas-Peucker simplification that never collapses a ring below a
/// triangle; the input is returned unchanged if it would.
pub fn simplify(polygon: &Polygon<f64>, tolerance: f64) -> Polygon<f64> {
    if tolerance <= 0.0 {
        return polygon.clone();
    }

    let simplified = polygon.simplify(tolerance);
    if simplified.exterior().0.len() < 4 {
        return polygon.clone();
    }
    simplified
}

pub fn intersects(a: &Polygon<f64>, b: &Polygon<f64>) -> bool {
    a.intersects(b)
}

/// True when the segment passes through the polygon's interior and out
/// again. Touching the boundary does not count.
pub fn crosses(segment: Line<f64>, polygon: &Polygon<f64>) -> bool {
    let line = LineString::from(vec![segment.start, segment.end]);
    line.relate(polygon)
        .matches(CROSSES_LINE_POLYGON)
        .unwrap_or(false)
}

/// Shortest distance from a point to any ring of the polygon; zero when
/// the point lies inside.
pub fn distance_to_polygon(c: Coord<f64>, polygon: &Polygon<f64>) -> f64 {
    let point = Point::from(c);
    if polygon.contains(&point) {
        return 0.0;
    }

    std::iter::once(polygon.exterior())
        .chain(polygon.interiors().iter())
        .filter_map(|ring| match ring.closest_point(&point) {
            Closest::Intersection(p) | Closest::SinglePoint(p) => {
                Some(Euclidean.distance(&point, &p))
            }
            Closest::Indeterminate => None,
        })
        .fold(f64::INFINITY, f64::min)
}

/// Deterministic pseudo-random offset in [-1, 1) on both axes for `key`.
///
/// Used wherever sample points must be perturbed reproducibly (jittered
/// terrain samples, Voronoi seed recovery).
pub fn jitter(key: u64) -> (f64, f64) {
    fn splitmix(mut z: u64) -> u64 {
        z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }
    let a = splitmix(key);
    let b = splitmix(a);
    let unit = |v: u64| (v >> 11) as f64 / (1u64 << 53) as f64 * 2.0 - 1.0;
    (unit(a), unit(b))
}

fn envelope_of(polygon: &Polygon<f64>) -> Option<Rectangle<[f64; 2]>> {
    let rect = polygon.bounding_rect()?;
    Some(Rectangle::from_corners(
        [rect.min().x, rect.min().y],
        [rect.max().x, rect.max().y],
    ))
}

type IndexedEnvelope = GeomWithData<Rectangle<[f64; 2]>, usize>;

/// Obstacle polygons with an R-tree over their envelopes.
///
/// Indices returned by queries refer to positions in [`ObstacleIndex::polygons`].
#[derive(Debug, Clone)]
pub struct ObstacleIndex {
    polygons: Vec<Polygon<f64>>,
    tree: RTree<IndexedEnvelope>,
}

impl ObstacleIndex {
    pub fn new(polygons: Vec<Polygon<f64>>) -> Self {
        let entries: Vec<IndexedEnvelope> = polygons
            .iter()
            .enumerate()
            .filter_map(|(i, p)| envelope_of(p).map(|env| GeomWithData::new(env, i)))
            .collect();

        Self {
            polygons,
            tree: RTree::bulk_load(entries),
        }
    }

    pub fn polygons(&self) -> &[Polygon<f64>] {
        &self.polygons
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// Indices of obstacles whose envelope intersects the box around `a`..`b`
    /// grown by `margin`
    fn candidates(&self, a: Coord<f64>, b: Coord<f64>, margin: f64) -> Vec<usize> {
        let envelope = AABB::from_corners(
            [a.x.min(b.x) - margin, a.y.min(b.y) - margin],
            [a.x.max(b.x) + margin, a.y.max(b.y) + margin],
        );
        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|entry| entry.data)
            .collect();
        hits.sort_unstable();
        hits
    }

    /// Index of the first obstacle containing the point
    pub fn containing(&self, c: Coord<f64>) -> Option<usize> {
        let point = Point::from(c);
        self.candidates(c, c, 0.0)
            .into_iter()
            .find(|&i| self.polygons[i].contains(&point))
    }

    /// Distance to the closest obstacle within `max_distance`
    pub fn nearest_within(&self, c: Coord<f64>, max_distance: f64) -> Option<f64> {
        self.candidates(c, c, max_distance)
            .into_iter()
            .map(|i| distance_to_polygon(c, &self.polygons[i]))
            .filter(|d| *d <= max_distance)
            .min_by(|a, b| a.total_cmp(b))
    }

    /// True if the segment crosses any indexed obstacle
    pub fn crosses_any(&self, segment: Line<f64>) -> bool {
        self.candidates(segment.start, segment.end, 0.0)
            .into_iter()
            .any(|i| crosses(segment, &self.polygons[i]))
    }
}
