use geo::{Coord, Rect};

/// Bounding box in projected coordinates (meters)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    /// Create bounds from a set of points
    pub fn from_points(points: &[Coord<f64>]) -> Option<Self> {
        let mut iter = points.iter().filter(|c| c.x.is_finite() && c.y.is_finite());
        let first = iter.next()?;

        let mut bounds = Self::new(first.x, first.y, first.x, first.y);
        for c in iter {
            bounds.include(*c);
        }
        Some(bounds)
    }

    /// Grow to contain a point
    pub fn include(&mut self, c: Coord<f64>) {
        self.min_x = self.min_x.min(c.x);
        self.max_x = self.max_x.max(c.x);
        self.min_y = self.min_y.min(c.y);
        self.max_y = self.max_y.max(c.y);
    }

    /// Grow to contain another box
    pub fn merge(&mut self, other: &Bounds) {
        self.min_x = self.min_x.min(other.min_x);
        self.max_x = self.max_x.max(other.max_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_y = self.max_y.max(other.max_y);
    }

    /// Copy of these bounds grown by `margin` meters on every side
    pub fn expanded(&self, margin: f64) -> Self {
        Self::new(
            self.min_x - margin,
            self.min_y - margin,
            self.max_x + margin,
            self.max_y + margin,
        )
    }

    pub fn contains(&self, c: Coord<f64>) -> bool {
        c.x >= self.min_x && c.x <= self.max_x && c.y >= self.min_y && c.y <= self.max_y
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            Coord {
                x: self.min_x,
                y: self.min_y,
            },
            Coord {
                x: self.max_x,
                y: self.max_y,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_from_points() {
        let points = vec![
            Coord { x: 0.0, y: 0.0 },
            Coord {
                x: 1000.0,
                y: 2000.0,
            },
            Coord {
                x: 500.0,
                y: 1000.0,
            },
        ];
        let bounds = Bounds::from_points(&points).unwrap();

        assert_eq!(bounds.min_x, 0.0);
        assert_eq!(bounds.max_x, 1000.0);
        assert_eq!(bounds.min_y, 0.0);
        assert_eq!(bounds.max_y, 2000.0);
    }

    #[test]
    fn test_bounds_ignore_non_finite() {
        let points = vec![
            Coord {
                x: f64::NAN,
                y: 0.0,
            },
            Coord { x: 5.0, y: 5.0 },
        ];
        let bounds = Bounds::from_points(&points).unwrap();
        assert_eq!(bounds.min_x, 5.0);
        assert!(Bounds::from_points(&[]).is_none());
    }

    #[test]
    fn test_expanded() {
        let bounds = Bounds::new(0.0, 0.0, 10.0, 10.0).expanded(5.0);
        assert_eq!(bounds.min_x, -5.0);
        assert_eq!(bounds.width(), 20.0);
        assert!(bounds.contains(Coord { x: -5.0, y: 15.0 }));
    }
}
