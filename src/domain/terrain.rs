use geo::Coord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerrainClass {
    Land,
    /// Within the adjacency distance of a water obstacle
    Boundary,
    /// Inside a water obstacle; excluded from routing
    Water,
}

impl TerrainClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerrainClass::Land => "land",
            TerrainClass::Boundary => "boundary",
            TerrainClass::Water => "water",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerrainPoint {
    pub id: u64,
    pub position: Coord<f64>,
    pub class: TerrainClass,
}

impl TerrainPoint {
    pub fn new(id: u64, position: Coord<f64>, class: TerrainClass) -> Self {
        Self {
            id,
            position,
            class,
        }
    }

    pub fn is_routable(&self) -> bool {
        self.class != TerrainClass::Water
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerrainEdge {
    pub source: u64,
    pub target: u64,
    pub length: f64,
}
