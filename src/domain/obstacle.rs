use geo::{Coord, Polygon};

/// A dissolved water buffer the graph routes around or across
#[derive(Debug, Clone, PartialEq)]
pub struct WaterObstacle {
    pub id: u64,
    pub polygon: Polygon<f64>,
    /// Lowest crossability of the dissolved features
    pub crossability: u8,
    /// OSM way ids of the features merged into this obstacle
    pub source_ids: Vec<u64>,
}

/// Graph node sampled on an obstacle's exterior ring
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryNode {
    pub id: u64,
    pub water_obstacle_id: u64,
    /// Position in ring traversal order, starting at 0
    pub sequence_index: usize,
    pub position: Coord<f64>,
}

/// Ring edge between two consecutive boundary nodes of one obstacle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryEdge {
    pub source: u64,
    pub target: u64,
    pub water_obstacle_id: u64,
    pub length: f64,
}
