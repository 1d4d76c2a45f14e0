pub mod graph;
pub mod obstacle;
pub mod road;
pub mod terrain;
pub mod water;

pub use graph::{ConnectionEdge, EdgeType, GraphEdge, GraphNode, NodeRef, UnifiedGraph};
pub use obstacle::{BoundaryEdge, BoundaryNode, WaterObstacle};
pub use road::{RoadClass, RoadSegment};
pub use terrain::{TerrainClass, TerrainEdge, TerrainPoint};
pub use water::{WaterFeature, WaterGeometry, WaterType};
