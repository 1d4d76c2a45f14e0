pub mod bounds;
pub mod kernel;
pub mod projection;

pub use bounds::Bounds;
pub use kernel::ObstacleIndex;
pub use projection::{OutputFrame, Projector};
