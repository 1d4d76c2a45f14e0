//! Pipeline stages, in run order: buffer, dissolve, grid, boundary, unify
//! and connectivity. Connection strategies live in [`crate::connect`].

pub mod boundary;
pub mod buffer;
pub mod connectivity;
pub mod dissolve;
pub mod grid;
pub mod unify;

pub use boundary::{BoundaryOutput, extract_boundaries};
pub use buffer::{BufferOutput, BufferedFeature, build_buffers};
pub use connectivity::{ConnectivityReport, components, repair_connectivity};
pub use dissolve::dissolve_buffers;
pub use grid::{TerrainGrid, generate_grid};
pub use unify::{GraphParts, UnifyReport, unify_graph};
