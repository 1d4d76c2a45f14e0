//! terrain-graph - Build routable terrain graphs with water-obstacle
//! crossability from OpenStreetMap data

pub mod config;
pub mod connect;
pub mod domain;
pub mod error;
pub mod export;
pub mod geometry;
pub mod osm;
pub mod pipeline;
pub mod stages;
