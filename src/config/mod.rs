use anyhow::{Result, bail};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::export::ExportFormat;
use crate::geometry::projection::SUPPORTED_SRIDS;

/// Which connection strategy joins boundary terrain points to water
/// obstacle boundary nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Closest boundary node per terrain point
    Nearest,
    /// Nearest node among those whose buffer disc contains the point
    Buffer,
    /// Voronoi cells seeded by boundary nodes
    Voronoi,
    /// Voronoi cells seeded by terrain points (more even node load)
    #[default]
    #[value(name = "reversed_voronoi")]
    ReversedVoronoi,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Nearest => "nearest",
            StrategyKind::Buffer => "buffer",
            StrategyKind::Voronoi => "voronoi",
            StrategyKind::ReversedVoronoi => "reversed_voronoi",
        }
    }
}

/// How boundary nodes are placed along an obstacle's exterior ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum BoundarySampling {
    /// One node per ring vertex
    Vertices,
    /// Nodes every `boundary_node_spacing` meters along the ring
    #[default]
    Interpolated,
}

/// Terrain tiling layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum GridKind {
    /// Square lattice with 8-neighbour edges
    #[default]
    Square,
    /// Hexagonal lattice with 6-neighbour edges
    Hex,
    /// Delaunay triangulation of jittered sample points
    Delaunay,
}

fn default_storage_srid() -> u32 {
    3857
}
fn default_boundary_node_spacing() -> f64 {
    25.0
}
fn default_max_connection_distance() -> f64 {
    100.0
}
fn default_buffer_distance() -> f64 {
    50.0
}
fn default_buffer_fallback_factor() -> f64 {
    2.0
}
fn default_max_connections_per_node() -> usize {
    5
}
fn default_max_connections_per_point() -> usize {
    2
}
fn default_voronoi_tolerance() -> f64 {
    0.01
}
fn default_roads() -> bool {
    true
}
fn default_road_snap_distance() -> f64 {
    25.0
}
fn default_grid_spacing() -> f64 {
    25.0
}
fn default_grid_margin() -> f64 {
    100.0
}
fn default_chunk_size() -> f64 {
    2000.0
}
fn default_bucket_width() -> u8 {
    25
}
fn default_simplify_tolerance() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GridConfig {
    #[serde(default)]
    pub kind: GridKind,
    #[serde(default = "default_grid_spacing")]
    pub spacing: f64,
    /// Extra meters added around the feature bounds before tiling
    #[serde(default = "default_grid_margin")]
    pub margin: f64,
    /// Side length of the square chunks processed in parallel
    #[serde(default = "default_chunk_size")]
    pub chunk_size: f64,
    /// Points closer than this to an obstacle are classified `boundary`.
    /// Defaults to the grid spacing.
    #[serde(default)]
    pub adjacency_distance: Option<f64>,
}

impl GridConfig {
    pub fn adjacency_distance(&self) -> f64 {
        self.adjacency_distance.unwrap_or(self.spacing)
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            kind: GridKind::default(),
            spacing: default_grid_spacing(),
            margin: default_grid_margin(),
            chunk_size: default_chunk_size(),
            adjacency_distance: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DissolveConfig {
    /// Width of a crossability bucket; buffers only merge within a bucket
    #[serde(default = "default_bucket_width")]
    pub bucket_width: u8,
    #[serde(default = "default_simplify_tolerance")]
    pub simplify_tolerance: f64,
}

impl DissolveConfig {
    pub fn bucket_of(&self, crossability: u8) -> u8 {
        crossability / self.bucket_width.max(1)
    }
}

impl Default for DissolveConfig {
    fn default() -> Self {
        Self {
            bucket_width: default_bucket_width(),
            simplify_tolerance: default_simplify_tolerance(),
        }
    }
}

/// Every knob the pipeline stages read. Passed by reference to each stage.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// CRS of exported node coordinates: 3857 (Web Mercator meters) or
    /// 4326 (lon/lat degrees)
    #[serde(default = "default_storage_srid")]
    pub storage_srid: u32,
    #[serde(default = "default_boundary_node_spacing")]
    pub boundary_node_spacing: f64,
    #[serde(default)]
    pub boundary_sampling: BoundarySampling,
    #[serde(default = "default_max_connection_distance")]
    pub max_connection_distance: f64,
    #[serde(default = "default_buffer_distance")]
    pub buffer_distance: f64,
    /// Multiplier on `buffer_distance` for points outside every buffer
    #[serde(default = "default_buffer_fallback_factor")]
    pub buffer_fallback_factor: f64,
    #[serde(default = "default_max_connections_per_node")]
    pub max_connections_per_node: usize,
    #[serde(default = "default_max_connections_per_point")]
    pub max_connections_per_point: usize,
    #[serde(default)]
    pub strategy: StrategyKind,
    /// Jitter magnitude (meters) used when Voronoi construction fails
    #[serde(default = "default_voronoi_tolerance")]
    pub voronoi_tolerance: f64,
    #[serde(default = "default_roads")]
    pub roads: bool,
    #[serde(default = "default_road_snap_distance")]
    pub road_snap_distance: f64,
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub dissolve: DissolveConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            storage_srid: default_storage_srid(),
            boundary_node_spacing: default_boundary_node_spacing(),
            boundary_sampling: BoundarySampling::default(),
            max_connection_distance: default_max_connection_distance(),
            buffer_distance: default_buffer_distance(),
            buffer_fallback_factor: default_buffer_fallback_factor(),
            max_connections_per_node: default_max_connections_per_node(),
            max_connections_per_point: default_max_connections_per_point(),
            strategy: StrategyKind::default(),
            voronoi_tolerance: default_voronoi_tolerance(),
            roads: default_roads(),
            road_snap_distance: default_road_snap_distance(),
            grid: GridConfig::default(),
            dissolve: DissolveConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Reject values that would make a stage loop forever or divide by zero
    pub fn validate(&self) -> Result<()> {
        if !(self.boundary_node_spacing > 0.0) {
            bail!(
                "boundary_node_spacing must be positive, got {}",
                self.boundary_node_spacing
            );
        }
        if !(self.grid.spacing > 0.0) {
            bail!("grid.spacing must be positive, got {}", self.grid.spacing);
        }
        if !(self.grid.chunk_size >= self.grid.spacing) {
            bail!(
                "grid.chunk_size ({}) must be at least grid.spacing ({})",
                self.grid.chunk_size,
                self.grid.spacing
            );
        }
        if !(self.max_connection_distance >= 0.0) || !(self.buffer_distance >= 0.0) {
            bail!(
                "connection distances must be non-negative numbers, got max_connection_distance={} buffer_distance={}",
                self.max_connection_distance,
                self.buffer_distance
            );
        }
        if !(self.voronoi_tolerance >= 0.0) {
            bail!(
                "voronoi_tolerance must not be negative, got {}",
                self.voronoi_tolerance
            );
        }
        if !SUPPORTED_SRIDS.contains(&self.storage_srid) {
            bail!(
                "storage_srid {} is not supported (expected one of {:?})",
                self.storage_srid,
                SUPPORTED_SRIDS
            );
        }
        if self.max_connections_per_node == 0 || self.max_connections_per_point == 0 {
            bail!("connection caps must be at least 1");
        }
        if self.dissolve.bucket_width == 0 {
            bail!("dissolve.bucket_width must be at least 1");
        }
        Ok(())
    }
}

fn default_verbose() -> bool {
    false
}

/// Settings read from `terrain-graph.toml`. Pipeline options sit at the
/// top level next to the I/O options.
#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub input: Option<PathBuf>,
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub format: Option<ExportFormat>,
    #[serde(default = "default_verbose")]
    pub verbose: bool,
    #[serde(flatten)]
    pub pipeline: PipelineConfig,
}

impl FileConfig {
    pub fn load() -> Option<Self> {
        let config_paths = get_config_paths();

        for path in config_paths {
            if path.exists()
                && let Ok(contents) = std::fs::read_to_string(&path)
            {
                match toml::from_str(&contents) {
                    Ok(config) => {
                        tracing::debug!("loaded config from {:?}", path);
                        return Some(config);
                    }
                    Err(e) => {
                        tracing::warn!("failed to parse config file {:?}: {}", path, e);
                    }
                }
            }
        }
        None
    }
}

fn get_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    paths.push(PathBuf::from("terrain-graph.toml"));
    paths.push(PathBuf::from(".terrain-graph.toml"));

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("terrain-graph").join("config.toml"));
        paths.push(config_dir.join("terrain-graph.toml"));
    }

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".terrain-graph.toml"));
    }

    paths
}
