use anyhow::{Context, Result, bail};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use terrain_graph::config::{FileConfig, GridKind, PipelineConfig, StrategyKind};
use terrain_graph::domain::{EdgeType, UnifiedGraph};
use terrain_graph::export::{ExportFormat, nearest_node, slice_by_budget, slice_region, write_graph};
use terrain_graph::geometry::{Bounds, OutputFrame, Projector};
use terrain_graph::osm::load_response;
use terrain_graph::pipeline::run_pipeline;

/// Build a routable terrain graph with water-obstacle crossability from an
/// OpenStreetMap (Overpass JSON) export
///
/// Examples:
///   # Build a graph with default settings
///   terrain-graph -i area.json -o area.graphml
///
///   # Denser hex grid, nearest-neighbour connections, JSON output
///   terrain-graph -i area.json -o area.json --grid hex --grid-spacing 10 -s nearest
///
///   # Keep only what is reachable in 10 minutes of walking from a point
///   terrain-graph -i area.json --origin-lat 52.5 --origin-lon 13.4 --budget-secs 600
///
///   # Use a config file
///   terrain-graph --config my-settings.toml
#[derive(Parser, Debug)]
#[command(name = "terrain-graph")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to config file (optional, auto-searches terrain-graph.toml if not provided)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overpass JSON export to read
    #[arg(short = 'i', long)]
    input: Option<PathBuf>,

    /// Output file path (defaults to {input}.graph.graphml)
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Output format (defaults to the output file extension, then graphml)
    #[arg(short = 'f', long)]
    format: Option<ExportFormat>,

    /// Connection strategy
    #[arg(short = 's', long)]
    strategy: Option<StrategyKind>,

    /// Terrain grid layout
    #[arg(long)]
    grid: Option<GridKind>,

    /// Terrain grid spacing in meters
    #[arg(long)]
    grid_spacing: Option<f64>,

    /// Boundary node spacing in meters
    #[arg(long)]
    node_spacing: Option<f64>,

    /// Maximum connection length in meters
    #[arg(long)]
    max_distance: Option<f64>,

    /// Leave roads out of the graph
    #[arg(long)]
    no_roads: bool,

    /// Only export nodes inside south,west,north,east (degrees)
    #[arg(long, allow_hyphen_values = true)]
    bbox: Option<String>,

    /// Latitude of the time-budget origin (use with --origin-lon and --budget-secs)
    #[arg(long, requires_all = ["origin_lon", "budget_secs"])]
    origin_lat: Option<f64>,

    /// Longitude of the time-budget origin
    #[arg(long, requires = "origin_lat", allow_hyphen_values = true)]
    origin_lon: Option<f64>,

    /// Time budget in seconds for reachability slicing
    #[arg(long, requires = "origin_lat")]
    budget_secs: Option<f64>,

    /// Travel speed in meters per second for reachability slicing
    #[arg(long, default_value = "1.4")]
    speed: f64,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let total_start = Instant::now();

    let file_config: Option<FileConfig> = if let Some(ref config_path) = args.config {
        if config_path.exists() {
            let contents = std::fs::read_to_string(config_path)
                .context(format!("Failed to read config file: {:?}", config_path))?;
            Some(toml::from_str(&contents).context("Failed to parse config file")?)
        } else {
            bail!("Config file not found: {:?}", config_path);
        }
    } else {
        FileConfig::load()
    };

    let verbose = args.verbose || file_config.as_ref().map(|c| c.verbose).unwrap_or(false);
    init_logging(verbose);

    let input = args
        .input
        .clone()
        .or_else(|| file_config.as_ref().and_then(|c| c.input.clone()))
        .context("Must provide an Overpass JSON export with --input/-i or in the config file")?;
    let output = args
        .output
        .clone()
        .or_else(|| file_config.as_ref().and_then(|c| c.output.clone()));
    let format = args
        .format
        .or_else(|| file_config.as_ref().and_then(|c| c.format))
        .or_else(|| output.as_deref().and_then(ExportFormat::from_path))
        .unwrap_or_default();
    let output_path =
        output.unwrap_or_else(|| input.with_extension(format!("graph.{}", format.extension())));

    let config = apply_overrides(
        file_config.map(|c| c.pipeline).unwrap_or_default(),
        &args,
    );

    println!("terrain-graph - Routable Terrain Graph Builder");
    println!("==============================================");
    println!();

    if verbose {
        println!("Configuration:");
        println!("  Input: {}", input.display());
        println!("  Output: {} ({:?})", output_path.display(), format);
        println!("  Strategy: {}", config.strategy.as_str());
        println!("  Output SRID: {}", config.storage_srid);
        println!(
            "  Grid: {:?}, {}m spacing, {}m margin",
            config.grid.kind, config.grid.spacing, config.grid.margin
        );
        println!("  Boundary node spacing: {}m", config.boundary_node_spacing);
        println!("  Max connection distance: {}m", config.max_connection_distance);
        println!(
            "  Caps: {} per point, {} per node",
            config.max_connections_per_point, config.max_connections_per_node
        );
        println!(
            "  Roads: {}",
            if config.roads { "enabled" } else { "disabled" }
        );
        println!();
    }

    let spinner = create_spinner("Reading OSM export...");
    let start = Instant::now();
    let response = load_response(&input)?;
    spinner.finish_with_message(format!(
        "Read {} OSM elements [{:.1}s]",
        response.elements.len(),
        start.elapsed().as_secs_f32()
    ));

    let spinner = create_spinner("Running pipeline...");
    let start = Instant::now();
    let output = run_pipeline(&response, &config, |report| {
        spinner.set_message(format!(
            "Stage {}: {} rows, {} skipped",
            report.name, report.rows, report.skipped
        ));
    })
    .context("Pipeline failed")?;
    spinner.finish_with_message(format!(
        "Built graph: {} nodes, {} edges [{:.1}s]",
        output.graph.node_count(),
        output.graph.edge_count(),
        start.elapsed().as_secs_f32()
    ));

    if verbose {
        for stage in &output.summary.stages {
            println!(
                "  {:<13} {:>8} rows {:>6} skipped {}",
                stage.name,
                stage.rows,
                stage.skipped,
                if stage.ok { "ok" } else { "NO-GO" }
            );
        }
        for edge_type in [
            EdgeType::Terrain,
            EdgeType::Water,
            EdgeType::Connection,
            EdgeType::Road,
            EdgeType::Connector,
        ] {
            println!(
                "  {} edges: {}",
                edge_type.as_str(),
                output.graph.count_edges(edge_type)
            );
        }
        for fallback in &output.summary.fallbacks {
            println!("  Strategy fallback: {}", fallback);
        }
    }

    let graph = slice_graph(&output.graph, &output.projector, &args)?;
    let frame = OutputFrame::new(output.projector.clone(), config.storage_srid)?;

    let spinner = create_spinner("Writing graph...");
    let start = Instant::now();
    write_graph(
        &output_path,
        &graph,
        format,
        &frame,
        &output.summary,
    )
    .context("Failed to write graph")?;
    spinner.finish_with_message(format!(
        "Wrote {} nodes, {} edges [{:.1}s]",
        graph.node_count(),
        graph.edge_count(),
        start.elapsed().as_secs_f32()
    ));

    println!();
    println!("{}", output.summary.summary());
    if !output.summary.is_connected() {
        println!(
            "Warning: {} nodes are unreachable from the main component",
            output.summary.unreachable.len()
        );
    }
    println!(
        "Done! Total time: {:.1}s",
        total_start.elapsed().as_secs_f32()
    );
    println!();
    println!("Output: {}", output_path.display());

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// CLI values win over the config file
fn apply_overrides(mut config: PipelineConfig, args: &Args) -> PipelineConfig {
    if let Some(strategy) = args.strategy {
        config.strategy = strategy;
    }
    if let Some(kind) = args.grid {
        config.grid.kind = kind;
    }
    if let Some(spacing) = args.grid_spacing {
        config.grid.spacing = spacing;
    }
    if let Some(spacing) = args.node_spacing {
        config.boundary_node_spacing = spacing;
    }
    if let Some(distance) = args.max_distance {
        config.max_connection_distance = distance;
    }
    if args.no_roads {
        config.roads = false;
    }
    config
}

/// Parse `south,west,north,east` into projected bounds
fn parse_bbox(raw: &str, projector: &Projector) -> Result<Bounds> {
    let values: Vec<f64> = raw
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("Invalid --bbox value: {}", raw))?;
    let &[south, west, north, east] = values.as_slice() else {
        bail!("--bbox needs 4 values (south,west,north,east), got {}", values.len());
    };
    if south > north || west > east {
        bail!("--bbox corners are out of order: {}", raw);
    }

    let low = projector.project(south, west);
    let high = projector.project(north, east);
    Ok(Bounds::new(low.x, low.y, high.x, high.y))
}

fn slice_graph(graph: &UnifiedGraph, projector: &Projector, args: &Args) -> Result<UnifiedGraph> {
    let mut sliced = graph.clone();

    if let Some(ref raw) = args.bbox {
        let region = parse_bbox(raw, projector)?;
        sliced = slice_region(&sliced, &region);
        println!(
            "Sliced to bounding box: {} nodes, {} edges",
            sliced.node_count(),
            sliced.edge_count()
        );
    }

    if let (Some(lat), Some(lon), Some(budget)) = (args.origin_lat, args.origin_lon, args.budget_secs)
    {
        let origin = nearest_node(&sliced, projector.project(lat, lon))
            .context("No graph node to start the time-budget slice from")?;
        sliced = slice_by_budget(&sliced, origin, budget, args.speed)?;
        println!(
            "Sliced to {:.0}s at {} m/s: {} nodes, {} edges",
            budget,
            args.speed,
            sliced.node_count(),
            sliced.edge_count()
        );
    }

    Ok(sliced)
}

fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}
