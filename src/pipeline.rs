//! End-to-end run: OSM export in, repaired unified graph out.

use anyhow::{Result, bail};
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::connect::{ConnectionInput, ConnectionOutcome, build_connections};
use crate::domain::{TerrainClass, UnifiedGraph, WaterGeometry, WaterObstacle};
use crate::geometry::{Bounds, ObstacleIndex, Projector};
use crate::osm::{ExtractedFeatures, OverpassResponse, extract_features, projector_for};
use crate::stages::{
    BoundaryOutput, ConnectivityReport, GraphParts, TerrainGrid, build_buffers, dissolve_buffers,
    extract_boundaries, generate_grid, repair_connectivity, unify_graph,
};

/// Row and skip counts of one stage, with an explicit go/no-go flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub name: &'static str,
    pub rows: usize,
    pub skipped: usize,
    pub ok: bool,
}

impl StageReport {
    pub fn new(name: &'static str, rows: usize, skipped: usize, ok: bool) -> Self {
        Self {
            name,
            rows,
            skipped,
            ok,
        }
    }
}

/// Final report of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineSummary {
    pub stages: Vec<StageReport>,
    /// Components left after connectivity repair
    pub components: usize,
    pub connectors: usize,
    /// Graph node indices outside the main component
    pub unreachable: Vec<usize>,
    pub unconnected_points: usize,
    pub unconnected_nodes: usize,
    /// Degenerate features, buffers and obstacles skipped along the way
    pub degenerate: usize,
    /// Connection strategy whose edges were kept
    pub strategy: Option<&'static str>,
    /// Strategies that failed before it, with their errors
    pub fallbacks: Vec<String>,
}

impl PipelineSummary {
    pub fn is_connected(&self) -> bool {
        self.components <= 1
    }

    pub fn has_issues(&self) -> bool {
        !self.is_connected() || self.stages.iter().any(|s| !s.ok)
    }

    pub fn summary(&self) -> String {
        if !self.has_issues() {
            format!(
                "Graph connected: {} connectors added, {} unconnected points, {} degenerate skipped",
                self.connectors, self.unconnected_points, self.degenerate
            )
        } else {
            format!(
                "Graph issues: {} components, {} unreachable nodes, {} unconnected points, {} unconnected nodes, {} degenerate skipped",
                self.components,
                self.unreachable.len(),
                self.unconnected_points,
                self.unconnected_nodes,
                self.degenerate
            )
        }
    }
}

/// Every intermediate result of a run, owned by the caller
#[derive(Debug)]
pub struct PipelineOutput {
    pub projector: Projector,
    pub features: ExtractedFeatures,
    pub obstacles: Vec<WaterObstacle>,
    pub terrain: TerrainGrid,
    pub boundary: BoundaryOutput,
    pub connections: ConnectionOutcome,
    pub graph: UnifiedGraph,
    pub connectivity: ConnectivityReport,
    pub summary: PipelineSummary,
}

/// Extent of all extracted geometry, in projected meters
fn feature_bounds(features: &ExtractedFeatures) -> Option<Bounds> {
    let mut coords = Vec::new();
    for feature in &features.water {
        match &feature.geometry {
            WaterGeometry::Line(line) => coords.extend(line.0.iter().copied()),
            WaterGeometry::Area(polygon) => coords.extend(polygon.exterior().0.iter().copied()),
        }
    }
    for road in &features.roads {
        coords.extend(road.points.iter().copied());
    }
    Bounds::from_points(&coords)
}

/// Run every stage in order.
///
/// `on_stage` sees each [`StageReport`] as soon as the stage finishes.
/// Geometry failures inside a stage are skipped and counted; only an
/// invalid config or an export with nothing to build on is an error.
pub fn run_pipeline(
    response: &OverpassResponse,
    config: &PipelineConfig,
    mut on_stage: impl FnMut(&StageReport),
) -> Result<PipelineOutput> {
    config.validate()?;

    let mut summary = PipelineSummary::default();
    let mut record = |summary: &mut PipelineSummary, report: StageReport| {
        tracing::info!(
            stage = report.name,
            rows = report.rows,
            skipped = report.skipped,
            ok = report.ok,
            "stage finished"
        );
        on_stage(&report);
        summary.stages.push(report);
    };

    let Some(projector) = projector_for(response) else {
        bail!("OSM export contains no nodes with coordinates");
    };
    let features = extract_features(response, &projector);
    record(
        &mut summary,
        StageReport::new(
            "extract",
            features.water.len() + features.roads.len(),
            features.degenerate,
            !features.water.is_empty(),
        ),
    );
    let Some(extent) = feature_bounds(&features) else {
        bail!("OSM export contains no water or road features");
    };

    let buffered = build_buffers(&features.water);
    record(
        &mut summary,
        StageReport::new(
            "buffer",
            buffered.buffers.len(),
            buffered.degenerate,
            buffered.degenerate < features.water.len() || features.water.is_empty(),
        ),
    );

    let obstacles = dissolve_buffers(&buffered.buffers, &config.dissolve);
    record(
        &mut summary,
        StageReport::new("dissolve", obstacles.len(), 0, true),
    );

    let index = ObstacleIndex::new(obstacles.iter().map(|o| o.polygon.clone()).collect());
    let terrain = generate_grid(&extent.expanded(config.grid.margin), &index, &config.grid);
    record(
        &mut summary,
        StageReport::new(
            "grid",
            terrain.points.len(),
            terrain.count(TerrainClass::Water),
            !terrain.edges.is_empty(),
        ),
    );

    let boundary = extract_boundaries(
        &obstacles,
        config.boundary_node_spacing,
        config.boundary_sampling,
    );
    record(
        &mut summary,
        StageReport::new(
            "boundary",
            boundary.nodes.len(),
            boundary.degenerate,
            boundary.degenerate < obstacles.len() || obstacles.is_empty(),
        ),
    );

    let input = ConnectionInput::new(&terrain.points, &boundary.nodes, &index);
    let connections = build_connections(&input, config);
    record(
        &mut summary,
        StageReport::new(
            "connect",
            connections.edges.len(),
            connections.unconnected_points.len(),
            connections.strategy_used.is_some() || boundary.nodes.is_empty(),
        ),
    );

    let parts = GraphParts {
        terrain: &terrain,
        obstacles: &obstacles,
        boundary: &boundary,
        connections: &connections.edges,
        roads: &features.roads,
    };
    let (mut graph, unify_report) = unify_graph(&parts, config);
    record(
        &mut summary,
        StageReport::new(
            "unify",
            graph.edge_count(),
            unify_report.dangling,
            graph.node_count() > 0,
        ),
    );

    let connectivity = repair_connectivity(&mut graph);
    record(
        &mut summary,
        StageReport::new(
            "connectivity",
            connectivity.connectors,
            connectivity.unreachable.len(),
            connectivity.exhausted.is_none(),
        ),
    );

    summary.components = connectivity.components;
    summary.connectors = connectivity.connectors;
    summary.unreachable = connectivity.unreachable.clone();
    summary.unconnected_points = connections.unconnected_points.len();
    summary.unconnected_nodes = connections.unconnected_nodes.len();
    summary.degenerate = features.degenerate + buffered.degenerate + boundary.degenerate;
    summary.strategy = connections.strategy_used.map(|s| s.as_str());
    summary.fallbacks = connections
        .fallbacks
        .iter()
        .map(|(kind, e)| format!("{}: {}", kind.as_str(), e))
        .collect();

    tracing::info!("{}", summary.summary());

    Ok(PipelineOutput {
        projector,
        features,
        obstacles,
        terrain,
        boundary,
        connections,
        graph,
        connectivity,
        summary,
    })
}
