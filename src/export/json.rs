use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::domain::UnifiedGraph;
use crate::geometry::OutputFrame;
use crate::pipeline::PipelineSummary;

#[derive(Debug, Serialize)]
struct NodeRow {
    index: usize,
    kind: &'static str,
    source_id: u64,
    /// In the document's `srid`
    x: f64,
    y: f64,
    /// Planar meters around the local origin, the frame of edge costs
    local_x: f64,
    local_y: f64,
}

#[derive(Debug, Serialize)]
struct EdgeRow {
    source: usize,
    target: usize,
    cost: f64,
    edge_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    obstacle_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    crossability: Option<u8>,
}

#[derive(Debug, Serialize)]
struct GraphDocument<'a> {
    srid: u32,
    origin_lat: f64,
    origin_lon: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<&'a PipelineSummary>,
    nodes: Vec<NodeRow>,
    edges: Vec<EdgeRow>,
}

/// Write node and edge tables (plus the run summary when given) as JSON
pub fn write_json(
    path: &Path,
    graph: &UnifiedGraph,
    frame: &OutputFrame,
    summary: Option<&PipelineSummary>,
) -> Result<()> {
    let (origin_lat, origin_lon) = frame.origin();
    let document = GraphDocument {
        srid: frame.srid(),
        origin_lat,
        origin_lon,
        summary,
        nodes: graph
            .nodes
            .iter()
            .enumerate()
            .map(|(index, node)| {
                let stored = frame.transform(node.position);
                NodeRow {
                    index,
                    kind: node.source.kind(),
                    source_id: node.source.source_id(),
                    x: stored.x,
                    y: stored.y,
                    local_x: node.position.x,
                    local_y: node.position.y,
                }
            })
            .collect(),
        edges: graph
            .edges
            .iter()
            .map(|edge| EdgeRow {
                source: edge.source,
                target: edge.target,
                cost: edge.cost,
                edge_type: edge.edge_type.as_str(),
                obstacle_id: edge.obstacle_id,
                crossability: edge.crossability,
            })
            .collect(),
    };

    let file = File::create(path)
        .with_context(|| format!("Failed to create JSON file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &document).context("Failed to serialize graph")?;
    writer.flush()?;

    Ok(())
}
