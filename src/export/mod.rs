//! Graph serialisation and slicing.

pub mod graphml;
pub mod json;
pub mod slice;

use anyhow::Result;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::domain::UnifiedGraph;
use crate::geometry::OutputFrame;
use crate::pipeline::PipelineSummary;

pub use graphml::write_graphml;
pub use json::write_json;
pub use slice::{nearest_node, slice_by_budget, slice_region};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// GraphML node/edge attributes
    #[default]
    Graphml,
    /// Node and edge tables plus the run summary
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Graphml => "graphml",
            ExportFormat::Json => "json",
        }
    }

    /// Guess the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "graphml" | "xml" => Some(ExportFormat::Graphml),
            "json" => Some(ExportFormat::Json),
            _ => None,
        }
    }
}

/// Write `graph` in the requested format
pub fn write_graph(
    path: &Path,
    graph: &UnifiedGraph,
    format: ExportFormat,
    frame: &OutputFrame,
    summary: &PipelineSummary,
) -> Result<()> {
    match format {
        ExportFormat::Graphml => write_graphml(path, graph, frame),
        ExportFormat::Json => write_json(path, graph, frame, Some(summary)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            ExportFormat::from_path(&PathBuf::from("out.GraphML")),
            Some(ExportFormat::Graphml)
        );
        assert_eq!(
            ExportFormat::from_path(&PathBuf::from("out.json")),
            Some(ExportFormat::Json)
        );
        assert_eq!(ExportFormat::from_path(&PathBuf::from("out.csv")), None);
        assert_eq!(ExportFormat::from_path(&PathBuf::from("out")), None);
    }

    #[test]
    fn test_format_extension() {
        assert_eq!(ExportFormat::Graphml.extension(), "graphml");
        assert_eq!(ExportFormat::Json.extension(), "json");
    }
}
