use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Raw Overpass API response (`[out:json]`)
#[derive(Debug, Deserialize)]
pub struct OverpassResponse {
    pub elements: Vec<Element>,
}

/// A single element from Overpass (node or way)
#[derive(Debug, Deserialize)]
pub struct Element {
    #[serde(rename = "type")]
    pub type_: String,
    pub id: u64,
    #[serde(default)]
    pub nodes: Option<Vec<u64>>,
    #[serde(default)]
    pub tags: Option<HashMap<String, String>>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
}

impl Element {
    pub fn tag(&self, key: &str) -> Option<String> {
        self.tags.as_ref().and_then(|t| t.get(key).cloned())
    }
}

/// Read an Overpass JSON export from disk
pub fn load_response(path: &Path) -> Result<OverpassResponse> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read OSM export: {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse Overpass JSON: {}", path.display()))
}
