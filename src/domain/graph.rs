use geo::Coord;
use std::collections::HashMap;

use crate::config::StrategyKind;

/// Edge joining a boundary terrain point to a boundary node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectionEdge {
    pub terrain_point_id: u64,
    pub boundary_node_id: u64,
    pub water_obstacle_id: u64,
    pub distance: f64,
    /// Strategy that actually produced the edge (after any fallback)
    pub strategy: StrategyKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeRef {
    Terrain(u64),
    Boundary(u64),
    /// OSM node id of a road vertex
    Road(u64),
}

impl NodeRef {
    pub fn kind(&self) -> &'static str {
        match self {
            NodeRef::Terrain(_) => "terrain",
            NodeRef::Boundary(_) => "boundary",
            NodeRef::Road(_) => "road",
        }
    }

    pub fn source_id(&self) -> u64 {
        match *self {
            NodeRef::Terrain(id) | NodeRef::Boundary(id) | NodeRef::Road(id) => id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphNode {
    pub source: NodeRef,
    pub position: Coord<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeType {
    Terrain,
    Water,
    Connection,
    Road,
    Connector,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Terrain => "terrain",
            EdgeType::Water => "water",
            EdgeType::Connection => "connection",
            EdgeType::Road => "road",
            EdgeType::Connector => "connector",
        }
    }
}

/// Undirected edge between two node indices of a [`UnifiedGraph`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphEdge {
    pub source: usize,
    pub target: usize,
    pub cost: f64,
    pub edge_type: EdgeType,
    pub obstacle_id: Option<u64>,
    pub crossability: Option<u8>,
}

impl GraphEdge {
    pub fn new(source: usize, target: usize, cost: f64, edge_type: EdgeType) -> Self {
        Self {
            source,
            target,
            cost,
            edge_type,
            obstacle_id: None,
            crossability: None,
        }
    }

    pub fn with_obstacle(mut self, obstacle_id: u64, crossability: u8) -> Self {
        self.obstacle_id = Some(obstacle_id);
        self.crossability = Some(crossability);
        self
    }
}

/// Node and edge tables of the routable graph. Node indices are dense and
/// stable for the lifetime of the graph.
#[derive(Debug, Clone, Default)]
pub struct UnifiedGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    lookup: HashMap<NodeRef, usize>,
}

impl UnifiedGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, or return the index it already has
    pub fn add_node(&mut self, source: NodeRef, position: Coord<f64>) -> usize {
        if let Some(&index) = self.lookup.get(&source) {
            return index;
        }
        let index = self.nodes.len();
        self.nodes.push(GraphNode { source, position });
        self.lookup.insert(source, index);
        index
    }

    pub fn index_of(&self, source: NodeRef) -> Option<usize> {
        self.lookup.get(&source).copied()
    }

    pub fn add_edge(&mut self, edge: GraphEdge) {
        self.edges.push(edge);
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn count_edges(&self, edge_type: EdgeType) -> usize {
        self.edges.iter().filter(|e| e.edge_type == edge_type).count()
    }
}
