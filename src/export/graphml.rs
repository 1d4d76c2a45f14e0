use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::domain::UnifiedGraph;
use crate::geometry::OutputFrame;

/// Attribute keys declared in the GraphML header: (id, domain, type)
const KEYS: [(&str, &str, &str); 13] = [
    ("srid", "graph", "int"),
    ("origin_lat", "graph", "double"),
    ("origin_lon", "graph", "double"),
    ("kind", "node", "string"),
    ("source_id", "node", "long"),
    ("x", "node", "double"),
    ("y", "node", "double"),
    ("local_x", "node", "double"),
    ("local_y", "node", "double"),
    ("cost", "edge", "double"),
    ("edge_type", "edge", "string"),
    ("obstacle_id", "edge", "long"),
    ("crossability", "edge", "int"),
];

/// Write the graph as undirected GraphML.
///
/// Nodes are `n{index}` and edges `e{index}`, so indices round-trip.
/// `x`/`y` are in the frame's SRID; `local_x`/`local_y` are the planar
/// meters edge costs were measured in, relative to `origin_lat`/`origin_lon`.
/// Edge attributes without a value (`obstacle_id`, `crossability` on
/// terrain edges) are omitted rather than written empty.
pub fn write_graphml(path: &Path, graph: &UnifiedGraph, frame: &OutputFrame) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create GraphML file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(
        writer,
        r#"<graphml xmlns="http://graphml.graphdrawing.org/xmlns">"#
    )?;
    for (id, domain, kind) in KEYS {
        writeln!(
            writer,
            r#"  <key id="{id}" for="{domain}" attr.name="{id}" attr.type="{kind}"/>"#
        )?;
    }
    writeln!(writer, r#"  <graph id="G" edgedefault="undirected">"#)?;
    let (origin_lat, origin_lon) = frame.origin();
    writeln!(writer, r#"    <data key="srid">{}</data>"#, frame.srid())?;
    writeln!(writer, r#"    <data key="origin_lat">{origin_lat}</data>"#)?;
    writeln!(writer, r#"    <data key="origin_lon">{origin_lon}</data>"#)?;

    for (index, node) in graph.nodes.iter().enumerate() {
        writeln!(writer, r#"    <node id="n{index}">"#)?;
        writeln!(writer, r#"      <data key="kind">{}</data>"#, node.source.kind())?;
        writeln!(
            writer,
            r#"      <data key="source_id">{}</data>"#,
            node.source.source_id()
        )?;
        let stored = frame.transform(node.position);
        writeln!(writer, r#"      <data key="x">{}</data>"#, stored.x)?;
        writeln!(writer, r#"      <data key="y">{}</data>"#, stored.y)?;
        writeln!(writer, r#"      <data key="local_x">{}</data>"#, node.position.x)?;
        writeln!(writer, r#"      <data key="local_y">{}</data>"#, node.position.y)?;
        writeln!(writer, "    </node>")?;
    }

    for (index, edge) in graph.edges.iter().enumerate() {
        writeln!(
            writer,
            r#"    <edge id="e{index}" source="n{}" target="n{}">"#,
            edge.source, edge.target
        )?;
        writeln!(writer, r#"      <data key="cost">{}</data>"#, edge.cost)?;
        writeln!(
            writer,
            r#"      <data key="edge_type">{}</data>"#,
            edge.edge_type.as_str()
        )?;
        if let Some(obstacle_id) = edge.obstacle_id {
            writeln!(writer, r#"      <data key="obstacle_id">{obstacle_id}</data>"#)?;
        }
        if let Some(crossability) = edge.crossability {
            writeln!(
                writer,
                r#"      <data key="crossability">{crossability}</data>"#
            )?;
        }
        writeln!(writer, "    </edge>")?;
    }

    writeln!(writer, "  </graph>")?;
    writeln!(writer, "</graphml>")?;
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EdgeType, GraphEdge, NodeRef};
    use crate::geometry::Projector;
    use crate::geometry::projection::web_mercator;
    use geo::Coord;
    use std::fs;
    use tempfile::tempdir;

    fn sample_graph() -> UnifiedGraph {
        let mut graph = UnifiedGraph::new();
        let a = graph.add_node(NodeRef::Terrain(4), Coord { x: 0.0, y: 0.0 });
        let b = graph.add_node(NodeRef::Boundary(9), Coord { x: 3.0, y: 4.0 });
        let c = graph.add_node(NodeRef::Boundary(10), Coord { x: 6.0, y: 4.0 });
        graph.add_edge(GraphEdge::new(a, b, 5.0, EdgeType::Connection));
        graph.add_edge(GraphEdge::new(b, c, 3.0, EdgeType::Water).with_obstacle(2, 60));
        graph
    }

    fn frame(srid: u32) -> OutputFrame {
        OutputFrame::new(Projector::new((52.5, 13.4)), srid).unwrap()
    }

    fn data_value(contents: &str, node: &str, key: &str) -> f64 {
        let start = contents.find(&format!(r#"<node id="{node}">"#)).unwrap();
        let open = format!(r#"<data key="{key}">"#);
        let from = start + contents[start..].find(&open).unwrap() + open.len();
        let to = from + contents[from..].find("</data>").unwrap();
        contents[from..to].parse().unwrap()
    }

    #[test]
    fn test_write_graphml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("graph.graphml");

        write_graphml(&path, &sample_graph(), &frame(3857)).unwrap();
        let contents = fs::read_to_string(&path).unwrap();

        assert!(contents.starts_with("<?xml"));
        assert_eq!(contents.matches("<node ").count(), 3);
        assert_eq!(contents.matches("<edge ").count(), 2);
        assert!(contents.contains(r#"<data key="srid">3857</data>"#));
        assert!(contents.contains(r#"<edge id="e1" source="n1" target="n2">"#));
        assert!(contents.contains(r#"<data key="crossability">60</data>"#));
        assert!(contents.contains(r#"<data key="kind">boundary</data>"#));
        // only the water edge carries an obstacle
        assert_eq!(contents.matches(r#"<data key="obstacle_id">"#).count(), 1);
        assert!(contents.trim_end().ends_with("</graphml>"));
    }

    #[test]
    fn test_graphml_coordinates_match_declared_frame() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("graph.graphml");

        write_graphml(&path, &sample_graph(), &frame(3857)).unwrap();
        let contents = fs::read_to_string(&path).unwrap();

        assert!(contents.contains(r#"<data key="origin_lat">52.5</data>"#));
        assert!(contents.contains(r#"<data key="origin_lon">13.4</data>"#));

        // node n0 sits on the local origin
        let expected = web_mercator(52.5, 13.4);
        assert!((data_value(&contents, "n0", "x") - expected.x).abs() < 1e-3);
        assert!((data_value(&contents, "n0", "y") - expected.y).abs() < 1e-3);
        assert_eq!(data_value(&contents, "n1", "local_x"), 3.0);
        assert_eq!(data_value(&contents, "n1", "local_y"), 4.0);

        write_graphml(&path, &sample_graph(), &frame(4326)).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains(r#"<data key="srid">4326</data>"#));
        assert!((data_value(&contents, "n0", "x") - 13.4).abs() < 1e-9);
        assert!((data_value(&contents, "n0", "y") - 52.5).abs() < 1e-9);
    }

    #[test]
    fn test_write_graphml_bad_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("graph.graphml");
        let err = write_graphml(&path, &sample_graph(), &frame(3857)).unwrap_err();
        assert!(err.to_string().contains("Failed to create GraphML file"));
    }
}
