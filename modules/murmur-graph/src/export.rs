//! Serialized outputs of a graph build: a portable GraphML document for
//! the analysis toolchain and a node/link JSON structure for force-directed
//! rendering.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use crate::builder::InteractionGraph;
use crate::community::BlockAssignment;

/// The highest-degree node renders this many times larger than the rest.
const MAX_SCALE: f64 = 6.0;

#[derive(Debug, Clone, Serialize)]
pub struct NodeJson {
    pub id: usize,
    pub id_str: String,
    pub screen_name: String,
    pub name: String,
    pub degree: u32,
    pub size: f64,
    pub group: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkJson {
    pub id: String,
    pub source: usize,
    pub target: usize,
    pub weight: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeLinkData {
    pub nodes: Vec<NodeJson>,
    pub links: Vec<LinkJson>,
}

/// Build the d3-style node/link structure. Vertices below `min_degree`
/// (and the edges touching them) are filtered out so irrelevant nodes
/// don't blow up the rendering.
pub fn node_link_json(
    graph: &InteractionGraph,
    assignment: &BlockAssignment,
    min_degree: u32,
) -> NodeLinkData {
    let degrees = graph.out_degrees();
    let max_degree = degrees.values().copied().max().unwrap_or(0).max(1) as f64;

    let mut nodes = Vec::new();
    for n in graph.graph.node_indices() {
        let degree = degrees[&n.index()];
        if degree < min_degree {
            continue;
        }
        let info = &graph.graph[n];
        let size = (degree as f64 * MAX_SCALE / max_degree * 100.0).round() / 100.0;
        nodes.push(NodeJson {
            id: n.index(),
            id_str: info.id.to_string(),
            screen_name: info
                .handle
                .clone()
                .unwrap_or_else(|| format!("ID: {}", info.id)),
            name: info.display_name.clone().unwrap_or_default(),
            degree,
            size,
            group: assignment.block_of(n.index()),
        });
    }

    let mut links = Vec::new();
    let mut counter = 0usize;
    for edge in graph.graph.edge_indices() {
        let Some((source, target)) = graph.graph.edge_endpoints(edge) else {
            continue;
        };
        if degrees[&source.index()] < min_degree || degrees[&target.index()] < min_degree {
            continue;
        }
        counter += 1;
        let key = InteractionGraph::edge_key(source, target);
        links.push(LinkJson {
            id: format!("e{counter}"),
            source: source.index(),
            target: target.index(),
            weight: graph.weights.get(&key).copied().unwrap_or(1),
        });
    }

    debug!(
        nodes = nodes.len(),
        links = links.len(),
        min_degree,
        "Node/link JSON built"
    );
    NodeLinkData { nodes, links }
}

/// Serialize the multigraph as GraphML with `weight` and
/// `interaction_type` edge properties.
pub fn graphml(graph: &InteractionGraph) -> String {
    let mut out = String::new();
    out.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    out.push('\n');
    out.push_str(r#"<graphml xmlns="http://graphml.graphdrawing.org/xmlns">"#);
    out.push('\n');
    out.push_str(r#"  <key id="d0" for="edge" attr.name="weight" attr.type="int"/>"#);
    out.push('\n');
    out.push_str(r#"  <key id="d1" for="edge" attr.name="interaction_type" attr.type="int"/>"#);
    out.push('\n');
    out.push_str(r#"  <key id="d2" for="node" attr.name="actor_id" attr.type="string"/>"#);
    out.push('\n');
    out.push_str(r#"  <graph id="G" edgedefault="directed">"#);
    out.push('\n');

    for n in graph.graph.node_indices() {
        let info = &graph.graph[n];
        out.push_str(&format!(
            "    <node id=\"n{}\"><data key=\"d2\">{}</data></node>\n",
            n.index(),
            info.id
        ));
    }
    for edge in graph.graph.edge_indices() {
        if let Some((source, target)) = graph.graph.edge_endpoints(edge) {
            let info = &graph.graph[edge];
            out.push_str(&format!(
                "    <edge source=\"n{}\" target=\"n{}\"><data key=\"d0\">{}</data><data key=\"d1\">{}</data></edge>\n",
                source.index(),
                target.index(),
                info.weight,
                info.interaction_type
            ));
        }
    }

    out.push_str("  </graph>\n</graphml>\n");
    out
}

#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub graphml: PathBuf,
    pub json: PathBuf,
    pub svg: Option<PathBuf>,
}

/// Persist the build artifacts side by side: the GraphML and node/link
/// JSON produced here, plus the rendered SVG bytes handed back by the
/// external layout routine (when rendering was requested).
pub fn write_artifacts(
    dir: &Path,
    base_name: &str,
    graphml_doc: &str,
    node_link: &NodeLinkData,
    svg: Option<&[u8]>,
) -> Result<ArtifactPaths> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating artifact dir {}", dir.display()))?;

    let graphml_path = dir.join(format!("{base_name}.graphml"));
    std::fs::write(&graphml_path, graphml_doc)
        .with_context(|| format!("writing {}", graphml_path.display()))?;

    let json_path = dir.join(format!("{base_name}.json"));
    let json = serde_json::to_vec_pretty(node_link)?;
    std::fs::write(&json_path, json).with_context(|| format!("writing {}", json_path.display()))?;

    let svg_path = match svg {
        Some(bytes) => {
            let path = dir.join(format!("{base_name}.svg"));
            std::fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))?;
            Some(path)
        }
        None => None,
    };

    Ok(ArtifactPaths {
        graphml: graphml_path,
        json: json_path,
        svg: svg_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{GraphBuilder, InteractionKind};
    use crate::community::BlockAssignment;
    use murmur_common::Actor;

    fn actor(id: u64, handle: &str) -> Actor {
        Actor::stub(id, Some(handle.to_string()), Some(handle.to_string()))
    }

    fn small_graph() -> InteractionGraph {
        let actors = vec![actor(1, "u1"), actor(2, "u2"), actor(3, "loner")];
        let mut graph = GraphBuilder::from_posts(&[], &actors);
        graph.add_interaction(1, 2, InteractionKind::Mention);
        graph.add_interaction(1, 2, InteractionKind::Mention);
        graph
    }

    #[test]
    fn min_degree_filters_nodes_and_their_edges() {
        let graph = small_graph();
        let assignment = BlockAssignment::default();
        let data = node_link_json(&graph, &assignment, 1);

        // Only u1 has out-degree >= 1; the edge to filtered u2 is dropped.
        assert_eq!(data.nodes.len(), 1);
        assert_eq!(data.nodes[0].screen_name, "u1");
        assert!(data.links.is_empty());

        let all = node_link_json(&graph, &assignment, 0);
        assert_eq!(all.nodes.len(), 3);
        assert_eq!(all.links.len(), 1);
        assert_eq!(all.links[0].weight, 2);
    }

    #[test]
    fn highest_degree_node_gets_max_scale() {
        let graph = small_graph();
        let data = node_link_json(&graph, &BlockAssignment::default(), 0);
        let u1 = data.nodes.iter().find(|n| n.screen_name == "u1").unwrap();
        assert_eq!(u1.size, 6.0);
    }

    #[test]
    fn graphml_carries_weight_and_type_properties() {
        let graph = small_graph();
        let doc = graphml(&graph);
        assert!(doc.contains("attr.name=\"weight\""));
        assert!(doc.contains("attr.name=\"interaction_type\""));
        assert!(doc.contains("<data key=\"d0\">2</data>"));
        assert!(doc.contains("edgedefault=\"directed\""));
        assert_eq!(doc.matches("<node ").count(), 3);
        assert_eq!(doc.matches("<edge ").count(), 1);
    }

    #[test]
    fn artifacts_written_side_by_side() {
        let graph = small_graph();
        let data = node_link_json(&graph, &BlockAssignment::default(), 0);
        let dir = std::env::temp_dir().join(format!("murmur-artifacts-{}", std::process::id()));

        let paths =
            write_artifacts(&dir, "build-1", &graphml(&graph), &data, Some(b"<svg/>")).unwrap();
        assert!(paths.graphml.exists());
        assert!(paths.json.exists());
        assert!(paths.svg.as_ref().unwrap().exists());

        std::fs::remove_dir_all(&dir).ok();
    }
}
