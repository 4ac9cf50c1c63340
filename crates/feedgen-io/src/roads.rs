//! Road graphs from JSON.
//!
//! ```json
//! {
//!   "nodes": [{"id": 1, "latitude": 12.97, "longitude": 77.59}],
//!   "edges": [{"from": 1, "to": 2, "length_m": 84.2}]
//! }
//! ```
//!
//! `length_m` is optional; missing lengths are measured as the great-circle
//! distance between the two ends.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use feedgen_algo::RoadGraph;
use feedgen_core::{category, Diagnostics, GeoPoint, RoadNodeId};
use serde::Deserialize;
use tracing::info;

use crate::Imported;

#[derive(Debug, Deserialize)]
struct RoadDocument {
    nodes: Vec<RoadNodeRow>,
    #[serde(default)]
    edges: Vec<RoadEdgeRow>,
}

#[derive(Debug, Deserialize)]
struct RoadNodeRow {
    id: u64,
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct RoadEdgeRow {
    from: u64,
    to: u64,
    #[serde(default)]
    length_m: Option<f64>,
}

pub fn read_road_graph(path: impl AsRef<Path>) -> Result<Imported<RoadGraph>> {
    let path = path.as_ref();
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading road graph '{}'", path.display()))?;
    let imported =
        parse_road_graph(&data).with_context(|| format!("parsing road graph '{}'", path.display()))?;
    info!(
        path = %path.display(),
        nodes = imported.value.node_count(),
        edges = imported.value.edge_count(),
        "read road graph"
    );
    Ok(imported)
}

pub fn parse_road_graph(data: &str) -> Result<Imported<RoadGraph>> {
    let document: RoadDocument = serde_json::from_str(data).context("road graph json")?;
    let mut diagnostics = Diagnostics::new();
    let mut roads = RoadGraph::new();

    let mut seen = BTreeSet::new();
    for node in &document.nodes {
        let id = RoadNodeId::new(node.id);
        let location = GeoPoint::new(node.latitude, node.longitude)
            .map_err(|e| anyhow!("road vertex {}: {e}", node.id))?;
        if !seen.insert(node.id) {
            diagnostics.add_warning_with_entity(
                category::INPUT,
                "duplicate road vertex, keeping the last location",
                &id.to_string(),
            );
        }
        roads.add_node(id, location);
    }

    for (index, edge) in document.edges.iter().enumerate() {
        let (from, to) = (RoadNodeId::new(edge.from), RoadNodeId::new(edge.to));
        if from == to {
            diagnostics.add_warning_with_entity(
                category::INPUT,
                "self-loop road edge ignored",
                &format!("edge {index}"),
            );
            continue;
        }
        let added = match edge.length_m {
            Some(length) => roads.add_edge(from, to, length),
            None => roads.add_measured_edge(from, to),
        };
        added.map_err(|e| anyhow!("edge {index} ({}-{}): {e}", edge.from, edge.to))?;
    }

    if roads.edge_count() == 0 {
        diagnostics.add_warning(category::INPUT, "road graph has no edges");
    }
    Ok(Imported::new(roads, diagnostics))
}
