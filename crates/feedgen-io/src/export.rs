//! JSON export of a synthesized feeder.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use feedgen_algo::SynthesizedFeeder;
use feedgen_core::{
    Diagnostics, Edge, FeederStats, LoadId, LoadNode, NetworkVertex, TransformerId,
    TransformerNode, VertexId,
};
use serde::Serialize;
use tracing::info;

/// Flat, self-describing view of a feeder.
///
/// Vertices are listed in id order and edges in insertion order, so two runs
/// over identical inputs produce byte-identical files.
#[derive(Debug, Clone, Serialize)]
pub struct TopologyDocument {
    pub root: VertexId,
    pub stats: FeederStats,
    pub vertices: Vec<NetworkVertex>,
    pub edges: Vec<Edge>,
    pub transformers: Vec<TransformerNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub substation_transformer: Option<TransformerNode>,
    pub loads: Vec<LoadNode>,
    pub transformer_vertices: BTreeMap<TransformerId, VertexId>,
    pub load_vertices: BTreeMap<LoadId, VertexId>,
    pub diagnostics: Diagnostics,
}

impl TopologyDocument {
    pub fn from_feeder(feeder: &SynthesizedFeeder) -> Self {
        let network = feeder.network();
        Self {
            root: feeder.root(),
            stats: feeder.stats(),
            vertices: network.vertices().cloned().collect(),
            edges: network.graph.edge_weights().cloned().collect(),
            transformers: feeder.transformers().to_vec(),
            substation_transformer: feeder.substation_transformer().cloned(),
            loads: feeder.loads().to_vec(),
            transformer_vertices: feeder.transformer_vertex_map().clone(),
            load_vertices: feeder.load_vertex_map().clone(),
            diagnostics: feeder.diagnostics.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serializing topology")
    }
}

/// Write `feeder` as pretty-printed JSON, creating parent directories.
pub fn write_topology_json(path: impl AsRef<Path>, feeder: &SynthesizedFeeder) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory '{}'", parent.display()))?;
    }
    let document = TopologyDocument::from_feeder(feeder);
    let file =
        File::create(path).with_context(|| format!("creating topology file '{}'", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &document)
        .with_context(|| format!("writing topology '{}'", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("flushing topology '{}'", path.display()))?;
    info!(
        path = %path.display(),
        vertices = document.vertices.len(),
        edges = document.edges.len(),
        "wrote topology"
    );
    Ok(())
}
