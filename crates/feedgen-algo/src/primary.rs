//! Primary (medium-voltage) topology along the reduced road tree.
//!
//! The substation connects to the road vertex the tree is rooted at. Road
//! spans longer than the maximum pole span are split into equal sub-spans
//! with intermediate poles. Every transformer is then snapped to its nearest
//! primary vertex in projected coordinates, and each span's downstream
//! customers, demand and diversified kVA are computed.

use std::collections::BTreeMap;

use feedgen_core::{
    FeederError, FeederNetwork, FeederResult, GeoPoint, Kilovolts, Kilowatts, LineLevel,
    LoadId, LoadNode, Meters, Projection, TransformerId, TransformerNode, VertexKey,
};
use rstar::primitives::GeomWithData;
use rstar::RTree;
use tracing::{debug, info, warn};

use crate::capacity::{CapacityEstimator, DiversityFactor};
use crate::graph::ReducedTree;
use crate::topology::{nearest_lowest_key, TopologyLayer, VertexDemand};

/// Where a transformer attaches to the primary tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snap {
    pub vertex: VertexKey,
    /// Great-circle distance from the transformer site to the vertex
    pub distance_m: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryTopology {
    layer: TopologyLayer,
    snaps: BTreeMap<TransformerId, Snap>,
    kv: Kilovolts,
}

impl PrimaryTopology {
    /// The primary tree on its own, with unsized spans.
    pub fn network(&self) -> FeederNetwork {
        self.layer.to_network(self.kv)
    }

    pub fn layer(&self) -> &TopologyLayer {
        &self.layer
    }

    pub fn kv(&self) -> Kilovolts {
        self.kv
    }

    /// Attachment vertex of every transformer.
    pub fn transformer_vertex_map(&self) -> BTreeMap<TransformerId, VertexKey> {
        self.snaps.iter().map(|(id, snap)| (*id, snap.vertex)).collect()
    }

    pub fn snap(&self, transformer: TransformerId) -> Option<&Snap> {
        self.snaps.get(&transformer)
    }

    pub fn snaps(&self) -> &BTreeMap<TransformerId, Snap> {
        &self.snaps
    }

    pub fn longest_path_kva_meters(&self) -> f64 {
        self.layer.longest_path_kva_meters()
    }
}

pub struct PrimaryTopologyBuilder<'a, D> {
    estimator: &'a CapacityEstimator<D>,
    projection: Projection,
    kv: Kilovolts,
    max_span_m: Option<f64>,
}

impl<'a, D: DiversityFactor> PrimaryTopologyBuilder<'a, D> {
    pub fn new(estimator: &'a CapacityEstimator<D>, projection: Projection, kv: Kilovolts) -> Self {
        Self {
            estimator,
            projection,
            kv,
            max_span_m: None,
        }
    }

    /// Split road spans longer than `max_span_m` with intermediate poles.
    pub fn with_max_span(mut self, max_span_m: f64) -> Self {
        self.max_span_m = Some(max_span_m);
        self
    }

    pub fn build(
        &self,
        substation: GeoPoint,
        tree: &ReducedTree,
        transformers: &[TransformerNode],
        loads: &[LoadNode],
    ) -> FeederResult<PrimaryTopology> {
        if let Some(max) = self.max_span_m {
            if !(max > 0.0 && max.is_finite()) {
                return Err(FeederError::InvalidConfiguration(format!(
                    "maximum pole span {max} m must be positive"
                )));
            }
        }
        let root_location = tree.vertices.get(&tree.root).copied().ok_or_else(|| {
            FeederError::InconsistentTopology(format!("tree root {} has no location", tree.root))
        })?;

        let mut layer = TopologyLayer::new(LineLevel::Primary, VertexKey::Substation, substation);
        let root = VertexKey::Road(tree.root);
        layer.add_vertex(root, root_location);
        let feed_length = substation.haversine_m(&root_location);
        if feed_length == 0.0 {
            warn!("substation coincides with road vertex {}", tree.root);
        }
        layer.push_span(VertexKey::Substation, root, Meters(feed_length));

        let mut next_pole = 0usize;
        for edge in &tree.edges {
            let (Some(from), Some(to)) = (
                tree.vertices.get(&edge.parent).copied(),
                tree.vertices.get(&edge.child).copied(),
            ) else {
                return Err(FeederError::InconsistentTopology(format!(
                    "tree edge {}-{} references a vertex without location",
                    edge.parent, edge.child
                )));
            };
            let parent = VertexKey::Road(edge.parent);
            let child = VertexKey::Road(edge.child);
            let pieces = match self.max_span_m {
                Some(max) if edge.length_m > max => (edge.length_m / max).ceil() as usize,
                _ => 1,
            };

            let sub_length = Meters(edge.length_m / pieces as f64);
            let mut previous = parent;
            for piece in 1..pieces {
                let pole = VertexKey::PrimaryPole(next_pole);
                next_pole += 1;
                layer.add_vertex(pole, from.lerp(&to, piece as f64 / pieces as f64));
                layer.push_span(previous, pole, sub_length);
                previous = pole;
            }
            layer.add_vertex(child, to);
            layer.push_span(previous, child, sub_length);
        }
        if next_pole > 0 {
            debug!(poles = next_pole, "split long primary spans");
        }

        let snaps = self.snap_transformers(&layer, transformers)?;

        let kw_by_load: BTreeMap<LoadId, Kilowatts> = loads.iter().map(|l| (l.id, l.kw)).collect();
        let mut demand = VertexDemand::new();
        for transformer in transformers {
            let kw = transformer
                .loads
                .iter()
                .map(|id| {
                    kw_by_load.get(id).copied().ok_or_else(|| {
                        FeederError::InconsistentTopology(format!(
                            "{} serves unknown {id}",
                            transformer.id
                        ))
                    })
                })
                .sum::<FeederResult<Kilowatts>>()?;
            if let Some(snap) = snaps.get(&transformer.id) {
                let entry = demand.entry(snap.vertex).or_insert((0, Kilowatts(0.0)));
                entry.0 += transformer.loads.len();
                entry.1 += kw;
            }
        }
        layer.compute_downstream(&demand, self.estimator)?;

        info!(
            vertices = layer.vertices.len(),
            spans = layer.spans.len(),
            transformers = snaps.len(),
            length_m = layer.total_length().value(),
            "built primary topology"
        );

        Ok(PrimaryTopology {
            layer,
            snaps,
            kv: self.kv,
        })
    }

    fn snap_transformers(
        &self,
        layer: &TopologyLayer,
        transformers: &[TransformerNode],
    ) -> FeederResult<BTreeMap<TransformerId, Snap>> {
        let candidates: Vec<GeomWithData<[f64; 2], VertexKey>> = layer
            .vertices
            .iter()
            .filter(|(key, _)| **key != VertexKey::Substation)
            .map(|(key, location)| GeomWithData::new(self.projection.project(location), *key))
            .collect();
        let index = RTree::bulk_load(candidates);

        let mut snaps = BTreeMap::new();
        for transformer in transformers {
            let query = self.projection.project(&transformer.location);
            let vertex = nearest_lowest_key(&index, query).ok_or_else(|| {
                FeederError::InconsistentTopology(
                    "primary tree has no vertex to attach transformers to".to_string(),
                )
            })?;
            let location = layer.location(&vertex).ok_or_else(|| {
                FeederError::InconsistentTopology(format!("{vertex} has no location"))
            })?;
            let snap = Snap {
                vertex,
                distance_m: transformer.location.haversine_m(&location),
            };
            debug!(
                transformer = %transformer.id,
                vertex = %snap.vertex,
                distance_m = snap.distance_m,
                "snapped transformer"
            );
            snaps.insert(transformer.id, snap);
        }
        Ok(snaps)
    }
}
