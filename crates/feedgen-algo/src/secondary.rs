//! Secondary (low-voltage) trees, one per transformer.
//!
//! Each tree is a Prim minimum spanning tree over the transformer's LV vertex
//! and its loads, ranked by planar distance. Spans longer than the maximum
//! pole span get intermediate poles at no more than that spacing, and every
//! sub-span is re-measured on the sphere.
//!
//! Trees are independent of each other: [`SecondaryTopologyBuilder::build_all`]
//! returns one [`SecondaryTopology`] per transformer and the caller merges them.

use std::collections::BTreeMap;

use feedgen_core::{
    planar_distance, FeederError, FeederResult, GeoPoint, LineLevel, LoadId, LoadNode, Meters,
    PlanarPoint, Projection, TransformerId, TransformerNode, VertexKey,
};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::capacity::{CapacityEstimator, DiversityFactor};
use crate::topology::{TopologyLayer, VertexDemand};

#[derive(Debug, Clone, PartialEq)]
pub struct SecondaryTopology {
    transformer: TransformerId,
    layer: TopologyLayer,
    load_vertices: BTreeMap<LoadId, VertexKey>,
}

impl SecondaryTopology {
    pub fn transformer(&self) -> TransformerId {
        self.transformer
    }

    pub fn layer(&self) -> &TopologyLayer {
        &self.layer
    }

    pub fn load_vertex_map(&self) -> &BTreeMap<LoadId, VertexKey> {
        &self.load_vertices
    }

    pub fn longest_path_kva_meters(&self) -> f64 {
        self.layer.longest_path_kva_meters()
    }

    pub fn pole_count(&self) -> usize {
        self.layer
            .vertices
            .keys()
            .filter(|k| matches!(k, VertexKey::SecondaryPole { .. }))
            .count()
    }
}

pub struct SecondaryTopologyBuilder<'a, D> {
    estimator: &'a CapacityEstimator<D>,
    projection: Projection,
    max_span_m: f64,
}

impl<'a, D: DiversityFactor> SecondaryTopologyBuilder<'a, D> {
    pub fn new(
        estimator: &'a CapacityEstimator<D>,
        projection: Projection,
        max_span_m: f64,
    ) -> FeederResult<Self> {
        if !(max_span_m > 0.0 && max_span_m.is_finite()) {
            return Err(FeederError::InvalidConfiguration(format!(
                "maximum pole span {max_span_m} m must be positive"
            )));
        }
        Ok(Self {
            estimator,
            projection,
            max_span_m,
        })
    }

    /// Build the tree for one transformer whose LV vertex sits at `site`.
    pub fn build(
        &self,
        transformer: &TransformerNode,
        site: GeoPoint,
        loads: &BTreeMap<LoadId, &LoadNode>,
    ) -> FeederResult<SecondaryTopology> {
        let members = transformer
            .loads
            .iter()
            .map(|id| {
                loads.get(id).copied().ok_or_else(|| {
                    FeederError::InconsistentTopology(format!(
                        "{} serves unknown {id}",
                        transformer.id
                    ))
                })
            })
            .collect::<FeederResult<Vec<&LoadNode>>>()?;

        let root = VertexKey::Transformer(transformer.id);
        let mut keys = Vec::with_capacity(members.len() + 1);
        let mut locations = Vec::with_capacity(members.len() + 1);
        keys.push(root);
        locations.push(site);
        for load in &members {
            keys.push(VertexKey::Load(load.id));
            locations.push(load.location);
        }
        let planar: Vec<PlanarPoint> = locations.iter().map(|p| self.projection.project(p)).collect();

        let mut layer = TopologyLayer::new(LineLevel::Secondary, root, site);
        let mut next_pole = 0usize;
        for (parent, child) in prim_order(&planar) {
            let from = locations[parent];
            let to = locations[child];
            let length = from.haversine_m(&to);
            if length == 0.0 {
                warn!(vertex = %keys[child], "load coincides with its parent vertex");
            }

            let mut previous = keys[parent];
            let waypoints = self.split(&from, &to, length);
            for waypoint in &waypoints {
                let pole = VertexKey::SecondaryPole {
                    transformer: transformer.id,
                    index: next_pole,
                };
                next_pole += 1;
                layer.add_vertex(pole, *waypoint);
                let start = layer.location(&previous).unwrap_or(from);
                layer.push_span(previous, pole, Meters(start.haversine_m(waypoint)));
                previous = pole;
            }
            let start = layer.location(&previous).unwrap_or(from);
            layer.add_vertex(keys[child], to);
            layer.push_span(previous, keys[child], Meters(start.haversine_m(&to)));
        }

        let demand: VertexDemand = members
            .iter()
            .map(|l| (VertexKey::Load(l.id), (1, l.kw)))
            .collect();
        layer.compute_downstream(&demand, self.estimator)?;

        let load_vertices = members
            .iter()
            .map(|l| (l.id, VertexKey::Load(l.id)))
            .collect();
        debug!(
            transformer = %transformer.id,
            loads = members.len(),
            poles = next_pole,
            length_m = layer.total_length().value(),
            "built secondary tree"
        );
        Ok(SecondaryTopology {
            transformer: transformer.id,
            layer,
            load_vertices,
        })
    }

    /// Build every transformer's tree. `sites` gives each LV vertex location.
    pub fn build_all(
        &self,
        transformers: &[TransformerNode],
        sites: &BTreeMap<TransformerId, GeoPoint>,
        loads: &[LoadNode],
    ) -> FeederResult<Vec<SecondaryTopology>> {
        let by_id: BTreeMap<LoadId, &LoadNode> = loads.iter().map(|l| (l.id, l)).collect();
        let build_one = |transformer: &TransformerNode| {
            let site = sites.get(&transformer.id).copied().ok_or_else(|| {
                FeederError::InconsistentTopology(format!(
                    "{} has no attachment site",
                    transformer.id
                ))
            })?;
            self.build(transformer, site, &by_id)
        };

        #[cfg(feature = "parallel")]
        let topologies: FeederResult<Vec<SecondaryTopology>> =
            transformers.par_iter().map(build_one).collect();
        #[cfg(not(feature = "parallel"))]
        let topologies: FeederResult<Vec<SecondaryTopology>> =
            transformers.iter().map(build_one).collect();

        let topologies = topologies?;
        info!(
            trees = topologies.len(),
            poles = topologies.iter().map(|t| t.pole_count()).sum::<usize>(),
            "built secondary topologies"
        );
        Ok(topologies)
    }

    /// Intermediate pole positions so that no sub-span exceeds the maximum.
    fn split(&self, from: &GeoPoint, to: &GeoPoint, length: f64) -> Vec<GeoPoint> {
        if length <= self.max_span_m {
            return Vec::new();
        }
        let mut pieces = (length / self.max_span_m).ceil() as usize;
        loop {
            let stops: Vec<GeoPoint> = (0..=pieces)
                .map(|i| from.lerp(to, i as f64 / pieces as f64))
                .collect();
            let fits = stops
                .windows(2)
                .all(|w| w[0].haversine_m(&w[1]) <= self.max_span_m);
            if fits {
                return stops[1..pieces].to_vec();
            }
            pieces += 1;
        }
    }
}

/// Prim's algorithm from point 0. Returns `(parent, child)` pairs in the order
/// vertices join the tree; ties go to the lowest index.
fn prim_order(points: &[PlanarPoint]) -> Vec<(usize, usize)> {
    let n = points.len();
    let mut in_tree = vec![false; n];
    let mut best = vec![f64::INFINITY; n];
    let mut parent = vec![0usize; n];
    let mut order = Vec::with_capacity(n.saturating_sub(1));
    if n == 0 {
        return order;
    }

    in_tree[0] = true;
    for j in 1..n {
        best[j] = planar_distance(&points[0], &points[j]);
    }
    for _ in 1..n {
        let mut next = None;
        for j in 0..n {
            if in_tree[j] {
                continue;
            }
            match next {
                Some(current) if best[j] >= best[current] => {}
                _ => next = Some(j),
            }
        }
        let Some(joined) = next else {
            break;
        };
        in_tree[joined] = true;
        order.push((parent[joined], joined));
        for k in 0..n {
            if in_tree[k] {
                continue;
            }
            let d = planar_distance(&points[joined], &points[k]);
            if d < best[k] {
                best[k] = d;
                parent[k] = joined;
            }
        }
    }
    order
}
