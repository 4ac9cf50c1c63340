//! Keyed tree layers produced by the primary and secondary builders.
//!
//! A layer is a rooted tree over [`VertexKey`]s. It never refers to dense
//! [`feedgen_core::VertexId`]s, so layers can be built independently (and in
//! parallel) and merged by the assembler afterwards.

use std::collections::BTreeMap;

use feedgen_core::{
    Edge, FeederNetwork, FeederResult, GeoPoint, Kilovolts, KilovoltAmperes, Kilowatts,
    LineLevel, LineSection, Meters, SectionId, VertexId, VertexKey,
};

use rstar::primitives::GeomWithData;
use rstar::RTree;

use crate::capacity::{CapacityEstimator, DiversityFactor};

/// A parent → child span with its downstream loading.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub parent: VertexKey,
    pub child: VertexKey,
    pub length: Meters,
    /// Customers served through this span
    pub customers: usize,
    /// Sum of non-coincident peak demand served through this span
    pub downstream_kw: Kilowatts,
    /// Diversified, grown kVA served through this span
    pub downstream_kva: KilovoltAmperes,
}

/// Demand attached directly at a vertex: `(customers, kW)`.
pub type VertexDemand = BTreeMap<VertexKey, (usize, Kilowatts)>;

#[derive(Debug, Clone, PartialEq)]
pub struct TopologyLayer {
    pub level: LineLevel,
    pub root: VertexKey,
    pub vertices: BTreeMap<VertexKey, GeoPoint>,
    /// Parents always precede their children
    pub spans: Vec<Span>,
}

impl TopologyLayer {
    pub fn new(level: LineLevel, root: VertexKey, location: GeoPoint) -> Self {
        Self {
            level,
            root,
            vertices: BTreeMap::from([(root, location)]),
            spans: Vec::new(),
        }
    }

    pub fn add_vertex(&mut self, key: VertexKey, location: GeoPoint) {
        self.vertices.insert(key, location);
    }

    /// Append a span whose parent is already in the layer.
    pub fn push_span(&mut self, parent: VertexKey, child: VertexKey, length: Meters) {
        self.spans.push(Span {
            parent,
            child,
            length,
            customers: 0,
            downstream_kw: Kilowatts(0.0),
            downstream_kva: KilovoltAmperes(0.0),
        });
    }

    pub fn location(&self, key: &VertexKey) -> Option<GeoPoint> {
        self.vertices.get(key).copied()
    }

    pub fn parent_of(&self, key: &VertexKey) -> Option<VertexKey> {
        self.spans
            .iter()
            .find(|s| &s.child == key)
            .map(|s| s.parent)
    }

    pub fn total_length(&self) -> Meters {
        self.spans.iter().map(|s| s.length).sum()
    }

    /// Fill in per-span customers, kW and kVA from demand attached at vertices.
    pub fn compute_downstream<D: DiversityFactor>(
        &mut self,
        demand: &VertexDemand,
        estimator: &CapacityEstimator<D>,
    ) -> FeederResult<()> {
        let mut totals = demand.clone();
        // Reverse order visits every descendant span before its ancestors
        for span in self.spans.iter_mut().rev() {
            let (customers, kw) = totals
                .get(&span.child)
                .copied()
                .unwrap_or((0, Kilowatts(0.0)));
            span.customers = customers;
            span.downstream_kw = kw;
            let parent = totals.entry(span.parent).or_insert((0, Kilowatts(0.0)));
            parent.0 += customers;
            parent.1 += kw;
        }
        for span in &mut self.spans {
            span.downstream_kva = if span.customers == 0 {
                KilovoltAmperes(0.0)
            } else {
                estimator.estimate(span.customers, span.downstream_kw)?.required
            };
        }
        Ok(())
    }

    /// Maximum over root-to-leaf paths of Σ(length × downstream kVA), in kVA·m.
    pub fn longest_path_kva_meters(&self) -> f64 {
        let mut accumulated: BTreeMap<VertexKey, f64> = BTreeMap::from([(self.root, 0.0)]);
        let mut longest: f64 = 0.0;
        for span in &self.spans {
            let base = accumulated.get(&span.parent).copied().unwrap_or(0.0);
            let total = base + span.length.value() * span.downstream_kva.value();
            longest = longest.max(total);
            accumulated.insert(span.child, total);
        }
        longest
    }

    /// This layer alone as a network of unsized spans.
    pub fn to_network(&self, kv: Kilovolts) -> FeederNetwork {
        let mut network = FeederNetwork::new();
        let mut ids: BTreeMap<VertexKey, VertexId> = BTreeMap::new();
        if let Some(location) = self.location(&self.root) {
            ids.insert(self.root, network.add_vertex(self.root, location, kv));
        }
        for (index, span) in self.spans.iter().enumerate() {
            let (Some(&parent), Some(location)) = (ids.get(&span.parent), self.location(&span.child))
            else {
                continue;
            };
            let child = network.add_vertex(span.child, location, kv);
            ids.insert(span.child, child);
            let mut section =
                LineSection::unsized_span(SectionId::new(index), parent, child, self.level, span.length);
            section.customers = span.customers;
            section.downstream_kva = span.downstream_kva;
            network.add_edge(parent, child, Edge::Line(section));
        }
        network
    }
}

/// Nearest indexed item to `query`; equidistant items resolve to the lowest key.
pub(crate) fn nearest_lowest_key<T: Ord + Copy>(
    index: &RTree<GeomWithData<[f64; 2], T>>,
    query: [f64; 2],
) -> Option<T> {
    let mut candidates = index.nearest_neighbor_iter_with_distance_2(&query);
    let (first, best) = candidates.next()?;
    let tolerance = best.max(1.0) * 1e-12;
    let mut key = first.data;
    for (candidate, distance_2) in candidates {
        if distance_2 - best > tolerance {
            break;
        }
        key = key.min(candidate.data);
    }
    Some(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::DiversityModel;
    use feedgen_core::{check_radial, DesignFactors, LoadId};

    fn point(lon: f64) -> GeoPoint {
        GeoPoint::new(0.0, lon).unwrap()
    }

    fn unity() -> CapacityEstimator<DiversityModel> {
        let factors = DesignFactors {
            adjustment_factor: 1.0,
            planned_growth_pct: 0.0,
            actual_growth_pct: 0.0,
            power_factor: 1.0,
            ..DesignFactors::default()
        };
        CapacityEstimator::new(DiversityModel::Unity, factors).unwrap()
    }

    /// root ─100─ a ─50─ load:0
    ///              └─20─ load:1
    fn layer() -> TopologyLayer {
        let root = VertexKey::Substation;
        let a = VertexKey::PrimaryPole(0);
        let l0 = VertexKey::Load(LoadId::new(0));
        let l1 = VertexKey::Load(LoadId::new(1));
        let mut layer = TopologyLayer::new(LineLevel::Primary, root, point(0.0));
        layer.add_vertex(a, point(0.001));
        layer.add_vertex(l0, point(0.002));
        layer.add_vertex(l1, point(0.0015));
        layer.push_span(root, a, Meters(100.0));
        layer.push_span(a, l0, Meters(50.0));
        layer.push_span(a, l1, Meters(20.0));
        layer
    }

    #[test]
    fn test_downstream_totals() {
        let mut layer = layer();
        let demand = VertexDemand::from([
            (VertexKey::Load(LoadId::new(0)), (1, Kilowatts(10.0))),
            (VertexKey::Load(LoadId::new(1)), (1, Kilowatts(5.0))),
        ]);
        layer.compute_downstream(&demand, &unity()).unwrap();
        assert_eq!(layer.spans[0].customers, 2);
        assert_eq!(layer.spans[0].downstream_kw, Kilowatts(15.0));
        assert!((layer.spans[0].downstream_kva.value() - 15.0).abs() < 1e-9);
        assert_eq!(layer.spans[1].customers, 1);
        assert!((layer.spans[2].downstream_kva.value() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_longest_path_kva_meters() {
        let mut layer = layer();
        let demand = VertexDemand::from([
            (VertexKey::Load(LoadId::new(0)), (1, Kilowatts(10.0))),
            (VertexKey::Load(LoadId::new(1)), (1, Kilowatts(5.0))),
        ]);
        layer.compute_downstream(&demand, &unity()).unwrap();
        // 100 × 15 + 50 × 10 beats 100 × 15 + 20 × 5
        assert!((layer.longest_path_kva_meters() - 2000.0).abs() < 1e-6);
    }

    #[test]
    fn test_unloaded_layer_has_zero_metric() {
        let mut layer = layer();
        layer
            .compute_downstream(&VertexDemand::new(), &unity())
            .unwrap();
        assert_eq!(layer.longest_path_kva_meters(), 0.0);
        assert!(layer.spans.iter().all(|s| s.downstream_kva.value() == 0.0));
    }

    #[test]
    fn test_to_network_is_radial() {
        let layer = layer();
        let network = layer.to_network(Kilovolts(11.0));
        assert_eq!(network.vertex_count(), 4);
        assert_eq!(network.edge_count(), 3);
        assert_eq!(check_radial(&network).unwrap(), VertexId::new(0));
        assert_eq!(layer.parent_of(&VertexKey::Load(LoadId::new(1))), Some(VertexKey::PrimaryPole(0)));
        assert_eq!(layer.total_length(), Meters(170.0));
    }

    #[test]
    fn test_nearest_lowest_key_breaks_ties() {
        let index = RTree::bulk_load(vec![
            GeomWithData::new([1.0, 0.0], 7_usize),
            GeomWithData::new([-1.0, 0.0], 3),
            GeomWithData::new([0.0, 1.0], 5),
            GeomWithData::new([4.0, 4.0], 1),
        ]);
        assert_eq!(nearest_lowest_key(&index, [0.0, 0.0]), Some(3));
        assert_eq!(nearest_lowest_key(&index, [0.9, 0.0]), Some(7));
        assert_eq!(nearest_lowest_key(&index, [3.0, 3.5]), Some(1));

        let empty: RTree<GeomWithData<[f64; 2], usize>> = RTree::new();
        assert_eq!(nearest_lowest_key(&empty, [0.0, 0.0]), None);
    }
}
