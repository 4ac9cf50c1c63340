//! Road graphs and their reduction to radial trees.
//!
//! The road network handed over by a geometry provider is an arbitrary
//! undirected graph, usually with loops and disconnected fragments. The
//! [`reduce`] module turns the fragment that contains the feeder source into a
//! loop-free tree that primary lines can follow.
//!
//! ```
//! use feedgen_algo::graph::{GraphReducer, RoadGraph};
//! use feedgen_core::{GeoPoint, RoadNodeId};
//!
//! let mut roads = RoadGraph::new();
//! for (id, lon) in [(1, 0.0), (2, 0.001), (3, 0.002)] {
//!     roads.add_node(RoadNodeId::new(id), GeoPoint::new(0.0, lon).unwrap());
//! }
//! roads.add_edge(RoadNodeId::new(1), RoadNodeId::new(2), 111.0).unwrap();
//! roads.add_edge(RoadNodeId::new(2), RoadNodeId::new(3), 111.0).unwrap();
//! roads.add_edge(RoadNodeId::new(1), RoadNodeId::new(3), 250.0).unwrap();
//!
//! let tree = GraphReducer::default()
//!     .reduce(&roads, RoadNodeId::new(1), &[RoadNodeId::new(3)])
//!     .unwrap();
//! assert_eq!(tree.edges.len(), 2);
//! ```

pub mod reduce;

pub use reduce::{GraphReducer, ReduceOptions, ReducedTree, TreeEdge};

use feedgen_core::{FeederError, FeederResult, GeoPoint, RoadNodeId};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// An undirected road segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoadEdge {
    pub from: RoadNodeId,
    pub to: RoadNodeId,
    pub length_m: f64,
}

/// Road vertices keyed by provider id, plus undirected segments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoadGraph {
    nodes: BTreeMap<RoadNodeId, GeoPoint>,
    edges: Vec<RoadEdge>,
}

impl RoadGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or move a vertex.
    pub fn add_node(&mut self, id: RoadNodeId, location: GeoPoint) {
        self.nodes.insert(id, location);
    }

    /// Add a segment between two existing vertices.
    pub fn add_edge(&mut self, from: RoadNodeId, to: RoadNodeId, length_m: f64) -> FeederResult<()> {
        for id in [from, to] {
            if !self.nodes.contains_key(&id) {
                return Err(FeederError::InvalidConfiguration(format!(
                    "road edge references unknown vertex {id}"
                )));
            }
        }
        if !length_m.is_finite() || length_m < 0.0 {
            return Err(FeederError::InvalidConfiguration(format!(
                "road edge {from}-{to} has invalid length {length_m}"
            )));
        }
        self.edges.push(RoadEdge { from, to, length_m });
        Ok(())
    }

    /// Add a segment measured as the great-circle distance between its ends.
    pub fn add_measured_edge(&mut self, from: RoadNodeId, to: RoadNodeId) -> FeederResult<()> {
        let length = match (self.nodes.get(&from), self.nodes.get(&to)) {
            (Some(a), Some(b)) => a.haversine_m(b),
            _ => {
                return Err(FeederError::InvalidConfiguration(format!(
                    "road edge references unknown vertex {from} or {to}"
                )))
            }
        };
        self.add_edge(from, to, length)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn location(&self, id: RoadNodeId) -> Option<GeoPoint> {
        self.nodes.get(&id).copied()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (RoadNodeId, GeoPoint)> + '_ {
        self.nodes.iter().map(|(id, p)| (*id, *p))
    }

    pub fn edges(&self) -> &[RoadEdge] {
        &self.edges
    }

    /// Vertices connected to `source`, including `source`.
    pub fn component(&self, source: RoadNodeId) -> FeederResult<BTreeSet<RoadNodeId>> {
        if !self.nodes.contains_key(&source) {
            return Err(FeederError::InvalidConfiguration(format!(
                "source {source} is not a road vertex"
            )));
        }
        let mut adjacency: BTreeMap<RoadNodeId, Vec<RoadNodeId>> = BTreeMap::new();
        for edge in &self.edges {
            adjacency.entry(edge.from).or_default().push(edge.to);
            adjacency.entry(edge.to).or_default().push(edge.from);
        }

        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::new();
        seen.insert(source);
        queue.push_back(source);
        while let Some(current) = queue.pop_front() {
            for next in adjacency.get(&current).into_iter().flatten() {
                if seen.insert(*next) {
                    queue.push_back(*next);
                }
            }
        }
        Ok(seen)
    }
}
