//! Loop removal: road graph → rooted spanning tree.
//!
//! # Algorithm
//!
//! 1. Breadth-first search from the source restricts the graph to the
//!    source's connected component. A terminal outside it is an error.
//! 2. Kruskal's minimum spanning tree over segment length, with ties broken
//!    by `(min id, max id)` so the result does not depend on input order.
//!    Self-loops are skipped; of parallel segments only the shortest survives.
//! 3. Optional clean-up: prune dead-end branches that serve no terminal and
//!    collapse straight pass-through vertices.
//! 4. Orient every edge away from the source in breadth-first order and record
//!    the cumulative distance from the source.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use feedgen_core::{
    FeederError, FeederResult, GeoPoint, Projection, ProjectionKind, RoadNodeId,
};
use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::RoadGraph;

/// Optional tree clean-up steps. Both are off by default, in which case a
/// connected input with V vertices reduces to exactly V − 1 edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReduceOptions {
    /// Remove branches that end without reaching a terminal
    pub prune_dead_ends: bool,
    /// Merge degree-2 vertices whose two segments are nearly straight
    pub collapse_pass_through: bool,
    /// Maximum bend (degrees) for a vertex to count as straight
    pub collinear_tolerance_deg: f64,
}

impl Default for ReduceOptions {
    fn default() -> Self {
        Self {
            prune_dead_ends: false,
            collapse_pass_through: false,
            collinear_tolerance_deg: 5.0,
        }
    }
}

/// A tree edge oriented away from the root.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeEdge {
    pub parent: RoadNodeId,
    pub child: RoadNodeId,
    pub length_m: f64,
    /// Path length from the root to `child`
    pub distance_from_root_m: f64,
}

/// Output of [`GraphReducer::reduce`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReducedTree {
    pub root: RoadNodeId,
    pub vertices: BTreeMap<RoadNodeId, GeoPoint>,
    /// Parent → child edges in breadth-first order
    pub edges: Vec<TreeEdge>,
}

impl ReducedTree {
    pub fn total_length_m(&self) -> f64 {
        self.edges.iter().map(|e| e.length_m).sum()
    }

    /// Vertices with no children.
    pub fn leaves(&self) -> Vec<RoadNodeId> {
        let parents: BTreeSet<RoadNodeId> = self.edges.iter().map(|e| e.parent).collect();
        self.vertices
            .keys()
            .filter(|v| !parents.contains(v))
            .copied()
            .collect()
    }

    pub fn parent_of(&self, vertex: RoadNodeId) -> Option<RoadNodeId> {
        self.edges
            .iter()
            .find(|e| e.child == vertex)
            .map(|e| e.parent)
    }
}

#[derive(Debug, Clone, Default)]
pub struct GraphReducer {
    options: ReduceOptions,
}

type Adjacency = BTreeMap<RoadNodeId, BTreeMap<RoadNodeId, f64>>;

impl GraphReducer {
    pub fn new(options: ReduceOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ReduceOptions {
        &self.options
    }

    /// Reduce `graph` to a tree rooted at `source` that keeps every terminal.
    pub fn reduce(
        &self,
        graph: &RoadGraph,
        source: RoadNodeId,
        terminals: &[RoadNodeId],
    ) -> FeederResult<ReducedTree> {
        let component = graph.component(source)?;
        for terminal in terminals {
            if !component.contains(terminal) {
                return Err(FeederError::UnreachableTerminal {
                    terminal: terminal.to_string(),
                    origin: source.to_string(),
                });
            }
        }

        let mut adjacency = minimum_spanning_tree(graph, &component);
        let terminal_set: BTreeSet<RoadNodeId> = terminals.iter().copied().collect();

        if self.options.prune_dead_ends {
            let removed = prune_dead_ends(&mut adjacency, source, &terminal_set);
            debug!(removed, "pruned dead-end road vertices");
        }
        if self.options.collapse_pass_through {
            let projection = Projection::new(
                ProjectionKind::LocalPlanar,
                graph
                    .location(source)
                    .ok_or_else(|| FeederError::from("source has no location"))?,
            );
            let collapsed = collapse_pass_through(
                &mut adjacency,
                graph,
                &projection,
                source,
                &terminal_set,
                self.options.collinear_tolerance_deg,
            );
            debug!(collapsed, "collapsed pass-through road vertices");
        }

        let tree = orient(graph, &adjacency, source);
        info!(
            component = component.len(),
            vertices = tree.vertices.len(),
            edges = tree.edges.len(),
            "reduced road graph"
        );
        Ok(tree)
    }
}

fn minimum_spanning_tree(graph: &RoadGraph, component: &BTreeSet<RoadNodeId>) -> Adjacency {
    let index: BTreeMap<RoadNodeId, usize> = component
        .iter()
        .enumerate()
        .map(|(i, id)| (*id, i))
        .collect();

    let mut candidates: Vec<(f64, RoadNodeId, RoadNodeId)> = graph
        .edges()
        .iter()
        .filter(|e| e.from != e.to && index.contains_key(&e.from) && index.contains_key(&e.to))
        .map(|e| (e.length_m, e.from.min(e.to), e.from.max(e.to)))
        .collect();
    candidates.sort_by(|a, b| {
        a.0.total_cmp(&b.0)
            .then_with(|| a.1.cmp(&b.1))
            .then_with(|| a.2.cmp(&b.2))
    });

    let mut sets = UnionFind::<usize>::new(component.len());
    let mut adjacency: Adjacency = component.iter().map(|id| (*id, BTreeMap::new())).collect();
    for (length, u, v) in candidates {
        if sets.union(index[&u], index[&v]) {
            if let Some(n) = adjacency.get_mut(&u) {
                n.insert(v, length);
            }
            if let Some(n) = adjacency.get_mut(&v) {
                n.insert(u, length);
            }
        }
    }
    adjacency
}

fn remove_vertex(adjacency: &mut Adjacency, vertex: RoadNodeId) {
    if let Some(neighbors) = adjacency.remove(&vertex) {
        for neighbor in neighbors.keys() {
            if let Some(n) = adjacency.get_mut(neighbor) {
                n.remove(&vertex);
            }
        }
    }
}

fn prune_dead_ends(
    adjacency: &mut Adjacency,
    source: RoadNodeId,
    terminals: &BTreeSet<RoadNodeId>,
) -> usize {
    let is_prunable = |adj: &Adjacency, v: &RoadNodeId| {
        *v != source && !terminals.contains(v) && adj.get(v).map_or(false, |n| n.len() <= 1)
    };
    let mut queue: VecDeque<RoadNodeId> = adjacency
        .keys()
        .filter(|v| is_prunable(adjacency, v))
        .copied()
        .collect();

    let mut removed = 0;
    while let Some(vertex) = queue.pop_front() {
        if !is_prunable(adjacency, &vertex) {
            continue;
        }
        let neighbor = adjacency
            .get(&vertex)
            .and_then(|n| n.keys().next().copied());
        remove_vertex(adjacency, vertex);
        removed += 1;
        if let Some(neighbor) = neighbor {
            if is_prunable(adjacency, &neighbor) {
                queue.push_back(neighbor);
            }
        }
    }
    removed
}

fn collapse_pass_through(
    adjacency: &mut Adjacency,
    graph: &RoadGraph,
    projection: &Projection,
    source: RoadNodeId,
    terminals: &BTreeSet<RoadNodeId>,
    tolerance_deg: f64,
) -> usize {
    let planar = |id: RoadNodeId| graph.location(id).map(|p| projection.project(&p));
    let candidates: Vec<RoadNodeId> = adjacency.keys().copied().collect();

    let mut collapsed = 0;
    for vertex in candidates {
        if vertex == source || terminals.contains(&vertex) {
            continue;
        }
        let Some(neighbors) = adjacency.get(&vertex) else {
            continue;
        };
        if neighbors.len() != 2 {
            continue;
        }
        let mut ends = neighbors.iter().map(|(id, len)| (*id, *len));
        let (Some((a, len_a)), Some((b, len_b))) = (ends.next(), ends.next()) else {
            continue;
        };
        let (Some(pa), Some(pv), Some(pb)) = (planar(a), planar(vertex), planar(b)) else {
            continue;
        };

        let incoming = [pv[0] - pa[0], pv[1] - pa[1]];
        let outgoing = [pb[0] - pv[0], pb[1] - pv[1]];
        let norm = (incoming[0].hypot(incoming[1])) * (outgoing[0].hypot(outgoing[1]));
        if norm <= 0.0 {
            continue;
        }
        let cos = ((incoming[0] * outgoing[0] + incoming[1] * outgoing[1]) / norm).clamp(-1.0, 1.0);
        if cos.acos().to_degrees() > tolerance_deg {
            continue;
        }

        remove_vertex(adjacency, vertex);
        let merged = len_a + len_b;
        if let Some(n) = adjacency.get_mut(&a) {
            n.insert(b, merged);
        }
        if let Some(n) = adjacency.get_mut(&b) {
            n.insert(a, merged);
        }
        collapsed += 1;
    }
    collapsed
}

fn orient(graph: &RoadGraph, adjacency: &Adjacency, source: RoadNodeId) -> ReducedTree {
    let mut vertices = BTreeMap::new();
    let mut edges = Vec::new();
    let mut distance: BTreeMap<RoadNodeId, f64> = BTreeMap::new();
    let mut queue = VecDeque::new();

    if let Some(location) = graph.location(source) {
        vertices.insert(source, location);
    }
    distance.insert(source, 0.0);
    queue.push_back(source);

    while let Some(parent) = queue.pop_front() {
        let base = distance.get(&parent).copied().unwrap_or(0.0);
        for (child, length) in adjacency.get(&parent).into_iter().flatten() {
            if distance.contains_key(child) {
                continue;
            }
            let total = base + length;
            distance.insert(*child, total);
            if let Some(location) = graph.location(*child) {
                vertices.insert(*child, location);
            }
            edges.push(TreeEdge {
                parent,
                child: *child,
                length_m: *length,
                distance_from_root_m: total,
            });
            queue.push_back(*child);
        }
    }

    ReducedTree {
        root: source,
        vertices,
        edges,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(v: u64) -> RoadNodeId {
        RoadNodeId::new(v)
    }

    /// 3×3 grid with 100 m spacing; ids 1..=9 row-major.
    fn grid() -> RoadGraph {
        let mut roads = RoadGraph::new();
        for r in 0..3u64 {
            for c in 0..3u64 {
                roads.add_node(
                    id(r * 3 + c + 1),
                    GeoPoint::new(r as f64 * 0.0009, c as f64 * 0.0009).unwrap(),
                );
            }
        }
        for r in 0..3u64 {
            for c in 0..3u64 {
                let v = r * 3 + c + 1;
                if c < 2 {
                    roads.add_edge(id(v), id(v + 1), 100.0).unwrap();
                }
                if r < 2 {
                    roads.add_edge(id(v), id(v + 3), 100.0).unwrap();
                }
            }
        }
        roads
    }

    #[test]
    fn test_spanning_tree_has_v_minus_one_edges() {
        let roads = grid();
        let tree = GraphReducer::default().reduce(&roads, id(1), &[]).unwrap();
        assert_eq!(tree.vertices.len(), 9);
        assert_eq!(tree.edges.len(), 8);
        assert!((tree.total_length_m() - 800.0).abs() < 1e-9);

        // Every non-root vertex appears exactly once as a child
        let children: BTreeSet<RoadNodeId> = tree.edges.iter().map(|e| e.child).collect();
        assert_eq!(children.len(), 8);
        assert!(!children.contains(&id(1)));
    }

    #[test]
    fn test_edges_are_breadth_first_with_cumulative_distance() {
        let roads = grid();
        let tree = GraphReducer::default().reduce(&roads, id(5), &[]).unwrap();
        let mut seen = BTreeSet::from([id(5)]);
        for edge in &tree.edges {
            assert!(seen.contains(&edge.parent));
            seen.insert(edge.child);
            let parent_distance = tree
                .edges
                .iter()
                .find(|e| e.child == edge.parent)
                .map_or(0.0, |e| e.distance_from_root_m);
            assert!((edge.distance_from_root_m - parent_distance - edge.length_m).abs() < 1e-9);
        }
    }

    #[test]
    fn test_deterministic_tie_breaking() {
        let roads = grid();
        let a = GraphReducer::default().reduce(&roads, id(1), &[]).unwrap();

        let mut shuffled = RoadGraph::new();
        for (node, p) in roads.nodes() {
            shuffled.add_node(node, p);
        }
        for edge in roads.edges().iter().rev() {
            shuffled.add_edge(edge.to, edge.from, edge.length_m).unwrap();
        }
        let b = GraphReducer::default().reduce(&shuffled, id(1), &[]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_parallel_edges_and_self_loops() {
        let mut roads = RoadGraph::new();
        roads.add_node(id(1), GeoPoint::new(0.0, 0.0).unwrap());
        roads.add_node(id(2), GeoPoint::new(0.0, 0.001).unwrap());
        roads.add_edge(id(1), id(1), 0.0).unwrap();
        roads.add_edge(id(1), id(2), 300.0).unwrap();
        roads.add_edge(id(2), id(1), 120.0).unwrap();
        let tree = GraphReducer::default().reduce(&roads, id(1), &[id(2)]).unwrap();
        assert_eq!(tree.edges.len(), 1);
        assert_eq!(tree.edges[0].length_m, 120.0);
    }

    #[test]
    fn test_unreachable_terminal() {
        let mut roads = grid();
        roads.add_node(id(42), GeoPoint::new(1.0, 1.0).unwrap());
        let err = GraphReducer::default()
            .reduce(&roads, id(1), &[id(9), id(42)])
            .unwrap_err();
        assert!(matches!(err, FeederError::UnreachableTerminal { .. }));
        assert!(err.to_string().contains("road:42"));

        let missing = GraphReducer::default().reduce(&roads, id(1), &[id(77)]);
        assert!(matches!(missing, Err(FeederError::UnreachableTerminal { .. })));
    }

    #[test]
    fn test_unknown_source() {
        let roads = grid();
        assert!(matches!(
            GraphReducer::default().reduce(&roads, id(100), &[]),
            Err(FeederError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_disconnected_fragment_is_dropped() {
        let mut roads = grid();
        roads.add_node(id(50), GeoPoint::new(1.0, 1.0).unwrap());
        roads.add_node(id(51), GeoPoint::new(1.0, 1.001).unwrap());
        roads.add_edge(id(50), id(51), 100.0).unwrap();
        let tree = GraphReducer::default().reduce(&roads, id(1), &[]).unwrap();
        assert_eq!(tree.vertices.len(), 9);
        assert!(!tree.vertices.contains_key(&id(50)));
    }

    #[test]
    fn test_prune_keeps_terminal_paths() {
        let roads = grid();
        let reducer = GraphReducer::new(ReduceOptions {
            prune_dead_ends: true,
            ..ReduceOptions::default()
        });
        let tree = reducer.reduce(&roads, id(1), &[id(3)]).unwrap();
        // Only the path 1-2-3 serves the terminal
        assert_eq!(tree.vertices.len(), 3);
        assert_eq!(tree.edges.len(), 2);
        assert!(tree.vertices.contains_key(&id(3)));
        assert_eq!(tree.leaves(), vec![id(3)]);
    }

    #[test]
    fn test_collapse_straight_vertices() {
        let mut roads = RoadGraph::new();
        for v in 1..=4u64 {
            roads.add_node(id(v), GeoPoint::new(0.0, v as f64 * 0.001).unwrap());
        }
        roads.add_edge(id(1), id(2), 111.0).unwrap();
        roads.add_edge(id(2), id(3), 111.0).unwrap();
        roads.add_edge(id(3), id(4), 111.0).unwrap();
        let reducer = GraphReducer::new(ReduceOptions {
            collapse_pass_through: true,
            ..ReduceOptions::default()
        });
        let tree = reducer.reduce(&roads, id(1), &[id(4)]).unwrap();
        assert_eq!(tree.edges.len(), 1);
        assert!((tree.edges[0].length_m - 333.0).abs() < 1e-9);
        assert_eq!(tree.parent_of(id(4)), Some(id(1)));
    }
}
