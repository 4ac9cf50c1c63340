use crate::error::{FeederError, FeederResult};
use crate::{FeederNetwork, VertexId};
use petgraph::algo::connected_components;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::VecDeque;

/// Summary statistics for a feeder tree (depth, branching, components).
#[derive(Debug, Clone, PartialEq)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    /// Weakly connected components; 1 for a valid feeder
    pub connected_components: usize,
    pub leaf_count: usize,
    pub max_children: usize,
    /// Edges on the longest root-to-leaf path
    pub max_depth: usize,
}

/// Calculates structural statistics of a feeder.
pub fn graph_stats(network: &FeederNetwork) -> GraphStats {
    let graph = &network.graph;
    let mut leaf_count = 0;
    let mut max_children = 0;
    for node in graph.node_indices() {
        let children = graph.neighbors_directed(node, Direction::Outgoing).count();
        if children == 0 {
            leaf_count += 1;
        }
        max_children = max_children.max(children);
    }
    let max_depth = network
        .root()
        .map(|root| {
            breadth_first_depths(network, root)
                .into_iter()
                .flatten()
                .max()
                .unwrap_or(0)
        })
        .unwrap_or(0);

    GraphStats {
        node_count: graph.node_count(),
        edge_count: graph.edge_count(),
        connected_components: connected_components(graph),
        leaf_count,
        max_children,
        max_depth,
    }
}

/// Depth (in edges) of every vertex reachable from `root`, indexed by vertex id.
pub fn breadth_first_depths(network: &FeederNetwork, root: VertexId) -> Vec<Option<usize>> {
    let graph = &network.graph;
    let mut depths = vec![None; graph.node_count()];
    if root.value() >= depths.len() {
        return depths;
    }
    let mut queue = VecDeque::new();
    depths[root.value()] = Some(0);
    queue.push_back(root.value());
    while let Some(current) = queue.pop_front() {
        let depth = depths[current].unwrap_or(0);
        for child in graph.neighbors_directed(NodeIndex::new(current), Direction::Outgoing) {
            if depths[child.index()].is_none() {
                depths[child.index()] = Some(depth + 1);
                queue.push_back(child.index());
            }
        }
    }
    depths
}

/// Checks that the network is a single rooted tree and returns the root.
///
/// Fails with `InconsistentTopology` if there is not exactly one parentless
/// vertex, if any vertex has more than one parent, if the edge count is not
/// one less than the vertex count, or if some vertex cannot be reached.
pub fn check_radial(network: &FeederNetwork) -> FeederResult<VertexId> {
    let graph = &network.graph;
    if graph.node_count() == 0 {
        return Err(FeederError::InconsistentTopology(
            "network has no vertices".to_string(),
        ));
    }

    let mut roots = Vec::new();
    for node in graph.node_indices() {
        let parents = graph.edges_directed(node, Direction::Incoming).count();
        match parents {
            0 => roots.push(node),
            1 => {}
            n => {
                return Err(FeederError::InconsistentTopology(format!(
                    "vertex {} has {n} parents",
                    graph[node].key
                )))
            }
        }
    }
    let root = match roots.as_slice() {
        [root] => *root,
        [] => {
            return Err(FeederError::InconsistentTopology(
                "network has no root".to_string(),
            ))
        }
        many => {
            let names: Vec<String> = many.iter().map(|n| graph[*n].key.to_string()).collect();
            return Err(FeederError::InconsistentTopology(format!(
                "network has {} roots: {}",
                many.len(),
                names.join(", ")
            )));
        }
    };

    if graph.edge_count() + 1 != graph.node_count() {
        return Err(FeederError::InconsistentTopology(format!(
            "{} edges for {} vertices",
            graph.edge_count(),
            graph.node_count()
        )));
    }

    let root_id = VertexId::new(root.index());
    let depths = breadth_first_depths(network, root_id);
    if let Some(orphan) = depths.iter().position(Option::is_none) {
        return Err(FeederError::InconsistentTopology(format!(
            "vertex {} is not reachable from {}",
            graph[NodeIndex::new(orphan)].key,
            graph[root].key
        )));
    }
    Ok(root_id)
}

/// Vertices from `id` up to the root, inclusive.
pub fn path_to_root(network: &FeederNetwork, id: VertexId) -> Vec<VertexId> {
    let mut path = vec![id];
    let mut current = id;
    while let Some(parent) = network.parent(current) {
        if path.len() > network.vertex_count() {
            break;
        }
        path.push(parent);
        current = parent;
    }
    path
}

/// Export the topology to a DOT string (Graphviz) so external tools can visualize the layout.
pub fn export_dot(network: &FeederNetwork) -> String {
    let mut buffer = String::new();
    buffer.push_str("digraph feeder {\n");
    for node in network.graph.node_indices() {
        let vertex = &network.graph[node];
        let label = sanitize_label(&vertex.key.to_string());
        buffer.push_str(&format!("  n{} [label=\"{}\"];\n", node.index(), label));
    }
    for edge in network.graph.edge_references() {
        let source = edge.source().index();
        let target = edge.target().index();
        let label = sanitize_label(&edge.weight().label());
        buffer.push_str(&format!("  n{source} -> n{target} [label=\"{label}\"];\n"));
    }
    buffer.push('}');
    buffer
}

fn sanitize_label(label: &str) -> String {
    label.replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Edge, GeoPoint, Kilovolts, LineLevel, LineSection, Meters, SectionId, VertexKey,
    };

    fn chain(n: usize) -> FeederNetwork {
        let mut network = FeederNetwork::new();
        let mut previous = network.add_vertex(
            VertexKey::Substation,
            GeoPoint::new(0.0, 0.0).unwrap(),
            Kilovolts(11.0),
        );
        for i in 0..n {
            let next = network.add_vertex(
                VertexKey::PrimaryPole(i),
                GeoPoint::new(0.0, 0.001 * (i + 1) as f64).unwrap(),
                Kilovolts(11.0),
            );
            network.add_edge(
                previous,
                next,
                Edge::Line(LineSection::unsized_span(
                    SectionId::new(i),
                    previous,
                    next,
                    LineLevel::Primary,
                    Meters(100.0),
                )),
            );
            previous = next;
        }
        network
    }

    #[test]
    fn test_check_radial_on_chain() {
        let network = chain(4);
        assert_eq!(check_radial(&network).unwrap(), VertexId::new(0));
        let stats = graph_stats(&network);
        assert_eq!(stats.max_depth, 4);
        assert_eq!(stats.leaf_count, 1);
        assert_eq!(stats.connected_components, 1);
    }

    #[test]
    fn test_check_radial_rejects_second_root() {
        let mut network = chain(2);
        network.add_vertex(
            VertexKey::PrimaryPole(99),
            GeoPoint::new(1.0, 1.0).unwrap(),
            Kilovolts(11.0),
        );
        let err = check_radial(&network).unwrap_err();
        assert!(err.to_string().contains("2 roots"));
    }

    #[test]
    fn test_check_radial_rejects_two_parents() {
        let mut network = chain(2);
        let extra = Edge::Line(LineSection::unsized_span(
            SectionId::new(9),
            VertexId::new(0),
            VertexId::new(2),
            LineLevel::Primary,
            Meters(10.0),
        ));
        network.add_edge(VertexId::new(0), VertexId::new(2), extra);
        assert!(matches!(
            check_radial(&network),
            Err(FeederError::InconsistentTopology(_))
        ));
    }

    #[test]
    fn test_path_to_root() {
        let network = chain(3);
        let path = path_to_root(&network, VertexId::new(3));
        assert_eq!(
            path,
            vec![
                VertexId::new(3),
                VertexId::new(2),
                VertexId::new(1),
                VertexId::new(0)
            ]
        );
    }

    #[test]
    fn test_export_dot() {
        let dot = export_dot(&chain(1));
        assert!(dot.starts_with("digraph feeder {"));
        assert!(dot.contains("n0 -> n1"));
        assert!(dot.contains("substation"));
    }
}
