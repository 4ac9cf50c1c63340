//! Structural and electrical properties of synthesized feeders.

use std::collections::BTreeSet;

use feedgen_algo::test_utils::{
    grid_roads, loads_along_grid, sample_conductors, sample_transformers, DEG_PER_M,
};
use feedgen_algo::{ClusterCount, FeederSynthesizer, SynthesisConfig, SynthesisInputs, SynthesizedFeeder};
use feedgen_core::{
    check_radial, path_to_root, Edge, GeoPoint, LineLevel, VertexId, VertexRole,
};

const MAX_SPAN_M: f64 = 40.0;

fn synthesize(clusters: usize) -> SynthesizedFeeder {
    let roads = grid_roads(4, 4, 90.0);
    let loads = loads_along_grid(&roads, 3, 2.5);
    let transformers = sample_transformers();
    let conductors = sample_conductors();

    let mut config = SynthesisConfig::default();
    config.clustering.count = ClusterCount::Fixed(clusters);
    config.max_pole_span_m = MAX_SPAN_M;

    FeederSynthesizer::new(config)
        .unwrap()
        .synthesize_loads(
            SynthesisInputs {
                substation: GeoPoint::new(-30.0 * DEG_PER_M, -30.0 * DEG_PER_M).unwrap(),
                roads: &roads,
                transformers: &transformers,
                conductors: &conductors,
            },
            loads,
        )
        .unwrap()
}

#[test]
fn test_single_rooted_tree() {
    let feeder = synthesize(3);
    let network = feeder.network();

    assert_eq!(check_radial(network).unwrap(), feeder.root());
    assert_eq!(network.edge_count(), network.vertex_count() - 1);
    for vertex in network.vertices() {
        let parents = network
            .graph
            .neighbors_directed(
                feedgen_core::NodeIndex::new(vertex.id.value()),
                petgraph::Direction::Incoming,
            )
            .count();
        let expected = usize::from(vertex.id != feeder.root());
        assert_eq!(parents, expected, "vertex {} has {parents} parents", vertex.key);
    }
}

#[test]
fn test_loads_and_transformers_reach_substation() {
    let feeder = synthesize(3);
    let network = feeder.network();
    let root = feeder.root();

    let targets: Vec<VertexId> = feeder
        .load_vertex_map()
        .values()
        .chain(feeder.transformer_vertex_map().values())
        .copied()
        .collect();
    for id in targets {
        assert_eq!(path_to_root(network, id).last(), Some(&root));
    }
}

#[test]
fn test_every_load_served_by_one_transformer() {
    let feeder = synthesize(4);
    let mut served = BTreeSet::new();
    for transformer in feeder.transformers() {
        for load in &transformer.loads {
            assert!(served.insert(*load), "{load} served twice");
        }
        assert!(transformer.kva() >= transformer.required_kva());
    }
    let all: BTreeSet<_> = feeder.loads().iter().map(|l| l.id).collect();
    assert_eq!(served, all);
}

#[test]
fn test_load_vertices_match_map() {
    let feeder = synthesize(2);
    for load in feeder.loads() {
        let vertex = load.vertex.unwrap();
        assert_eq!(feeder.load_vertex_map()[&load.id], vertex);
        assert_eq!(
            feeder.network().vertex(vertex).unwrap().role,
            VertexRole::Load
        );
    }
}

#[test]
fn test_path_drop_within_allowance() {
    let feeder = synthesize(3);
    let network = feeder.network();
    let config = SynthesisConfig::default();
    let primary_allowed = config.primary_sizing().allowed_drop_pct;
    let secondary_allowed = config.secondary_sizing().allowed_drop_pct;

    for &vertex in feeder.load_vertex_map().values() {
        let (mut primary, mut secondary) = (0.0, 0.0);
        for id in path_to_root(network, vertex) {
            if let Some(Edge::Line(section)) = network.incoming_edge(id) {
                match section.level {
                    LineLevel::Primary => primary += section.voltage_drop_pct,
                    LineLevel::Secondary => secondary += section.voltage_drop_pct,
                }
            }
        }
        assert!(primary <= primary_allowed + 1e-9, "primary drop {primary}%");
        assert!(secondary <= secondary_allowed + 1e-9, "secondary drop {secondary}%");
    }
}

#[test]
fn test_conductors_carry_required_current() {
    let feeder = synthesize(3);
    for section in feeder.network().sections() {
        assert!(
            section.rated_ampacity >= section.required_ampacity,
            "{} rated {} for {}",
            section.id,
            section.rated_ampacity,
            section.required_ampacity
        );
    }
}

#[test]
fn test_secondary_spans_respect_pole_spacing() {
    let feeder = synthesize(2);
    let secondary: Vec<_> = feeder
        .network()
        .sections()
        .filter(|s| s.level == LineLevel::Secondary)
        .collect();
    assert!(!secondary.is_empty());
    for section in secondary {
        assert!(
            section.length.value() <= MAX_SPAN_M + 1e-6,
            "{} is {} long",
            section.id,
            section.length
        );
    }
    assert!(feeder.stats().num_poles > 0);
}

#[test]
fn test_stats_account_for_everything() {
    let feeder = synthesize(3);
    let stats = feeder.stats();
    assert_eq!(stats.num_loads, feeder.loads().len());
    assert_eq!(stats.num_transformers, feeder.transformers().len());
    let kw: f64 = feeder.loads().iter().map(|l| l.kw.value()).sum();
    assert!((stats.total_load_kw - kw).abs() < 1e-9);
    assert!(stats.primary_length_m > 0.0);
    assert!(stats.secondary_length_m > 0.0);
}
