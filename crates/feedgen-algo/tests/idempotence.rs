//! Repeated runs with the same seed must produce the same feeder.

use std::collections::BTreeSet;

use feedgen_algo::config::PhaseAllocation;
use feedgen_algo::loads::RandomPhaseAllocator;
use feedgen_algo::test_utils::{
    grid_roads, sample_conductors, sample_transformers, DEG_PER_M,
};
use feedgen_algo::{
    ClusterCount, FeederSynthesizer, LoadRecord, SynthesisConfig, SynthesisInputs,
    SynthesizedFeeder,
};
use feedgen_core::{Edge, GeoPoint, VertexKey};

fn records() -> Vec<LoadRecord> {
    let mut records = Vec::new();
    for row in 0..6 {
        for col in 0..5 {
            let lat = (row as f64 * 45.0 + 7.0) * DEG_PER_M;
            let lon = (col as f64 * 55.0 + 4.0 + row as f64) * DEG_PER_M;
            records.push(LoadRecord {
                id: format!("b-{row}-{col}"),
                location: GeoPoint::new(lat, lon).unwrap(),
                area: 80.0 + 13.0 * ((row * 5 + col) % 7) as f64,
            });
        }
    }
    records
}

fn config(seed: u64) -> SynthesisConfig {
    let mut config = SynthesisConfig::default();
    config.clustering.count = ClusterCount::Fixed(3);
    config.clustering.kmeans.seed = seed;
    config.loads.phases = PhaseAllocation::Random(RandomPhaseAllocator {
        pct_single: 0.0,
        pct_two: 0.0,
        pct_three: 100.0,
        seed,
    });
    config
}

fn run(seed: u64) -> SynthesizedFeeder {
    let roads = grid_roads(3, 3, 120.0);
    let transformers = sample_transformers();
    let conductors = sample_conductors();
    FeederSynthesizer::new(config(seed))
        .unwrap()
        .synthesize(
            SynthesisInputs {
                substation: GeoPoint::new(-10.0 * DEG_PER_M, -10.0 * DEG_PER_M).unwrap(),
                roads: &roads,
                transformers: &transformers,
                conductors: &conductors,
            },
            &records(),
        )
        .unwrap()
}

fn vertex_set(feeder: &SynthesizedFeeder) -> BTreeSet<(VertexKey, String)> {
    feeder
        .network()
        .vertices()
        .map(|v| (v.key, v.location.to_string()))
        .collect()
}

fn edge_set(feeder: &SynthesizedFeeder) -> BTreeSet<(VertexKey, VertexKey, String)> {
    let network = feeder.network();
    network
        .graph
        .edge_indices()
        .filter_map(|e| {
            let (from, to) = network.graph.edge_endpoints(e)?;
            let label = match &network.graph[e] {
                Edge::Line(section) => section.conductor.clone(),
                Edge::Transformer(branch) => branch.kva.to_string(),
            };
            Some((network.graph[from].key, network.graph[to].key, label))
        })
        .collect()
}

#[test]
fn test_same_seed_same_feeder() {
    let first = run(11);
    let second = run(11);
    assert_eq!(vertex_set(&first), vertex_set(&second));
    assert_eq!(edge_set(&first), edge_set(&second));
    assert_eq!(first.load_vertex_map(), second.load_vertex_map());
    assert_eq!(first.transformer_vertex_map(), second.transformer_vertex_map());
}

#[test]
fn test_same_seed_same_transformers() {
    let first = run(5);
    let second = run(5);
    let summary = |f: &SynthesizedFeeder| {
        f.transformers()
            .iter()
            .map(|t| (t.id, t.loads.clone(), t.catalog_entry().to_string()))
            .collect::<Vec<_>>()
    };
    assert_eq!(summary(&first), summary(&second));
}
