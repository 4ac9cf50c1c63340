//! Shared fixtures for unit and integration tests.
//!
//! Coordinates sit on the equator, where 1 m is about 1/111_195 degree in
//! either direction.

use std::collections::BTreeSet;

use feedgen_core::{
    GeoPoint, KilovoltAmperes, Kilovolts, Kilowatts, LoadConnection, LoadId, LoadNode, NumPhase,
    Phase, RoadNodeId, TransformerClass, TransformerConnection, TransformerRating,
};

use crate::catalog::{Catalog, ConductorEntry, TransformerEntry};
use crate::graph::RoadGraph;

/// Degrees per meter on the equator.
pub const DEG_PER_M: f64 = 1.0 / 111_195.0;

fn point(lat: f64, lon: f64) -> GeoPoint {
    GeoPoint::new(lat, lon).expect("fixture coordinates are in range")
}

/// `rows × cols` street grid with `spacing_m` blocks. Ids run 1.. row-major,
/// row 0 is the southernmost.
pub fn grid_roads(rows: u64, cols: u64, spacing_m: f64) -> RoadGraph {
    let mut roads = RoadGraph::new();
    let id = |r: u64, c: u64| RoadNodeId::new(r * cols + c + 1);
    for r in 0..rows {
        for c in 0..cols {
            roads.add_node(
                id(r, c),
                point(
                    r as f64 * spacing_m * DEG_PER_M,
                    c as f64 * spacing_m * DEG_PER_M,
                ),
            );
        }
    }
    for r in 0..rows {
        for c in 0..cols {
            if c + 1 < cols {
                roads
                    .add_edge(id(r, c), id(r, c + 1), spacing_m)
                    .expect("grid vertices exist");
            }
            if r + 1 < rows {
                roads
                    .add_edge(id(r, c), id(r + 1, c), spacing_m)
                    .expect("grid vertices exist");
            }
        }
    }
    roads
}

/// Three-phase residential load.
pub fn sample_load(id: usize, lat: f64, lon: f64, kw: f64) -> LoadNode {
    LoadNode {
        id: LoadId::new(id),
        name: format!("load-{id}"),
        location: point(lat, lon),
        area: 100.0,
        phase: Phase::ABCN,
        num_phase: NumPhase::Three,
        connection: LoadConnection::Wye,
        kw: Kilowatts(kw),
        kv: Kilovolts(0.415),
        power_factor: 0.9,
        vertex: None,
    }
}

/// `per_block` loads a few meters north of every grid vertex except the
/// first, numbered consecutively.
pub fn loads_along_grid(roads: &RoadGraph, per_block: usize, kw: f64) -> Vec<LoadNode> {
    let mut loads = Vec::new();
    for (_, location) in roads.nodes().skip(1) {
        for k in 0..per_block {
            let offset = (5.0 + 3.0 * k as f64) * DEG_PER_M;
            loads.push(sample_load(
                loads.len(),
                location.latitude() + offset,
                location.longitude() + offset / 2.0,
                kw,
            ));
        }
    }
    loads
}

/// 11 kV / 0.415 kV delta-wye three-phase class.
pub fn sample_class() -> TransformerClass {
    TransformerClass {
        ht_kv: Kilovolts(11.0),
        lt_kv: Kilovolts(0.415),
        ht_connection: TransformerConnection::Delta,
        lt_connection: TransformerConnection::Wye,
        ht_phase: Phase::ABC,
        lt_phase: Phase::ABCN,
        num_phase: NumPhase::Three,
    }
}

pub fn sample_rating(kva: f64) -> TransformerRating {
    TransformerRating {
        catalog_entry: format!("{kva}kva"),
        kva: KilovoltAmperes(kva),
        pct_resistance: 1.2,
        pct_reactance: 4.5,
        pct_no_load_loss: 0.3,
    }
}

/// Distribution transformers from 25 to 1000 kVA plus two substation units.
pub fn sample_transformers() -> Catalog<TransformerEntry> {
    let distribution = [25.0, 63.0, 100.0, 160.0, 250.0, 400.0, 630.0, 1000.0];
    let mut entries: Vec<TransformerEntry> = distribution
        .iter()
        .map(|kva| TransformerEntry {
            name: format!("dt-{kva}"),
            kva: *kva,
            ht_kv: 11.0,
            lt_kv: 0.415,
            scope: None,
            pct_resistance: 1.2,
            pct_reactance: 4.5,
            pct_no_load_loss: 0.3,
        })
        .collect();
    for kva in [5000.0, 10000.0] {
        entries.push(TransformerEntry {
            name: format!("st-{kva}"),
            kva,
            ht_kv: 33.0,
            lt_kv: 11.0,
            scope: Some("substation".to_string()),
            pct_resistance: 0.6,
            pct_reactance: 8.0,
            pct_no_load_loss: 0.1,
        });
    }
    Catalog::new(entries).expect("fixture catalog is valid")
}

/// ACSR overhead conductors.
pub fn sample_conductors() -> Catalog<ConductorEntry> {
    let rows = [
        ("squirrel", 76.0, 1.374, 0.00165, 0.00633),
        ("weasel", 95.0, 0.9116, 0.00198, 0.00777),
        ("rabbit", 135.0, 0.5449, 0.00256, 0.01005),
        ("dog", 205.0, 0.2745, 0.00390, 0.01413),
        ("wolf", 260.0, 0.1828, 0.00564, 0.01813),
        ("panther", 300.0, 0.1363, 0.00709, 0.02100),
    ];
    let entries = rows
        .iter()
        .map(|(name, amps, r, gmr, d)| ConductorEntry {
            name: name.to_string(),
            ampacity_a: *amps,
            resistance_ohm_per_km: *r,
            gmr_m: *gmr,
            diameter_m: *d,
            scope: Some("acsr".to_string()),
        })
        .collect();
    Catalog::new(entries).expect("fixture catalog is valid")
}

/// Ids of every load, for building transformer fixtures.
pub fn load_ids(loads: &[LoadNode]) -> BTreeSet<LoadId> {
    loads.iter().map(|l| l.id).collect()
}
