//! # feedgen-io: File-backed Inputs and Topology Output
//!
//! Readers for everything a synthesis run consumes and a writer for what it
//! produces. Engine errors are converted to [`anyhow::Error`] at this
//! boundary, with context naming the file involved.
//!
//! | Input | Format | Reader |
//! |-------|--------|--------|
//! | Load records | CSV `id,latitude,longitude,area` | [`loads::read_load_records`] |
//! | Road graph | JSON `{nodes, edges}` | [`roads::read_road_graph`] |
//! | Transformer catalog | CSV | [`catalogs::read_transformer_catalog`] |
//! | Conductor catalog | CSV | [`catalogs::read_conductor_catalog`] |
//! | Configuration | TOML, YAML or JSON | [`config::load_config`] |
//!
//! The synthesized feeder is written as pretty-printed JSON by
//! [`export::write_topology_json`].
//!
//! ```no_run
//! use feedgen_io::{loads::read_load_records, roads::read_road_graph};
//!
//! let records = read_load_records("buildings.csv")?;
//! let roads = read_road_graph("roads.json")?;
//! println!(
//!     "{} loads, {} road vertices",
//!     records.value.len(),
//!     roads.value.node_count()
//! );
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod catalogs;
pub mod config;
pub mod export;
pub mod loads;
pub mod roads;

use feedgen_core::Diagnostics;

/// A parsed input together with the warnings raised while reading it.
#[derive(Debug, Clone)]
pub struct Imported<T> {
    pub value: T,
    pub diagnostics: Diagnostics,
}

impl<T> Imported<T> {
    pub fn new(value: T, diagnostics: Diagnostics) -> Self {
        Self { value, diagnostics }
    }
}

pub use catalogs::{read_conductor_catalog, read_transformer_catalog};
pub use config::{config_to_toml, load_config};
pub use export::{write_topology_json, TopologyDocument};
pub use loads::read_load_records;
pub use roads::read_road_graph;
