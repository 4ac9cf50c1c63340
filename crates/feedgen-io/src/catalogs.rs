//! Equipment catalogs from CSV.
//!
//! Transformers: `name,kva,ht_kv,lt_kv,scope,pct_resistance,pct_reactance,pct_no_load_loss`.
//! Conductors: `name,ampacity_a,resistance_ohm_per_km,gmr_m,diameter_m,scope`.
//! An empty `scope` leaves the entry untagged; the percentage columns of the
//! transformer catalog may be omitted.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{ensure, Context, Result};
use feedgen_algo::{Catalog, ConductorEntry, Rated, TransformerEntry};
use serde::de::DeserializeOwned;
use tracing::info;

pub fn read_transformer_catalog(path: impl AsRef<Path>) -> Result<Catalog<TransformerEntry>> {
    read_catalog(path.as_ref(), "transformer")
}

pub fn read_conductor_catalog(path: impl AsRef<Path>) -> Result<Catalog<ConductorEntry>> {
    read_catalog(path.as_ref(), "conductor")
}

fn read_catalog<T>(path: &Path, kind: &str) -> Result<Catalog<T>>
where
    T: Rated + DeserializeOwned,
{
    let file = File::open(path)
        .with_context(|| format!("opening {kind} catalog '{}'", path.display()))?;
    let catalog = parse_catalog(file)
        .with_context(|| format!("parsing {kind} catalog '{}'", path.display()))?;
    info!(path = %path.display(), entries = catalog.len(), "read {kind} catalog");
    Ok(catalog)
}

/// Parse and validate a catalog from any CSV source.
pub fn parse_catalog<T, R>(source: R) -> Result<Catalog<T>>
where
    T: Rated + DeserializeOwned,
    R: Read,
{
    let mut reader = csv::Reader::from_reader(source);
    let mut entries = Vec::new();
    for (index, row) in reader.deserialize::<T>().enumerate() {
        entries.push(row.with_context(|| format!("line {}", index + 2))?);
    }
    ensure!(!entries.is_empty(), "catalog has no entries");
    Ok(Catalog::new(entries)?)
}
