//! Load records from CSV.
//!
//! Expected header: `id,latitude,longitude,area`. The area column may be left
//! empty, in which case the record gets a zero footprint and a warning.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use feedgen_algo::LoadRecord;
use feedgen_core::{category, Diagnostics, GeoPoint};
use serde::Deserialize;
use tracing::info;

use crate::Imported;

#[derive(Debug, Deserialize)]
struct LoadRow {
    id: String,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    area: Option<f64>,
}

pub fn read_load_records(path: impl AsRef<Path>) -> Result<Imported<Vec<LoadRecord>>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("opening load records '{}'", path.display()))?;
    let imported = parse_load_records(file)
        .with_context(|| format!("parsing load records '{}'", path.display()))?;
    info!(
        path = %path.display(),
        records = imported.value.len(),
        warnings = imported.diagnostics.warning_count(),
        "read load records"
    );
    Ok(imported)
}

/// Parse load records from any CSV source.
pub fn parse_load_records<R: Read>(source: R) -> Result<Imported<Vec<LoadRecord>>> {
    let mut reader = csv::Reader::from_reader(source);
    let mut diagnostics = Diagnostics::new();
    let mut records = Vec::new();
    let mut first_line: BTreeMap<String, usize> = BTreeMap::new();

    for (index, row) in reader.deserialize::<LoadRow>().enumerate() {
        // header is line 1
        let line = index + 2;
        let row = row.with_context(|| format!("line {line}"))?;
        let location = GeoPoint::new(row.latitude, row.longitude)
            .map_err(|e| anyhow!("line {line}: load '{}': {e}", row.id))?;

        let area = match row.area {
            Some(area) if area.is_finite() && area >= 0.0 => area,
            Some(area) => {
                return Err(anyhow!("line {line}: load '{}' has invalid area {area}", row.id));
            }
            None => {
                diagnostics.add_warning_at_line(
                    category::INPUT,
                    &format!("load '{}' has no area, using 0", row.id),
                    line,
                );
                0.0
            }
        };

        if let Some(previous) = first_line.get(&row.id) {
            diagnostics.add_warning_at_line(
                category::INPUT,
                &format!("load id '{}' already used on line {previous}", row.id),
                line,
            );
        } else {
            first_line.insert(row.id.clone(), line);
        }

        records.push(LoadRecord {
            id: row.id,
            location,
            area,
        });
    }

    if records.is_empty() {
        diagnostics.add_warning(category::INPUT, "no load records");
    }
    Ok(Imported::new(records, diagnostics))
}
