use std::io::{self, Write};

use anyhow::Result;
use feedgen_cli::cli::CatalogCommands;
use feedgen_io::{read_conductor_catalog, read_transformer_catalog};
use tabwriter::TabWriter;

pub fn handle(command: &CatalogCommands) -> Result<()> {
    let mut writer = TabWriter::new(io::stdout()).padding(2);
    match command {
        CatalogCommands::Transformers { file, scope } => {
            let catalog = read_transformer_catalog(file)?;
            writeln!(writer, "NAME\tKVA\tHT KV\tLT KV\tSCOPE\t%R\t%X")?;
            for entry in catalog.in_scope(scope.as_deref()) {
                writeln!(
                    writer,
                    "{}\t{}\t{}\t{}\t{}\t{}\t{}",
                    entry.name,
                    entry.kva,
                    entry.ht_kv,
                    entry.lt_kv,
                    entry.scope.as_deref().unwrap_or("-"),
                    entry.pct_resistance,
                    entry.pct_reactance
                )?;
            }
        }
        CatalogCommands::Conductors { file, scope } => {
            let catalog = read_conductor_catalog(file)?;
            writeln!(writer, "NAME\tAMPS\tOHM/KM\tGMR M\tDIAMETER M\tSCOPE")?;
            for entry in catalog.in_scope(scope.as_deref()) {
                writeln!(
                    writer,
                    "{}\t{}\t{}\t{}\t{}\t{}",
                    entry.name,
                    entry.ampacity_a,
                    entry.resistance_ohm_per_km,
                    entry.gmr_m,
                    entry.diameter_m,
                    entry.scope.as_deref().unwrap_or("-")
                )?;
            }
        }
    }
    writer.flush()?;
    Ok(())
}
