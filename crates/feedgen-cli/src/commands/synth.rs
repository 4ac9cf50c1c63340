use std::time::Instant;

use anyhow::{Context, Result};
use feedgen_algo::{FeederSynthesizer, SynthesisConfig, SynthesisInputs};
use feedgen_cli::cli::SynthArgs;
use feedgen_core::GeoPoint;
use feedgen_io::{
    load_config, read_conductor_catalog, read_load_records, read_road_graph,
    read_transformer_catalog, write_topology_json,
};
use tracing::info;

use crate::commands::util::{configure_threads, log_diagnostics};

pub fn handle(args: &SynthArgs) -> Result<()> {
    let start = Instant::now();
    configure_threads(&args.threads);

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => SynthesisConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.clustering.kmeans.seed = seed;
    }

    let substation = GeoPoint::new(args.substation_lat, args.substation_lon)
        .context("invalid substation location")?;
    let records = read_load_records(&args.loads)?;
    log_diagnostics("loads", &records.diagnostics);
    let roads = read_road_graph(&args.roads)?;
    log_diagnostics("roads", &roads.diagnostics);
    let transformers = read_transformer_catalog(&args.transformers)?;
    let conductors = read_conductor_catalog(&args.conductors)?;

    let synthesizer = FeederSynthesizer::new(config)?;
    let mut feeder = synthesizer
        .synthesize(
            SynthesisInputs {
                substation,
                roads: &roads.value,
                transformers: &transformers,
                conductors: &conductors,
            },
            &records.value,
        )
        .context("synthesizing feeder")?;
    log_diagnostics("synthesis", &feeder.diagnostics);

    let mut diagnostics = records.diagnostics;
    diagnostics.merge(roads.diagnostics);
    diagnostics.merge(std::mem::take(&mut feeder.diagnostics));
    feeder.diagnostics = diagnostics;

    write_topology_json(&args.out, &feeder)?;

    let stats = feeder.stats();
    println!("Feeder written to {}:", args.out.display());
    println!("  Vertices        : {}", stats.num_vertices);
    println!("  Line sections   : {}", stats.num_sections);
    println!("  Transformers    : {}", stats.num_transformers);
    println!("  Loads           : {}", stats.num_loads);
    println!("  Poles           : {}", stats.num_poles);
    println!("  Primary length  : {:.1} m", stats.primary_length_m);
    println!("  Secondary length: {:.1} m", stats.secondary_length_m);
    println!("  Total load      : {:.1} kW", stats.total_load_kw);
    println!("  Installed       : {:.1} kVA", stats.installed_kva);
    println!("  {}", feeder.diagnostics.summary());
    info!(elapsed_ms = start.elapsed().as_millis() as u64, "synthesis finished");
    Ok(())
}
