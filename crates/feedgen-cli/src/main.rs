use clap::Parser;
use feedgen_cli::cli::{Cli, Commands};
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

mod commands;

use crate::commands::{catalog, completions, config, synth};

fn main() {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let result = match &cli.command {
        Some(Commands::Synth(args)) => {
            info!(
                loads = %args.loads.display(),
                roads = %args.roads.display(),
                "synthesizing feeder"
            );
            synth::handle(args)
        }
        Some(Commands::Config { command }) => config::handle(command),
        Some(Commands::Catalog { command }) => catalog::handle(command),
        Some(Commands::Completions { shell, out }) => completions::handle(*shell, out.as_deref()),
        None => {
            info!("No subcommand given; run with --help for usage");
            Ok(())
        }
    };

    if let Err(err) = result {
        error!("{err:#}");
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
