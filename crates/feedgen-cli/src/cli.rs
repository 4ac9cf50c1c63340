use clap::{Args, CommandFactory, Parser, Subcommand, ValueHint};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Synthesize radial distribution feeders", long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info", global = true)]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a feeder from loads, roads and equipment catalogs
    Synth(SynthArgs),
    /// Configuration helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Inspect equipment catalogs
    Catalog {
        #[command(subcommand)]
        command: CatalogCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: Shell,
        /// Write output to a file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
pub struct SynthArgs {
    /// Configuration file (TOML, YAML or JSON); defaults apply when omitted
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    /// Building records CSV (`id,latitude,longitude,area`)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub loads: PathBuf,
    /// Road graph JSON
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub roads: PathBuf,
    /// Transformer catalog CSV
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub transformers: PathBuf,
    /// Conductor catalog CSV
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub conductors: PathBuf,
    /// Substation latitude in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub substation_lat: f64,
    /// Substation longitude in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub substation_lon: f64,
    /// Output topology JSON
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub out: PathBuf,
    /// Override the clustering seed from the configuration
    #[arg(long)]
    pub seed: Option<u64>,
    /// Worker threads ("auto" or a number)
    #[arg(long, default_value = "auto")]
    pub threads: String,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate a configuration file and print it as TOML with defaults filled in
    Check {
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
    },
    /// Print the default configuration as TOML
    Default,
}

#[derive(Subcommand, Debug)]
pub enum CatalogCommands {
    /// List a transformer catalog in ascending kVA
    Transformers {
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
        /// Only entries with this scope tag
        #[arg(long)]
        scope: Option<String>,
    },
    /// List a conductor catalog in ascending ampacity
    Conductors {
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
        /// Only entries with this scope tag
        #[arg(long)]
        scope: Option<String>,
    },
}

pub fn build_cli_command() -> clap::Command {
    Cli::command()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        build_cli_command().debug_assert();
    }

    #[test]
    fn test_negative_coordinates_parse() {
        let cli = Cli::try_parse_from([
            "feedgen",
            "synth",
            "--loads",
            "l.csv",
            "--roads",
            "r.json",
            "--transformers",
            "t.csv",
            "--conductors",
            "c.csv",
            "--substation-lat",
            "-33.9",
            "--substation-lon",
            "-70.6",
            "-o",
            "out.json",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Synth(args)) => {
                assert_eq!(args.substation_lat, -33.9);
                assert_eq!(args.threads, "auto");
                assert!(args.config.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
