pub mod cli;

pub use cli::{build_cli_command, CatalogCommands, Cli, Commands, ConfigCommands, SynthArgs};
