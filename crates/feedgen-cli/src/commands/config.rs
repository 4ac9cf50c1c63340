use anyhow::Result;
use feedgen_algo::SynthesisConfig;
use feedgen_cli::cli::ConfigCommands;
use feedgen_io::{config_to_toml, load_config};
use tracing::info;

pub fn handle(command: &ConfigCommands) -> Result<()> {
    let config = match command {
        ConfigCommands::Check { file } => {
            let config = load_config(file)?;
            info!(path = %file.display(), "configuration is valid");
            config
        }
        ConfigCommands::Default => SynthesisConfig::default(),
    };
    print!("{}", config_to_toml(&config)?);
    Ok(())
}
