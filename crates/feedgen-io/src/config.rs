//! Configuration files.
//!
//! The format follows the extension: `.toml`, `.yaml`/`.yml` or `.json`.
//! Anything else is tried as TOML, then YAML, then JSON.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use feedgen_algo::SynthesisConfig;

/// Load and validate a synthesis configuration.
pub fn load_config(path: impl AsRef<Path>) -> Result<SynthesisConfig> {
    let path = path.as_ref();
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading config '{}'", path.display()))?;
    let config = parse_config(&data, path.extension().and_then(|ext| ext.to_str()))
        .with_context(|| format!("parsing config '{}'", path.display()))?;
    config
        .validate()
        .with_context(|| format!("validating config '{}'", path.display()))?;
    Ok(config)
}

fn parse_config(data: &str, extension: Option<&str>) -> Result<SynthesisConfig> {
    match extension {
        Some(ext) if ext.eq_ignore_ascii_case("toml") => {
            toml::from_str(data).context("parsing config toml")
        }
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            serde_yaml::from_str(data).context("parsing config yaml")
        }
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            serde_json::from_str(data).context("parsing config json")
        }
        _ => toml::from_str(data)
            .or_else(|_| serde_yaml::from_str(data))
            .or_else(|_| serde_json::from_str(data))
            .context("parsing config"),
    }
}

/// Render a configuration as TOML, defaults included.
pub fn config_to_toml(config: &SynthesisConfig) -> Result<String> {
    toml::to_string_pretty(config).context("serializing config to toml")
}
