//! `flatcartag config`: print the effective configuration.

use anyhow::{Context, Result};

use crate::domain::models::Config;

/// Render `config` as YAML, or pretty JSON in JSON mode.
pub fn render(config: &Config, json_mode: bool) -> Result<String> {
    if json_mode {
        serde_json::to_string_pretty(config).context("Failed to serialize configuration")
    } else {
        serde_yaml::to_string(config).context("Failed to serialize configuration")
    }
}

pub fn execute(config: &Config, json_mode: bool) -> Result<()> {
    print!("{}", render(config, json_mode)?);
    if json_mode {
        println!();
    }
    Ok(())
}
