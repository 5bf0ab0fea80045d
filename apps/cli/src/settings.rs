//! Engine configuration loading for the CLI.

use std::path::Path;

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use costscope_core::EngineConfig;

/// Environment variable prefix; nested keys use `__`, e.g. `COSTSCOPE__FORECAST__DEFAULT_HORIZON_DAYS`.
pub const ENV_PREFIX: &str = "COSTSCOPE";

/// Load engine configuration.
///
/// Configuration precedence:
/// 1. Environment variables (`COSTSCOPE__...`)
/// 2. Config file (`--config`, optional)
/// 3. Defaults
pub fn load_engine_config(path: Option<&Path>) -> Result<EngineConfig> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        if !path.exists() {
            anyhow::bail!("config file not found: {}", path.display());
        }
        builder = builder.add_source(File::from(path).format(FileFormat::Toml));
    }

    let config: EngineConfig = builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?
        .try_deserialize()
        .context("Failed to deserialize engine configuration")?;

    config.validate().context("Invalid engine configuration")?;
    Ok(config)
}
