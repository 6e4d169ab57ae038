use crate::error::{LesionError, LesionResult};
use crate::model::segment::Classification;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Largest number of decimals the display layer will render.
pub const MAX_DECIMALS: usize = 6;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub display: DisplayConfig,
    pub groups: GroupsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `lesiongraph=debug`.
    pub level: String,
    /// Emit newline-delimited JSON instead of human-readable lines.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub decimals: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { decimals: 2 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GroupsConfig {
    /// Bucket used for segments that carry no classification.
    pub default_classification: Classification,
}

impl Default for GroupsConfig {
    fn default() -> Self {
        Self {
            default_classification: Classification::Target,
        }
    }
}

/// Load configuration from `lesiongraph.toml`, an optional explicit file and
/// `LESIONGRAPH__*` environment variables, in that order of precedence.
pub fn load_config(path: Option<&Path>) -> LesionResult<AppConfig> {
    let mut builder = Config::builder().add_source(File::with_name("lesiongraph").required(false));

    if let Some(path) = path {
        builder = builder.add_source(File::from(path).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("LESIONGRAPH").separator("__"));

    let config = builder
        .build()
        .map_err(|err| LesionError::ConfigError(err.to_string()))?;

    let parsed: AppConfig = config
        .try_deserialize()
        .map_err(|err| LesionError::ConfigError(err.to_string()))?;

    validate(&parsed)?;
    Ok(parsed)
}

fn validate(config: &AppConfig) -> LesionResult<()> {
    if config.display.decimals > MAX_DECIMALS {
        return Err(LesionError::ConfigError(format!(
            "display.decimals must be at most {}, got {}",
            MAX_DECIMALS, config.display.decimals
        )));
    }
    if config.logging.level.trim().is_empty() {
        return Err(LesionError::ConfigError(
            "logging.level must not be empty".to_string(),
        ));
    }
    Ok(())
}
