use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ::config::builder::DefaultState;
use ::config::{Config, ConfigBuilder, Environment, File, FileFormat};
use serde::Deserialize;

use crate::db::DEFAULT_DB_PATH;
use crate::error::ConfigError;
use crate::fetch::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
use crate::types::{Category, SourceConfig};

pub const DEFAULT_CONFIG_PATH: &str = "config/config.yml";
pub const DEFAULT_LOG_FILE: &str = "logs/scout.log";
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_secs(4);
const ENV_PREFIX: &str = "SCOUT";

/// Everything a run needs, read once per command.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub sources: Vec<SourceConfig>,
    pub request_delay: Duration,
    pub request_timeout: Duration,
    pub base_url: String,
    pub database: PathBuf,
    pub log_file: PathBuf,
}

#[derive(Debug, Deserialize)]
struct RawSettings {
    #[serde(default)]
    sources: Vec<RawSource>,
    // Older config files list names plus one shared category filter.
    #[serde(default)]
    repositories: Vec<String>,
    #[serde(default)]
    targets: Vec<String>,
    seconds_per_request: f64,
    request_timeout_secs: f64,
    base_url: String,
    database: PathBuf,
    log_file: PathBuf,
}

#[derive(Debug, Deserialize)]
struct RawSource {
    name: String,
    #[serde(default)]
    categories: Vec<String>,
}

impl Settings {
    /// Load `path` (or `config/config.yml` if present) layered under
    /// `SCOUT_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name(DEFAULT_CONFIG_PATH).required(false),
        };
        let builder = defaults()?
            .add_source(file)
            .add_source(Environment::with_prefix(ENV_PREFIX));
        Self::build(builder)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let builder = defaults()?.add_source(File::from_str(yaml, FileFormat::Yaml));
        Self::build(builder)
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let raw: RawSettings = builder.build()?.try_deserialize()?;

        let sources = if raw.sources.is_empty() {
            raw.repositories
                .iter()
                .map(|name| resolve_source(name, &raw.targets))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            raw.sources
                .iter()
                .map(|s| resolve_source(&s.name, &s.categories))
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(Settings {
            sources,
            request_delay: Duration::from_secs_f64(raw.seconds_per_request.max(0.0)),
            request_timeout: Duration::from_secs_f64(raw.request_timeout_secs.max(0.0)),
            base_url: raw.base_url,
            database: raw.database,
            log_file: raw.log_file,
        })
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(Config::builder()
        .set_default("seconds_per_request", DEFAULT_REQUEST_DELAY.as_secs_f64())?
        .set_default("request_timeout_secs", DEFAULT_TIMEOUT.as_secs_f64())?
        .set_default("base_url", DEFAULT_BASE_URL)?
        .set_default("database", DEFAULT_DB_PATH)?
        .set_default("log_file", DEFAULT_LOG_FILE)?)
}

fn resolve_source(name: &str, categories: &[String]) -> Result<SourceConfig, ConfigError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ConfigError::EmptySourceName);
    }
    let categories = categories
        .iter()
        .map(|c| {
            c.parse::<Category>()
                .map_err(|category| ConfigError::UnknownCategory {
                    source_name: name.to_string(),
                    category,
                })
        })
        .collect::<Result<BTreeSet<_>, _>>()?;
    Ok(SourceConfig {
        name: name.to_string(),
        categories,
    })
}
