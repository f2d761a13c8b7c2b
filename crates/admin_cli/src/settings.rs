//! Settings for the admin tool, read from an optional `settings.toml` and
//! `SKILLSWAP_*` environment variables (`SKILLSWAP_APP__LEVEL=debug`).
//! Command-line flags override both.
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Default, Deserialize)]
pub struct Database {
    pub url: Option<String>,
}

/// Overrides for the configuration seeded on an empty database.
#[derive(Debug, Default, Deserialize)]
pub struct Seed {
    /// Percent as text (`"12.5"`), validated when the engine is built.
    pub platform_fee_percent: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub app: App,
    #[serde(default)]
    pub database: Database,
    #[serde(default)]
    pub seed: Seed,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("settings").required(false))
            .add_source(Environment::with_prefix("SKILLSWAP").separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}
