//! Runtime settings. Defaults are overlaid by an optional `tripsplit.toml`
//! and then by `TRIPSPLIT_*` environment variables. The MongoDB connection
//! string is read from `MONGODB_URI`; without one, trips are kept in memory.
use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub mongodb_uri: Option<String>,
    pub database: String,
    pub host: String,
    pub port: u16,
    pub log: String,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::builder()?
            .add_source(File::with_name("tripsplit").required(false))
            .add_source(Environment::with_prefix("TRIPSPLIT"))
            .set_override_option("mongodb_uri", std::env::var("MONGODB_URI").ok())?
            .build()?
            .try_deserialize()
    }

    fn builder() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("database", "TripSplit")?
            .set_default("host", "0.0.0.0")?
            .set_default("port", 8080)?
            .set_default("log", "info")
    }
}
