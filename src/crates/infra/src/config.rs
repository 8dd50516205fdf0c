use config::{Config, Environment, File};
use dotenvy::dotenv;
use serde::Deserialize;
use std::error::Error;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawConfig {
    /// How far a listener may drift from the host before a corrective seek
    drift_tolerance_ms: i64,
    party_code_length: usize,
    /// Default page size for the most-listeners ranking
    top_parties_count: usize,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            drift_tolerance_ms: 3_000,
            party_code_length: 4,
            top_parties_count: 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub drift_tolerance_ms: i64,
    pub party_code_length: usize,
    pub top_parties_count: usize,
}

impl AppConfig {
    /// Loads `encore.toml` from the working directory (optional) with
    /// `ENCORE_*` environment variables on top; missing values fall back to
    /// defaults.
    pub fn load() -> Result<Self, Box<dyn Error>> {
        dotenv().ok();
        let raw: RawConfig = Config::builder()
            .add_source(File::with_name("encore").required(false))
            .add_source(Environment::with_prefix("ENCORE"))
            .build()?
            .try_deserialize()?;
        Ok(raw.into())
    }
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        Self {
            drift_tolerance_ms: raw.drift_tolerance_ms,
            party_code_length: raw.party_code_length,
            top_parties_count: raw.top_parties_count,
        }
    }
}
