use bitcoin::Network;
use config::{Config, ConfigBuilder, Environment, File, FileFormat, builder::DefaultState};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8080/1";
pub const DEFAULT_API_PASS: &str = "satoshi";

/// Connection settings for a regtest faucet/explorer service.
///
/// Values are layered: built-in defaults, then an optional TOML file, then
/// `REGTEST_*` environment variables (`REGTEST_API_URL`, `REGTEST_API_PASS`, ...),
/// and finally the bare `APIURL` / `APIPASS` variables understood by older
/// tooling.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct RegtestConfig {
    /// Base URL every endpoint path is appended to
    pub api_url: String,
    /// Key sent with privileged `/r/*` requests
    pub api_pass: String,
    pub network: Network,
    /// How many times `faucet` requests funding before giving up
    pub faucet_attempts: u32,
    /// Base delay between unspent lookups, jittered upwards
    pub poll_interval_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for RegtestConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_pass: DEFAULT_API_PASS.to_string(),
            network: Network::Regtest,
            faucet_attempts: 5,
            poll_interval_ms: 150,
            request_timeout_secs: 30,
        }
    }
}

impl RegtestConfig {
    /// Loads the configuration from defaults and the environment only.
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Loads the configuration, reading `path` as TOML if it exists.
    ///
    /// # Arguments
    /// * `path` - Optional path to a TOML file; a missing file is not an error
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = Self::builder_with_defaults()?;
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(false));
        }

        let config = builder
            .add_source(Environment::with_prefix("REGTEST"))
            .set_override_option("api_url", std::env::var("APIURL").ok())?
            .set_override_option("api_pass", std::env::var("APIPASS").ok())?
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Parses a TOML document on top of the defaults, ignoring the environment.
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let config = Self::builder_with_defaults()?
            .add_source(File::from_str(toml_str, FileFormat::Toml))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>> {
        let defaults = Self::default();
        let builder = Config::builder()
            .set_default("api_url", defaults.api_url)?
            .set_default("api_pass", defaults.api_pass)?
            .set_default("network", defaults.network.to_string())?
            .set_default("faucet_attempts", defaults.faucet_attempts as i64)?
            .set_default("poll_interval_ms", defaults.poll_interval_ms as i64)?
            .set_default("request_timeout_secs", defaults.request_timeout_secs as i64)?;
        Ok(builder)
    }
}
