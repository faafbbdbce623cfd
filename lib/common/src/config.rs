//! Agent configuration: built-in defaults, an optional TOML file, then environment overrides.

use crate::{
    HTTP_PORT, MIB_BASE_OID, MIB_STRING_MAX_LEN, SAMPLE_INTERVAL, SNMP_COMMUNITY, SNMP_PORT,
    SNMP_TIMEOUT,
};
use config::{Config, Environment, File, FileFormat};
use getset::{CopyGetters, Getters, Setters};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use typed_builder::TypedBuilder;

/// Prefix of the environment variables read by [`AgentConfig::load`], e.g. `TELEMETRY__HTTP_PORT`.
pub const ENV_PREFIX: &str = "TELEMETRY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Invalid configuration value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Getters,
    CopyGetters,
    Setters,
    TypedBuilder,
)]
#[getset(set = "pub")]
pub struct AgentConfig {
    /// Address both responders bind to.
    #[builder(default = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    #[getset(get_copy = "pub")]
    bind_address: IpAddr,
    #[builder(default = HTTP_PORT)]
    #[getset(get_copy = "pub")]
    http_port: u16,
    #[builder(default = SNMP_PORT)]
    #[getset(get_copy = "pub")]
    snmp_port: u16,
    /// Route of the native JSON view; the SNMP view is served under `<metrics_path>/snmp`.
    #[builder(default = "/metrics".to_string())]
    #[getset(get = "pub")]
    metrics_path: String,
    #[builder(default = SNMP_COMMUNITY.to_string())]
    #[getset(get = "pub")]
    community: String,
    #[builder(default = SAMPLE_INTERVAL.as_millis() as u64)]
    #[getset(get_copy = "pub")]
    sample_interval_ms: u64,
    #[builder(default = SNMP_TIMEOUT.as_millis() as u64)]
    #[getset(get_copy = "pub")]
    snmp_timeout_ms: u64,
    #[builder(default = MIB_BASE_OID.to_string())]
    #[getset(get = "pub")]
    mib_base_oid: String,
    #[builder(default = MIB_STRING_MAX_LEN)]
    #[getset(get_copy = "pub")]
    mib_string_max_len: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig::builder().build()
    }
}

impl AgentConfig {
    /// Loads the configuration from `file_path` (if given), `.env` and `TELEMETRY__*` variables.
    pub fn load(file_path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::load_with_prefix(file_path, ENV_PREFIX)
    }

    /// Same as [`AgentConfig::load`] but reads environment variables under `env_prefix`
    /// and skips the `.env` file.
    pub fn load_with_prefix(file_path: Option<&Path>, env_prefix: &str) -> Result<Self, ConfigError> {
        let defaults = AgentConfig::default();

        let mut builder = Config::builder()
            .set_default("bind_address", defaults.bind_address.to_string())?
            .set_default("http_port", i64::from(defaults.http_port))?
            .set_default("snmp_port", i64::from(defaults.snmp_port))?
            .set_default("metrics_path", defaults.metrics_path.clone())?
            .set_default("community", defaults.community.clone())?
            .set_default("sample_interval_ms", defaults.sample_interval_ms as i64)?
            .set_default("snmp_timeout_ms", defaults.snmp_timeout_ms as i64)?
            .set_default("mib_base_oid", defaults.mib_base_oid.clone())?
            .set_default("mib_string_max_len", defaults.mib_string_max_len as i64)?;

        if let Some(path) = file_path {
            debug!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<AgentConfig>()?;

        config.validate()?;
        Ok(config)
    }

    /// Rejects values the agent cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_interval_ms == 0 {
            return Err(invalid("sample_interval_ms", "must be greater than zero"));
        }
        if self.snmp_timeout_ms == 0 {
            return Err(invalid("snmp_timeout_ms", "must be greater than zero"));
        }
        if self.community.is_empty() {
            return Err(invalid("community", "must not be empty"));
        }
        if !self.metrics_path.starts_with('/') || self.metrics_path.len() < 2 {
            return Err(invalid("metrics_path", "must start with `/` and name a route"));
        }
        if self.mib_string_max_len == 0 {
            return Err(invalid("mib_string_max_len", "must be greater than zero"));
        }
        let arcs: Vec<&str> = self.mib_base_oid.split('.').collect();
        if arcs.len() < 2 || arcs.iter().any(|arc| arc.parse::<u32>().is_err()) {
            return Err(invalid(
                "mib_base_oid",
                &format!("`{}` is not a dotted numeric OID", self.mib_base_oid),
            ));
        }
        Ok(())
    }

    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.http_port)
    }

    pub fn snmp_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.snmp_port)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn snmp_timeout(&self) -> Duration {
        Duration::from_millis(self.snmp_timeout_ms)
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}
