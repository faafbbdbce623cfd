use clap::{command, Args, Parser, Subcommand, ValueEnum};
use common::config::AgentConfig;
use common::{SNMP_COMMUNITY, SNMP_PORT};
use core::fmt;
use getset::{CopyGetters, Getters};
use std::net::IpAddr;
use std::path::PathBuf;

/// telemetryd: host telemetry over HTTP/JSON and SNMP
#[derive(Debug, Parser, Getters)]
#[command(name = "telemetryd")]
#[command(about = "telemetryd: host telemetry agent serving HTTP/JSON and SNMP", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    #[getset(get = "pub")]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Sample the host and serve the metrics over HTTP and SNMP
    Serve(ServeArgs),
    /// Read OIDs from a running agent with an SNMP GET
    Get(QueryArgs),
    /// Walk a subtree of a running agent with SNMP GETNEXT
    Walk(QueryArgs),
}

impl Commands {
    pub fn verbose(&self) -> bool {
        match self {
            Commands::Serve(args) => args.verbose(),
            Commands::Get(args) | Commands::Walk(args) => args.verbose(),
        }
    }
}

#[derive(Debug, Args, Getters, CopyGetters)]
pub struct ServeArgs {
    /// Optional: TOML configuration file
    #[arg(short, long)]
    #[getset(get = "pub")]
    config: Option<PathBuf>,
    /// Address both responders bind to
    #[arg(short, long)]
    #[getset(get_copy = "pub")]
    bind: Option<IpAddr>,
    /// Port of the HTTP responder
    #[arg(long)]
    #[getset(get_copy = "pub")]
    http_port: Option<u16>,
    /// Port of the SNMP responder
    #[arg(long)]
    #[getset(get_copy = "pub")]
    snmp_port: Option<u16>,
    /// Milliseconds between two samples
    #[arg(short, long)]
    #[getset(get_copy = "pub")]
    interval_ms: Option<u64>,
    /// Community string the SNMP responder accepts
    #[arg(long)]
    #[getset(get = "pub")]
    community: Option<String>,
    /// Run in verbose mode
    #[arg(short, long)]
    #[getset(get_copy = "pub")]
    verbose: bool,
}

impl ServeArgs {
    /// Command line flags win over the file and environment.
    pub fn apply_overrides(&self, config: &mut AgentConfig) {
        if let Some(bind) = self.bind {
            config.set_bind_address(bind);
        }
        if let Some(port) = self.http_port {
            config.set_http_port(port);
        }
        if let Some(port) = self.snmp_port {
            config.set_snmp_port(port);
        }
        if let Some(interval_ms) = self.interval_ms {
            config.set_sample_interval_ms(interval_ms);
        }
        if let Some(community) = &self.community {
            config.set_community(community.clone());
        }
    }
}

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum SnmpVersion {
    V1,
    V2c,
}

impl fmt::Display for SnmpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnmpVersion::V1 => write!(f, "v1"),
            SnmpVersion::V2c => write!(f, "v2c"),
        }
    }
}

#[derive(Debug, Args, Getters, CopyGetters)]
pub struct QueryArgs {
    /// Hostname or IP address of the agent
    #[arg(short = 'a', long, default_value = "127.0.0.1")]
    #[getset(get = "pub")]
    host: String,
    /// Port to query
    #[arg(short, long, default_value_t = SNMP_PORT)]
    #[getset(get_copy = "pub")]
    port: u16,
    /// Community string
    #[arg(short, long, default_value = SNMP_COMMUNITY)]
    #[getset(get = "pub")]
    community: String,
    /// SNMP version
    #[arg(short = 'V', long = "snmp-version", default_value_t = SnmpVersion::V2c)]
    #[getset(get_copy = "pub")]
    snmp_version: SnmpVersion,
    /// Milliseconds to wait for each response
    #[arg(short, long, default_value_t = 1_000)]
    #[getset(get_copy = "pub")]
    timeout_ms: u64,
    /// OIDs to read (GET) or the subtree root (WALK); defaults to the agent MIB
    #[getset(get = "pub")]
    oids: Vec<String>,
    /// Run in verbose mode
    #[arg(short, long)]
    #[getset(get_copy = "pub")]
    verbose: bool,
}
