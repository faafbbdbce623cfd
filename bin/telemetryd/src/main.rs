use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, QueryArgs, ServeArgs, SnmpVersion};
use common::config::AgentConfig;
use common::util::trace::initialize_tracing;
use metrics::collector::SysinfoProbe;
use network::client::SnmpClient;
use network::mib::MibRegistry;
use network::protocol::{Oid, Version};
use network::start_server;
use std::time::Duration;
use tokio::net::lookup_host;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy)]
enum Query {
    Get,
    Walk,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    initialize_tracing(args.command().verbose())?;

    match args.command() {
        Commands::Serve(args) => serve(args).await,
        Commands::Get(args) => query(args, Query::Get).await,
        Commands::Walk(args) => query(args, Query::Walk).await,
    }
}

async fn serve(args: &ServeArgs) -> Result<()> {
    let mut config =
        AgentConfig::load(args.config().as_deref()).context("Failed to load configuration")?;
    args.apply_overrides(&mut config);
    config.validate().context("Invalid configuration")?;
    info!(?config, "telemetryd started");

    // takes the CPU usage baseline, which blocks for a moment
    let probe = tokio::task::spawn_blocking(SysinfoProbe::new).await?;
    start_server(config, Box::new(probe)).await
}

async fn query(args: &QueryArgs, query: Query) -> Result<()> {
    let target = lookup_host((args.host().as_str(), args.port()))
        .await?
        .next()
        .with_context(|| format!("Could not resolve {}", args.host()))?;
    let client = SnmpClient::builder()
        .target(target)
        .community(args.community())
        .version(match args.snmp_version() {
            SnmpVersion::V1 => Version::V1,
            SnmpVersion::V2c => Version::V2c,
        })
        .timeout(Duration::from_millis(args.timeout_ms()))
        .build();
    debug!(?client, ?query, "Querying agent");

    let oids = args
        .oids()
        .iter()
        .map(|oid| {
            oid.parse::<Oid>()
                .with_context(|| format!("Invalid OID `{}`", oid))
        })
        .collect::<Result<Vec<_>>>()?;
    let mib = MibRegistry::default();

    let varbinds = match query {
        Query::Get if oids.is_empty() => client.get(&mib.oids()).await?,
        Query::Get => client.get(&oids).await?,
        Query::Walk if oids.is_empty() => client.walk(mib.base()).await?,
        Query::Walk => {
            let mut varbinds = Vec::new();
            for root in &oids {
                varbinds.extend(client.walk(root).await?);
            }
            varbinds
        }
    };

    for varbind in varbinds {
        println!("{}", varbind);
    }
    Ok(())
}
