pub mod http;
pub mod udp;

use crate::context::AgentContext;
use anyhow::{bail, Context};
use common::config::AgentConfig;
use common::util::time::format_duration;
use get_if_addrs::get_if_addrs;
use metrics::collector::HostProbe;
use std::net::{IpAddr, TcpListener};
use tokio::signal;
use tracing::{info, warn};

pub use http::{router, serve, HttpState};
pub use udp::SnmpResponder;

/// Binds both responders, starts sampling and runs until Ctrl-C or a responder failure.
pub async fn start_server(config: AgentConfig, probe: Box<dyn HostProbe>) -> anyhow::Result<()> {
    info!(
        http = %config.http_addr(),
        snmp = %config.snmp_addr(),
        interval = %format_duration(config.sample_interval()),
        "Starting telemetry agent"
    );
    let context = AgentContext::new(config)?;
    let config = context.config();

    if config.bind_address().is_unspecified() {
        for ip in interface_addresses() {
            info!(%ip, "Listening at IP address");
        }
    }

    let responder = context
        .snmp_responder()
        .await
        .with_context(|| format!("Failed to bind SNMP responder to {}", config.snmp_addr()))?;
    let snmp_addr = responder.local_addr()?;

    let listener = TcpListener::bind(config.http_addr())
        .with_context(|| format!("Failed to bind HTTP responder to {}", config.http_addr()))?;
    let router = context.router(snmp_addr);

    let mut sampler = context.sampler(probe).spawn();
    let mut snmp = responder.spawn();

    tokio::select! {
        result = http::serve(listener, router) => result?,
        result = &mut snmp => {
            result.context("SNMP responder task failed")?.context("SNMP responder failed")?;
        }
        result = &mut sampler => {
            result.context("Sampler task failed")?;
            bail!("Sampler stopped unexpectedly");
        }
        _ = signal::ctrl_c() => info!("Shutdown signal received, stopping agent"),
    }

    sampler.abort();
    snmp.abort();
    Ok(())
}

/// Non-loopback addresses of the host's interfaces.
fn interface_addresses() -> Vec<IpAddr> {
    match get_if_addrs() {
        Ok(interfaces) => interfaces
            .iter()
            .filter(|interface| !interface.is_loopback())
            .map(|interface| interface.ip())
            .collect(),
        Err(e) => {
            warn!("Failed to list network interfaces: {}", e);
            Vec::new()
        }
    }
}
