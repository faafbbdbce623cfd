use crate::auth::Community;
use crate::client::SnmpClient;
use crate::mib::{MibRegistry, MibRegistryRef};
use crate::protocol::{Oid, OidError};
use crate::server::http::{self, HttpState};
use crate::server::udp::SnmpResponder;
use axum::Router;
use common::config::AgentConfig;
use getset::Getters;
use metrics::collector::HostProbe;
use metrics::{MetricCache, MetricCacheRef, Sampler};
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Invalid MIB base OID `{oid}`: {source}")]
    InvalidBaseOid {
        oid: String,
        #[source]
        source: OidError,
    },
}

/// Everything the agent shares between the sampler and both responders, built once from the
/// configuration.
#[derive(Debug, Clone, Getters)]
#[getset(get = "pub")]
pub struct AgentContext {
    config: Arc<AgentConfig>,
    cache: MetricCacheRef,
    mib: MibRegistryRef,
    community: Community,
}

impl AgentContext {
    pub fn new(config: AgentConfig) -> Result<Self, ContextError> {
        let base: Oid =
            config
                .mib_base_oid()
                .parse()
                .map_err(|source| ContextError::InvalidBaseOid {
                    oid: config.mib_base_oid().clone(),
                    source,
                })?;
        let mib = MibRegistry::new(base, config.mib_string_max_len());

        Ok(AgentContext {
            community: Community::new(config.community().clone()),
            cache: Arc::new(MetricCache::new()),
            mib: Arc::new(mib),
            config: Arc::new(config),
        })
    }

    /// A sampler publishing to the cache, with the MIB subscribed to every snapshot.
    pub fn sampler(&self, probe: Box<dyn HostProbe>) -> Sampler {
        let mut sampler = Sampler::builder()
            .probe(probe)
            .cache(Arc::clone(&self.cache))
            .interval(self.config.sample_interval())
            .cycle_timeout(self.config.sample_interval())
            .build();
        sampler.register_subscriber(self.mib.clone());
        sampler
    }

    pub async fn snmp_responder(&self) -> io::Result<SnmpResponder> {
        SnmpResponder::bind(
            self.config.snmp_addr(),
            Arc::clone(&self.mib),
            self.community.clone(),
        )
        .await
    }

    /// Client for the agent's own responder at `target`, using the configured community.
    pub fn snmp_client(&self, target: SocketAddr) -> SnmpClient {
        SnmpClient::builder()
            .target(loopback_if_unspecified(target))
            .community(self.config.community())
            .timeout(self.config.snmp_timeout())
            .build()
    }

    pub fn http_state(&self, snmp_target: SocketAddr) -> HttpState {
        HttpState::builder()
            .cache(Arc::clone(&self.cache))
            .mib(Arc::clone(&self.mib))
            .snmp_client(Arc::new(self.snmp_client(snmp_target)))
            .metrics_path(self.config.metrics_path().clone())
            .build()
    }

    pub fn router(&self, snmp_target: SocketAddr) -> Router {
        http::router(self.http_state(snmp_target))
    }
}

/// A wildcard bind address cannot be sent to; use loopback of the same family instead.
fn loopback_if_unspecified(addr: SocketAddr) -> SocketAddr {
    match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => (Ipv4Addr::LOCALHOST, addr.port()).into(),
        IpAddr::V6(ip) if ip.is_unspecified() => (Ipv6Addr::LOCALHOST, addr.port()).into(),
        _ => addr,
    }
}

#[cfg(test)]
mod context_tests {
    use super::*;
    use crate::mib::ScalarId;
    use crate::protocol::Value;
    use async_trait::async_trait;
    use metrics::collector::{CollectError, HostReading};

    struct FixedProbe;

    #[async_trait]
    impl HostProbe for FixedProbe {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn probe(&mut self) -> Result<HostReading, CollectError> {
            Ok(HostReading {
                cpu_load_percent: 45.3,
                memory_total_bytes: 8 * 1024 * 1024 * 1024,
                os_description: "Linux".to_string(),
                ..HostReading::default()
            })
        }
    }

    #[tokio::test]
    async fn sampler_feeds_cache_and_mib() {
        let context = AgentContext::new(AgentConfig::default()).unwrap();
        let mut sampler = context.sampler(Box::new(FixedProbe));

        assert!(context.cache().is_empty());
        sampler.run_cycle().await.unwrap();

        assert_eq!(context.cache().read().unwrap().cpu_load_percent(), 45.3);
        assert_eq!(context.mib().generation(), 1);
        let cpu = context.mib().oid_of(ScalarId::Cpu).unwrap();
        assert_eq!(context.mib().get(cpu), Some(Value::Integer(45)));
    }

    #[test]
    fn rejects_an_invalid_base_oid() {
        let config = AgentConfig::builder().mib_base_oid("not.an.oid".to_string()).build();
        assert!(matches!(
            AgentContext::new(config),
            Err(ContextError::InvalidBaseOid { .. })
        ));
    }

    #[test]
    fn wildcard_targets_become_loopback() {
        assert_eq!(
            loopback_if_unspecified("0.0.0.0:1611".parse().unwrap()),
            "127.0.0.1:1611".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            loopback_if_unspecified("[::]:1611".parse().unwrap()),
            "[::1]:1611".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            loopback_if_unspecified("10.0.0.5:1611".parse().unwrap()),
            "10.0.0.5:1611".parse::<SocketAddr>().unwrap()
        );
    }
}
