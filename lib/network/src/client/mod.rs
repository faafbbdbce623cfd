use crate::protocol::{
    DecodeError, ErrorStatus, Oid, Pdu, PduKind, SnmpMessage, Value, VarBind, Version,
    MAX_DATAGRAM_SIZE,
};
use bytes::Bytes;
use common::{SNMP_COMMUNITY, SNMP_TIMEOUT};
use getset::{CopyGetters, Getters};
use rand::Rng;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::time;
use tracing::{debug, instrument, trace};
use typed_builder::TypedBuilder;

/// Upper bound on GETNEXT round trips in a single walk.
const MAX_WALK_STEPS: usize = 10_000;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("SNMP transport error: {0}")]
    Io(#[from] io::Error),
    #[error("No SNMP response from {target} within {timeout:?}")]
    Timeout { target: SocketAddr, timeout: Duration },
    #[error("Malformed SNMP response: {0}")]
    Decode(#[from] DecodeError),
    #[error("SNMP agent answered {status} at binding {index}")]
    ErrorStatus { status: ErrorStatus, index: i64 },
    #[error("Unexpected SNMP response: {0}")]
    UnexpectedResponse(String),
}

/// Community-based SNMP manager that issues one request per call on a fresh socket.
#[derive(Debug, Clone, Getters, CopyGetters, TypedBuilder)]
pub struct SnmpClient {
    #[getset(get_copy = "pub")]
    target: SocketAddr,
    #[builder(default = Bytes::from_static(SNMP_COMMUNITY.as_bytes()), setter(transform = |community: &str| Bytes::copy_from_slice(community.as_bytes())))]
    #[getset(get = "pub")]
    community: Bytes,
    #[builder(default = Version::V2c)]
    #[getset(get_copy = "pub")]
    version: Version,
    /// Bound on one request/response round trip.
    #[builder(default = SNMP_TIMEOUT)]
    #[getset(get_copy = "pub")]
    timeout: Duration,
}

impl SnmpClient {
    pub fn new(target: SocketAddr) -> Self {
        SnmpClient::builder().target(target).build()
    }

    /// GET of every OID in one request. Bindings come back in request order and may hold
    /// exception values.
    pub async fn get(&self, oids: &[Oid]) -> Result<Vec<VarBind>, ClientError> {
        self.request(PduKind::GetRequest, oids).await
    }

    pub async fn get_next(&self, oids: &[Oid]) -> Result<Vec<VarBind>, ClientError> {
        self.request(PduKind::GetNextRequest, oids).await
    }

    /// Every binding in the subtree rooted at `root`, in walk order.
    pub async fn walk(&self, root: &Oid) -> Result<Vec<VarBind>, ClientError> {
        let mut bindings = Vec::new();
        let mut cursor = root.clone();

        for _ in 0..MAX_WALK_STEPS {
            let next = match self.get_next(std::slice::from_ref(&cursor)).await {
                Ok(mut varbinds) if varbinds.len() == 1 => varbinds.remove(0),
                Ok(varbinds) => {
                    return Err(ClientError::UnexpectedResponse(format!(
                        "{} bindings for a single GETNEXT",
                        varbinds.len()
                    )))
                }
                // v1 agents signal the end of the MIB this way
                Err(ClientError::ErrorStatus {
                    status: ErrorStatus::NoSuchName,
                    ..
                }) if self.version == Version::V1 => break,
                Err(e) => return Err(e),
            };

            if next.value == Value::EndOfMibView || !next.oid.starts_with(root) {
                break;
            }
            if next.oid <= cursor {
                return Err(ClientError::UnexpectedResponse(format!(
                    "OID {} does not increase after {}",
                    next.oid, cursor
                )));
            }

            cursor = next.oid.clone();
            bindings.push(next);
        }

        Ok(bindings)
    }

    #[instrument(skip(self, oids), fields(target = %self.target, oids = oids.len()))]
    async fn request(&self, kind: PduKind, oids: &[Oid]) -> Result<Vec<VarBind>, ClientError> {
        let request_id = next_request_id();
        let request = SnmpMessage::new(
            self.version,
            self.community.clone(),
            Pdu::request(kind, request_id, oids),
        );

        let socket = UdpSocket::bind(unspecified_for(self.target)).await?;
        socket.connect(self.target).await?;
        socket.send(&request.encode()).await?;
        trace!("Sent {}", request);

        let response = time::timeout(self.timeout, await_response(&socket, request_id))
            .await
            .map_err(|_| ClientError::Timeout {
                target: self.target,
                timeout: self.timeout,
            })??;

        match response.pdu.error_status {
            ErrorStatus::NoError => Ok(response.pdu.varbinds),
            status => Err(ClientError::ErrorStatus {
                status,
                index: response.pdu.error_index,
            }),
        }
    }
}

/// Waits for the Response carrying `request_id`, skipping late answers to earlier requests.
async fn await_response(socket: &UdpSocket, request_id: i32) -> Result<SnmpMessage, ClientError> {
    let mut buf = vec![0_u8; MAX_DATAGRAM_SIZE];
    loop {
        let n = socket.recv(&mut buf).await?;
        let message = SnmpMessage::decode(&buf[..n])?;
        if message.pdu.kind == PduKind::Response && message.pdu.request_id == request_id {
            trace!("Received {}", message);
            return Ok(message);
        }
        debug!(
            "Ignoring {} with request id {} while waiting for {}",
            message.pdu.kind, message.pdu.request_id, request_id
        );
    }
}

fn next_request_id() -> i32 {
    rand::thread_rng().gen_range(1..i32::MAX)
}

fn unspecified_for(target: SocketAddr) -> SocketAddr {
    match target {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    }
}
