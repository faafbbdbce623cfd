use crate::auth::Community;
use crate::mib::MibRegistryRef;
use crate::protocol::{handler, MAX_DATAGRAM_SIZE};
use std::io;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Answers SNMP requests from the [`MibRegistry`](crate::mib::MibRegistry), one datagram at a
/// time.
#[derive(Debug)]
pub struct SnmpResponder {
    socket: UdpSocket,
    mib: MibRegistryRef,
    community: Community,
}

impl SnmpResponder {
    pub async fn bind(
        addr: SocketAddr,
        mib: MibRegistryRef,
        community: Community,
    ) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(SnmpResponder {
            socket,
            mib,
            community,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub async fn run(self) -> io::Result<()> {
        info!("SNMP responder listening on udp://{}", self.local_addr()?);

        let mut buf = vec![0_u8; MAX_DATAGRAM_SIZE];

        loop {
            match self.socket.recv_from(&mut buf).await {
                Ok((n, peer)) => {
                    debug!("Received {} bytes from {}", n, peer);

                    let Some(response) = handler::respond(&buf[..n], &self.mib, &self.community)
                    else {
                        continue;
                    };

                    match self.socket.send_to(&response, peer).await {
                        Ok(_) => debug!("Response of {} bytes sent to {}", response.len(), peer),
                        Err(e) => warn!("Failed to send response to {}: {:?}", peer, e),
                    }
                }
                // ICMP errors from earlier sends surface here on some platforms
                Err(e) => error!("Error receiving data: {:?}", e),
            }
        }
    }

    pub fn spawn(self) -> JoinHandle<io::Result<()>> {
        tokio::spawn(self.run())
    }
}
