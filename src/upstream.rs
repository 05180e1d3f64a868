use crate::config::BoundConfig;
use crate::dns::{
    constants::DNSRcode,
    enums::QueryType,
    message::{ResponseMessage, build_request},
};
use crate::error::ResolveError;
use async_trait::async_trait;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

/// Resolver consulted when the cache has no answer
#[async_trait]
pub trait Upstream: Send + Sync {
    /// All IPv4 addresses for `domain`, in the order the server returned them
    async fn resolve_a(&self, domain: &str) -> Result<Vec<Ipv4Addr>, ResolveError>;

    /// Name for a dotted IPv4 `address` via its `in-addr.arpa` PTR record
    async fn resolve_ptr(&self, address: &str) -> Result<String, ResolveError>;
}

/// Upstream client speaking plain DNS over UDP
#[derive(Debug, Clone)]
pub struct UdpUpstream {
    servers: Vec<SocketAddr>,
    timeout: Duration,
    max_retries: u8,
}

impl UdpUpstream {
    pub fn new(servers: Vec<SocketAddr>, timeout: Duration, max_retries: u8) -> Self {
        Self {
            servers,
            timeout,
            max_retries,
        }
    }

    pub fn from_config(config: &BoundConfig) -> Self {
        Self::new(
            config.upstream_servers.clone(),
            config.upstream_timeout,
            config.max_retries,
        )
    }

    /// Ask each server in turn until one gives a usable answer
    async fn query(&self, name: &str, qtype: QueryType) -> Result<ResponseMessage, ResolveError> {
        let mut last_error = ResolveError::NoServers;

        for &server in &self.servers {
            match self.query_server(name, qtype, server).await {
                Ok(response) => match response.header.rcode() {
                    DNSRcode::NOERROR => return Ok(response),
                    // A name error is authoritative; other servers will agree
                    DNSRcode::NXDOMAIN => return Err(ResolveError::NoRecords),
                    rcode => {
                        debug!("Upstream {} answered {} {} with rcode {}", server, name, qtype, rcode);
                        last_error = ResolveError::ServerFailure(rcode);
                    }
                },
                Err(e) => {
                    warn!("Upstream {} failed for {} {}: {}", server, name, qtype, e);
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    /// Send one query to `server`, retrying with a growing delay
    async fn query_server(
        &self,
        name: &str,
        qtype: QueryType,
        server: SocketAddr,
    ) -> Result<ResponseMessage, ResolveError> {
        for retry in 0..=self.max_retries {
            let id = rand::random::<u16>();
            let request = build_request(id, name, qtype)?;
            trace!("Sending {} bytes to upstream {}", request.len(), server);

            match self.send_query_with_timeout(&request, id, server).await {
                Ok(response) => {
                    if retry > 0 {
                        debug!("Query succeeded on retry {}", retry);
                    }
                    return Ok(response);
                }
                Err(e) if retry < self.max_retries => {
                    debug!("Query attempt {} failed, retrying: {}", retry + 1, e);
                    tokio::time::sleep(Duration::from_millis(100 * (retry as u64 + 1))).await;
                }
                Err(e) => return Err(e),
            }
        }

        unreachable!("Loop should have returned")
    }

    async fn send_query_with_timeout(
        &self,
        request: &[u8],
        id: u16,
        server: SocketAddr,
    ) -> Result<ResponseMessage, ResolveError> {
        timeout(self.timeout, self.send_udp_query(request, id, server))
            .await
            .map_err(|_| ResolveError::Timeout)?
    }

    async fn send_udp_query(
        &self,
        request: &[u8],
        id: u16,
        server: SocketAddr,
    ) -> Result<ResponseMessage, ResolveError> {
        let local: SocketAddr = if server.is_ipv4() {
            (std::net::Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(server).await?;
        socket.send(request).await?;

        let mut response_buf = vec![0u8; 4096];
        loop {
            let len = socket.recv(&mut response_buf).await?;
            trace!(
                "Raw UDP response data ({} bytes): {:02x?}",
                len,
                &response_buf[..len.min(64)]
            );

            let response = match ResponseMessage::parse(&response_buf[..len]) {
                Ok(response) => response,
                Err(e) => {
                    debug!("Ignoring unparseable upstream datagram from {}: {}", server, e);
                    continue;
                }
            };
            if response.header.id != id || !response.header.is_response() {
                // Stray or spoofed datagram; keep waiting until the timeout
                debug!("Ignoring upstream datagram with id {}", response.header.id);
                continue;
            }
            debug!(
                "Parsed upstream response: rcode={}, answers={}",
                response.header.rcode(),
                response.answers.len()
            );
            return Ok(response);
        }
    }
}

#[async_trait]
impl Upstream for UdpUpstream {
    async fn resolve_a(&self, domain: &str) -> Result<Vec<Ipv4Addr>, ResolveError> {
        let addresses = self.query(domain, QueryType::A).await?.addresses();
        if addresses.is_empty() {
            return Err(ResolveError::NoRecords);
        }
        Ok(addresses)
    }

    async fn resolve_ptr(&self, address: &str) -> Result<String, ResolveError> {
        let reverse = reverse_name(address)?;
        self.query(&reverse, QueryType::PTR)
            .await?
            .ptr_names()
            .into_iter()
            .next()
            .ok_or(ResolveError::NoRecords)
    }
}

/// `a.b.c.d` -> `d.c.b.a.in-addr.arpa`
pub fn reverse_name(address: &str) -> Result<String, ResolveError> {
    let addr: Ipv4Addr = address
        .parse()
        .map_err(|_| ResolveError::Malformed(format!("not an IPv4 address: {}", address)))?;
    let [a, b, c, d] = addr.octets();
    Ok(format!("{}.{}.{}.{}.in-addr.arpa", d, c, b, a))
}
