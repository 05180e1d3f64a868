use crate::{
    config::BoundConfig,
    dns::{Query, encode_response},
    error::{ConfigError, Result},
    resolver::DnsResolver,
    target::ResolvedTarget,
};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{Semaphore, broadcast};
use tokio::time::timeout;
use tracing::{debug, error, info, trace, warn};

/// How long `run` waits for in-flight queries after the shutdown signal
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// UDP responder owning its listening sockets.
///
/// Each datagram is decoded on the receive loop and then resolved, encoded
/// and answered in its own task, so a slow upstream lookup never blocks
/// other clients. The number of such tasks is bounded.
#[derive(Debug)]
pub struct Server {
    socket: Arc<UdpSocket>,
    raw_socket: Option<Arc<UdpSocket>>,
    resolver: Arc<DnsResolver>,
    query_semaphore: Arc<Semaphore>,
    max_concurrent_queries: u32,
    recv_buffer_size: usize,
}

impl Server {
    /// Bind the datagram socket and, if configured, the raw capture socket
    pub async fn bind(config: &BoundConfig, resolver: Arc<DnsResolver>) -> Result<Self> {
        config.validate()?;
        let max_concurrent_queries = u32::try_from(config.max_concurrent_queries).map_err(|_| {
            ConfigError::InvalidConcurrency(config.max_concurrent_queries.to_string())
        })?;

        let socket = UdpSocket::bind(config.bind_addr).await?;
        let local_addr = socket.local_addr()?;
        info!("UDP DNS server listening on {}", local_addr);

        let raw_socket = if config.raw_socket {
            let raw = bind_raw_udp(local_addr)?;
            info!("Raw UDP capture socket bound on {}", local_addr);
            Some(Arc::new(raw))
        } else {
            None
        };

        Ok(Self {
            socket: Arc::new(socket),
            raw_socket,
            resolver,
            query_semaphore: Arc::new(Semaphore::new(max_concurrent_queries as usize)),
            max_concurrent_queries,
            recv_buffer_size: config.recv_buffer_size,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Serve until a shutdown signal arrives, then wait for in-flight queries
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let mut buf = vec![0u8; self.recv_buffer_size];
        let mut raw_buf = vec![0u8; self.recv_buffer_size];

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("UDP server received shutdown signal");
                    break;
                }

                result = self.socket.recv_from(&mut buf) => {
                    self.dispatch(&self.socket, result, &buf, "udp");
                }

                result = recv_optional(self.raw_socket.as_deref(), &mut raw_buf) => {
                    if let Some(raw) = &self.raw_socket {
                        self.dispatch(raw, result, &raw_buf, "raw");
                    }
                }
            }
        }

        self.drain().await;
        info!("UDP server shutdown complete");
        Ok(())
    }

    fn dispatch(
        &self,
        socket: &Arc<UdpSocket>,
        result: io::Result<(usize, SocketAddr)>,
        buf: &[u8],
        protocol: &'static str,
    ) {
        let (read_bytes, src_addr) = match result {
            Ok(received) => received,
            Err(e) => {
                // ICMP errors from earlier sends surface here; keep serving
                warn!("Failed to receive on {} socket: {}", protocol, e);
                return;
            }
        };

        if should_discard(&src_addr) {
            trace!("Discarding {} datagram from {} with source port 0", protocol, src_addr);
            return;
        }

        let permit = match self.query_semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!("Max concurrent queries reached, dropping query from {}", src_addr);
                return;
            }
        };

        let query_data = buf[..read_bytes].to_vec();
        let resolver = self.resolver.clone();
        let socket = socket.clone();

        tokio::spawn(async move {
            let _permit = permit;
            if let Some(response) = handle_datagram(&query_data, &resolver, src_addr).await {
                if let Err(e) = socket.send_to(&response, src_addr).await {
                    error!("Failed to send {} response to {}: {:?}", protocol, src_addr, e);
                }
            }
        });
    }

    async fn drain(&self) {
        let all = self.max_concurrent_queries;
        match timeout(DRAIN_TIMEOUT, self.query_semaphore.acquire_many(all)).await {
            Ok(Ok(_permits)) => debug!("All in-flight queries completed"),
            Ok(Err(e)) => warn!("Query semaphore closed during drain: {}", e),
            Err(_) => warn!(
                "{} queries still in flight after {:?}",
                all as usize - self.query_semaphore.available_permits(),
                DRAIN_TIMEOUT
            ),
        }
    }
}

/// Datagrams claiming source port 0 cannot be answered
pub(crate) fn should_discard(src_addr: &SocketAddr) -> bool {
    src_addr.port() == 0
}

/// Decode, resolve and encode one datagram.
///
/// Returns `None` when the datagram should be dropped without a reply.
pub async fn handle_datagram(
    data: &[u8],
    resolver: &DnsResolver,
    src_addr: SocketAddr,
) -> Option<Vec<u8>> {
    let query = match Query::decode(data) {
        Ok(query) => query,
        Err(e) => {
            debug!("Malformed packet from {} ({} bytes): {}", src_addr, data.len(), e);
            return None;
        }
    };

    if query.header.is_response() {
        debug!("Ignoring DNS response from {}", src_addr);
        return None;
    }

    debug!("Request: {} {} {}", src_addr, query.qtype, query.domain());
    let target = resolver.resolve(&query).await;
    debug!("Answer: {} {}", target, query.domain());

    match encode_response(&query, &target) {
        Ok(response) => Some(response),
        Err(e) => {
            warn!("Failed to encode answer {} for {}: {}", target, query.domain(), e);
            encode_response(&query, &ResolvedTarget::NotFound).ok()
        }
    }
}

async fn recv_optional(
    socket: Option<&UdpSocket>,
    buf: &mut [u8],
) -> io::Result<(usize, SocketAddr)> {
    match socket {
        Some(socket) => socket.recv_from(buf).await,
        None => std::future::pending().await,
    }
}

/// Raw IPPROTO_UDP socket on the same address as the datagram socket.
///
/// The kernel reports the peer of a raw socket without a port, so anything
/// read here falls to the source-port filter unless the platform fills it in.
fn bind_raw_udp(addr: SocketAddr) -> io::Result<UdpSocket> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };
    let socket = Socket::new(domain, Type::RAW, Some(Protocol::UDP))?;
    socket.bind(&addr.into())?;
    socket.set_nonblocking(true)?;
    UdpSocket::from_std(socket.into())
}
