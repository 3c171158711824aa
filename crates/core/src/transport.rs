//! Capabilities the adapters consume: a dialer producing byte streams and a
//! resolver for peer domain names.

use std::io;
use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::debug;

use crate::{Destination, IpOption};

/// Default time allowed for a TCP connect
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A bidirectional byte stream to a peer
pub trait Conn: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Conn for T {}

pub type BoxConn = Box<dyn Conn>;

/// Opens streams to peer destinations
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, destination: Destination) -> io::Result<BoxConn>;
}

/// Looks up the addresses of a domain name
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn lookup_ip(&self, domain: &str, option: IpOption) -> io::Result<Vec<IpAddr>>;
}

/// Dials plain TCP streams regardless of the destination's network marker
#[derive(Debug, Clone)]
pub struct TcpDialer {
    connect_timeout: Duration,
}

impl TcpDialer {
    pub fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_timeout(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for TcpDialer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    async fn dial(&self, destination: Destination) -> io::Result<BoxConn> {
        let stream = tokio::time::timeout(
            self.connect_timeout,
            TcpStream::connect(destination.address),
        )
        .await
        .map_err(|_| {
            io::Error::new(
                io::ErrorKind::TimedOut,
                format!("connect to {} timed out", destination.address),
            )
        })??;

        stream.set_nodelay(true)?;
        debug!("Dialed {}", destination.address);
        Ok(Box::new(stream))
    }
}

/// Resolver backed by the operating system's lookup
#[derive(Debug, Clone, Default)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn lookup_ip(&self, domain: &str, option: IpOption) -> io::Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((domain, 0)).await?;
        let mut ips: Vec<IpAddr> = Vec::new();
        for ip in addrs.map(|addr| addr.ip()) {
            if option.allows(&ip) && !ips.contains(&ip) {
                ips.push(ip);
            }
        }
        Ok(ips)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_dialer_connects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4];
            stream.read_exact(&mut buf).await.unwrap();
            buf
        });

        let mut conn = TcpDialer::new().dial(Destination::udp(addr)).await.unwrap();
        conn.write_all(b"ping").await.unwrap();

        assert_eq!(&accept.await.unwrap(), b"ping");
    }

    #[tokio::test]
    async fn test_tcp_dialer_refused() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = TcpDialer::new().dial(Destination::udp(addr)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_system_resolver_filters_family() {
        let resolver = SystemResolver;
        let ips = resolver.lookup_ip("127.0.0.1", IpOption::ipv4_only()).await.unwrap();
        assert_eq!(ips, vec![IpAddr::from([127, 0, 0, 1])]);

        let ips = resolver.lookup_ip("127.0.0.1", IpOption::ipv6_only()).await.unwrap();
        assert!(ips.is_empty());
    }
}
