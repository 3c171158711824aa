//! Shared bind state: endpoint parsing, the dispatch queue lifecycle, and
//! the receive functions handed to the tunnel engine.

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use wgstream_core::{BindError, Destination, IpOption, Resolver, Result};

use crate::queue::{DispatchQueue, ReadRequest};
use crate::Endpoint;

/// Transport binding consumed by the tunnel engine
#[async_trait]
pub trait Bind: Send + Sync {
    /// Resolve `host:port` into an endpoint. Never dials.
    async fn parse_endpoint(&self, s: &str) -> Result<Arc<Endpoint>>;

    /// Create the dispatch queue and one receive function per worker.
    /// No local port is bound; `port` is echoed back.
    fn open(&self, port: u16) -> Result<(Vec<ReceiveFunc>, u16)>;

    async fn send(&self, buf: &mut [u8], endpoint: &Arc<Endpoint>) -> Result<()>;

    /// Close the dispatch queue. Calling it again is a no-op.
    fn close(&self) -> Result<()>;

    /// Socket marks have no meaning over dialed streams
    fn set_mark(&self, _mark: u32) -> Result<()> {
        Ok(())
    }
}

/// One engine worker's handle for receiving datagrams.
///
/// `recv` takes `&mut self`, so each worker has at most one read in flight.
pub struct ReceiveFunc {
    queue: Arc<DispatchQueue>,
    scratch: Vec<u8>,
}

impl ReceiveFunc {
    /// Wait until some forwarding task fills `buf`.
    ///
    /// Returns the number of bytes read and the endpoint they came from, or
    /// `BindError::Closed` once the bind is closed.
    pub async fn recv(&mut self, buf: &mut [u8]) -> Result<(usize, Arc<Endpoint>)> {
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        scratch.resize(buf.len(), 0);

        let (request, waiter) = ReadRequest::new(scratch);
        self.queue.push(request).await?;

        let completion = tokio::select! {
            biased;
            completion = waiter => completion.map_err(|_| BindError::Closed)?,
            _ = self.queue.closed() => return Err(BindError::Closed),
        };

        let result = completion.result.map(|(n, endpoint)| {
            buf[..n].copy_from_slice(&completion.buf[..n]);
            (n, endpoint)
        });
        self.scratch = completion.buf;
        result
    }
}

/// State shared by the client and server binds
pub struct NetBind {
    resolver: Arc<dyn Resolver>,
    ip_option: IpOption,
    workers: usize,
    queue: Mutex<Option<Arc<DispatchQueue>>>,
}

impl NetBind {
    pub fn new(resolver: Arc<dyn Resolver>, ip_option: IpOption, workers: usize) -> Self {
        Self {
            resolver,
            ip_option,
            workers,
            queue: Mutex::new(None),
        }
    }

    /// Number of receive functions `open` hands out
    pub fn workers(&self) -> usize {
        self.workers.max(1)
    }

    pub fn is_open(&self) -> bool {
        self.queue.lock().as_ref().is_some_and(|q| !q.is_closed())
    }

    pub async fn parse_endpoint(&self, s: &str) -> Result<Arc<Endpoint>> {
        let (host, port) = split_host_port(s)?;
        let port: u16 = port
            .parse()
            .map_err(|_| BindError::Address(format!("invalid port {:?} in {:?}", port, s)))?;

        let ip = match host.parse::<IpAddr>() {
            Ok(ip) => ip,
            Err(_) => self.resolve(host).await?,
        };

        Ok(Arc::new(Endpoint::new(Destination::udp((ip, port).into()))))
    }

    async fn resolve(&self, domain: &str) -> Result<IpAddr> {
        let ips = self
            .resolver
            .lookup_ip(domain, self.ip_option)
            .await
            .map_err(|e| BindError::Resolution {
                domain: domain.to_string(),
                reason: e.to_string(),
            })?;

        let ip = ips.first().copied().ok_or_else(|| BindError::Resolution {
            domain: domain.to_string(),
            reason: "empty response".to_string(),
        })?;
        debug!("Resolved {} to {}", domain, ip);
        Ok(ip)
    }

    pub fn open(&self, port: u16) -> Result<(Vec<ReceiveFunc>, u16)> {
        let queue = DispatchQueue::new();
        if let Some(previous) = self.queue.lock().replace(queue.clone()) {
            previous.close();
        }

        let funcs = (0..self.workers())
            .map(|_| ReceiveFunc {
                queue: queue.clone(),
                scratch: Vec::new(),
            })
            .collect();

        debug!("Bind opened with {} workers", self.workers());
        Ok((funcs, port))
    }

    pub fn close(&self) -> Result<()> {
        if let Some(queue) = self.queue.lock().take() {
            if queue.close() {
                debug!("Bind closed");
            }
        }
        Ok(())
    }

    /// The open queue, for wiring up a new forwarding task
    pub(crate) fn queue(&self) -> Result<Arc<DispatchQueue>> {
        self.queue
            .lock()
            .as_ref()
            .filter(|q| !q.is_closed())
            .cloned()
            .ok_or(BindError::Closed)
    }
}

/// Split `host:port`, accepting bracketed IPv6 hosts
fn split_host_port(s: &str) -> Result<(&str, &str)> {
    let missing_port = || BindError::Address(format!("missing port in address {:?}", s));

    let (host, port) = if let Some(rest) = s.strip_prefix('[') {
        let (host, after) = rest
            .split_once(']')
            .ok_or_else(|| BindError::Address(format!("missing ']' in address {:?}", s)))?;
        let port = after.strip_prefix(':').ok_or_else(missing_port)?;
        (host, port)
    } else {
        let (host, port) = s.rsplit_once(':').ok_or_else(missing_port)?;
        if host.contains(':') {
            return Err(BindError::Address(format!("too many colons in address {:?}", s)));
        }
        (host, port)
    };

    if host.is_empty() {
        return Err(BindError::Address(format!("missing host in address {:?}", s)));
    }
    Ok((host, port))
}
