//! Server bind: sends over connections handed in by an accept loop

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use wgstream_core::{BindError, BoxConn, Result};

use crate::bind::{Bind, NetBind, ReceiveFunc};
use crate::endpoint::Connection;
use crate::{forward, Endpoint};

pub struct ServerBind {
    base: NetBind,
}

impl ServerBind {
    pub fn new(base: NetBind) -> Self {
        Self { base }
    }

    /// Attach an accepted stream to `endpoint` and start forwarding its
    /// datagrams to the engine's workers. Reserved bytes pass through as
    /// received.
    ///
    /// The bind must be open. A connection already attached to the endpoint
    /// is replaced.
    pub async fn attach(&self, endpoint: &Arc<Endpoint>, stream: BoxConn) -> Result<()> {
        let queue = self.base.queue()?;
        let (reader, writer) = tokio::io::split(stream);
        let conn = Connection::new(writer);

        let mut slot = endpoint.slot().await;
        if slot.replace(conn.clone()).is_some() {
            debug!("Replacing connection for {}", endpoint.dst_to_string());
        }
        forward::spawn(queue, endpoint.clone(), conn, reader, false);

        Ok(())
    }
}

#[async_trait]
impl Bind for ServerBind {
    async fn parse_endpoint(&self, s: &str) -> Result<Arc<Endpoint>> {
        self.base.parse_endpoint(s).await
    }

    fn open(&self, port: u16) -> Result<(Vec<ReceiveFunc>, u16)> {
        self.base.open(port)
    }

    async fn send(&self, buf: &mut [u8], endpoint: &Arc<Endpoint>) -> Result<()> {
        let conn = endpoint.current().await.ok_or(BindError::NotConnected)?;
        conn.write(buf).await.map_err(BindError::Write)
    }

    fn close(&self) -> Result<()> {
        self.base.close()
    }
}
