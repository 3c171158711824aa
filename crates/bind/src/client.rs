//! Client bind: dials peers on first send and stamps the reserved tag

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use wgstream_core::{BindError, Dialer, ReservedTag, Result};

use crate::bind::{Bind, NetBind, ReceiveFunc};
use crate::endpoint::Connection;
use crate::{forward, Endpoint};

pub struct ClientBind {
    base: NetBind,
    dialer: Arc<dyn Dialer>,
    reserved: Option<ReservedTag>,
}

impl ClientBind {
    /// Fails with `BindError::Config` unless `reserved` is empty or exactly
    /// three bytes.
    pub fn new(base: NetBind, dialer: Arc<dyn Dialer>, reserved: &[u8]) -> Result<Self> {
        Ok(Self {
            base,
            dialer,
            reserved: ReservedTag::from_slice(reserved)?,
        })
    }

    pub fn reserved(&self) -> Option<ReservedTag> {
        self.reserved
    }

    /// Existing connection of `endpoint`, dialing one if there is none
    async fn connection(&self, endpoint: &Arc<Endpoint>) -> Result<Arc<Connection>> {
        let mut slot = endpoint.slot().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }

        let queue = self.base.queue()?;
        let stream = self
            .dialer
            .dial(endpoint.destination())
            .await
            .map_err(BindError::Dial)?;
        debug!("Connected to {}", endpoint.dst_to_string());

        let (reader, writer) = tokio::io::split(stream);
        let conn = Connection::new(writer);
        *slot = Some(conn.clone());
        forward::spawn(queue, endpoint.clone(), conn.clone(), reader, true);

        Ok(conn)
    }
}

#[async_trait]
impl Bind for ClientBind {
    async fn parse_endpoint(&self, s: &str) -> Result<Arc<Endpoint>> {
        self.base.parse_endpoint(s).await
    }

    fn open(&self, port: u16) -> Result<(Vec<ReceiveFunc>, u16)> {
        self.base.open(port)
    }

    async fn send(&self, buf: &mut [u8], endpoint: &Arc<Endpoint>) -> Result<()> {
        let conn = self.connection(endpoint).await?;

        if let Some(tag) = &self.reserved {
            tag.stamp(buf);
        }

        conn.write(buf).await.map_err(BindError::Write)
    }

    fn close(&self) -> Result<()> {
        self.base.close()
    }
}
