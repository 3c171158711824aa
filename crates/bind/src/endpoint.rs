//! Tunnel peer endpoints
//!
//! An endpoint is a resolved destination plus, once dialed or attached, the
//! write half of a live stream to it. The read half belongs to the
//! forwarding task spawned alongside, which is also the only place the
//! connection gets cleared.

use std::io;
use std::net::IpAddr;
use std::sync::Arc;

use tokio::io::{AsyncWriteExt, WriteHalf};
use tokio::sync::{Mutex, MutexGuard};

use wgstream_core::{BoxConn, Destination};

/// Write side of an endpoint's stream
pub(crate) struct Connection {
    writer: Mutex<WriteHalf<BoxConn>>,
}

impl Connection {
    pub fn new(writer: WriteHalf<BoxConn>) -> Arc<Self> {
        Arc::new(Self {
            writer: Mutex::new(writer),
        })
    }

    /// Write the whole buffer as one unit
    pub async fn write(&self, buf: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(buf).await?;
        writer.flush().await
    }
}

pub struct Endpoint {
    dst: Destination,
    conn: Mutex<Option<Arc<Connection>>>,
}

impl Endpoint {
    pub fn new(dst: Destination) -> Self {
        Self {
            dst,
            conn: Mutex::new(None),
        }
    }

    pub fn destination(&self) -> Destination {
        self.dst
    }

    /// Address bytes followed by the port, low byte first
    pub fn dst_to_bytes(&self) -> Vec<u8> {
        self.dst.to_bytes()
    }

    pub fn dst_to_string(&self) -> String {
        self.dst.net_addr()
    }

    /// Source addressing is not tracked; always unset.
    pub fn src_ip(&self) -> Option<IpAddr> {
        None
    }

    pub fn src_to_string(&self) -> String {
        String::new()
    }

    pub fn clear_src(&self) {}

    pub async fn is_connected(&self) -> bool {
        self.conn.lock().await.is_some()
    }

    /// Lock the connection slot. Dialing happens while this is held so two
    /// senders never race to open two streams.
    pub(crate) async fn slot(&self) -> MutexGuard<'_, Option<Arc<Connection>>> {
        self.conn.lock().await
    }

    pub(crate) async fn current(&self) -> Option<Arc<Connection>> {
        self.conn.lock().await.clone()
    }

    /// Clear the slot if it still holds `conn`. A newer connection installed
    /// in the meantime is left alone.
    pub(crate) async fn detach(&self, conn: &Arc<Connection>) -> bool {
        let mut slot = self.conn.lock().await;
        match slot.as_ref() {
            Some(current) if Arc::ptr_eq(current, conn) => {
                *slot = None;
                true
            }
            _ => false,
        }
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint").field("dst", &self.dst).finish()
    }
}
