//! Per-endpoint forwarding task
//!
//! One task per live connection. It pops worker requests off the dispatch
//! queue, reads the next chunk of the endpoint's stream into each, and
//! reports the result back to that worker.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, ReadHalf};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use wgstream_core::{BindError, BoxConn, ReservedTag};

use crate::endpoint::Connection;
use crate::queue::DispatchQueue;
use crate::Endpoint;

/// Start forwarding reads from `reader` to workers waiting on `queue`.
///
/// With `strip_reserved` set, the reserved field of every datagram longer
/// than three bytes is zeroed before it reaches the worker.
pub(crate) fn spawn(
    queue: Arc<DispatchQueue>,
    endpoint: Arc<Endpoint>,
    conn: Arc<Connection>,
    reader: ReadHalf<BoxConn>,
    strip_reserved: bool,
) -> JoinHandle<()> {
    tokio::spawn(forward(queue, endpoint, conn, reader, strip_reserved))
}

async fn forward(
    queue: Arc<DispatchQueue>,
    endpoint: Arc<Endpoint>,
    conn: Arc<Connection>,
    mut reader: ReadHalf<BoxConn>,
    strip_reserved: bool,
) {
    debug!("Forwarder started for {}", endpoint.dst_to_string());

    loop {
        let Some(mut request) = queue.pop().await else {
            debug!("Dispatch queue closed, forwarder for {} exiting", endpoint.dst_to_string());
            endpoint.detach(&conn).await;
            return;
        };

        let (result, ended) = match reader.read(&mut request.buf).await {
            Ok(0) if !request.buf.is_empty() => (Err(BindError::StreamEnd), true),
            Ok(n) => {
                if strip_reserved {
                    ReservedTag::clear(&mut request.buf[..n]);
                }
                (Ok((n, endpoint.clone())), false)
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => (Err(BindError::StreamEnd), true),
            Err(e) => {
                warn!("Read from {} failed: {}", endpoint.dst_to_string(), e);
                (Err(BindError::Read(e)), false)
            }
        };

        if ended {
            // Slot is empty before the worker learns of the end, so its
            // next send redials.
            debug!("Stream to {} ended", endpoint.dst_to_string());
            endpoint.detach(&conn).await;
            request.complete(result);
            return;
        }

        request.complete(result);
    }
}
