//! In-memory hunk transport
//!
//! [`pair`] returns two connected ends; hunks sent on one are received on
//! the other. Closing (or dropping) one end finishes the other's stream,
//! like a half-closed RPC call.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Sink, Stream};
use tokio::sync::mpsc;

use crate::Hunk;

pub struct HunkChannel {
    rx: mpsc::UnboundedReceiver<Hunk>,
    tx: Option<mpsc::UnboundedSender<Hunk>>,
}

/// Two connected hunk transports
pub fn pair() -> (HunkChannel, HunkChannel) {
    let (a_tx, b_rx) = mpsc::unbounded_channel();
    let (b_tx, a_rx) = mpsc::unbounded_channel();
    (
        HunkChannel {
            rx: a_rx,
            tx: Some(a_tx),
        },
        HunkChannel {
            rx: b_rx,
            tx: Some(b_tx),
        },
    )
}

fn send_closed() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "hunk channel send side closed")
}

impl Stream for HunkChannel {
    type Item = io::Result<Hunk>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx).map(|hunk| hunk.map(Ok))
    }
}

impl Sink<Hunk> for HunkChannel {
    type Error = io::Error;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &self.tx {
            Some(tx) if !tx.is_closed() => Poll::Ready(Ok(())),
            _ => Poll::Ready(Err(send_closed())),
        }
    }

    fn start_send(self: Pin<&mut Self>, hunk: Hunk) -> io::Result<()> {
        let tx = self.get_mut().tx.as_ref().ok_or_else(send_closed)?;
        tx.send(hunk).map_err(|_| send_closed())
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().tx = None;
        Poll::Ready(Ok(()))
    }
}
