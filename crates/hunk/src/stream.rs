//! Byte stream over a hunk transport
//!
//! Reads drain the most recently fetched hunk before pulling the next one.
//! Writes never split: one call, one hunk.

use std::future::poll_fn;
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::Bytes;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tracing::debug;

use crate::{Hunk, HunkError, Result};

/// Size of the buffers the bulk read path hands out. A hunk of exactly this
/// size is passed through without copying.
pub const POOL_BUFFER_SIZE: usize = 8192;

/// RPC stream carrying hunks in both directions.
///
/// The stream side yields received hunks and ends when the peer finishes;
/// `Sink::poll_close` half-closes the send direction where the transport
/// supports it.
pub trait HunkTransport:
    Stream<Item = io::Result<Hunk>> + Sink<Hunk, Error = io::Error> + Unpin
{
}

impl<T> HunkTransport for T where
    T: Stream<Item = io::Result<Hunk>> + Sink<Hunk, Error = io::Error> + Unpin
{
}

type CancelFn = Box<dyn FnOnce() + Send>;

pub struct HunkStream<S> {
    inner: S,
    cancel: Option<CancelFn>,
    /// Payload of the last fetched hunk
    buf: Bytes,
    /// How much of `buf` has been handed out
    index: usize,
    closed: bool,
}

impl<S: HunkTransport> HunkStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            cancel: None,
            buf: Bytes::new(),
            index: 0,
            closed: false,
        }
    }

    /// `cancel` aborts the RPC call owning `inner`; it runs on the first close.
    pub fn with_cancel(inner: S, cancel: impl FnOnce() + Send + 'static) -> Self {
        let mut stream = Self::new(inner);
        stream.cancel = Some(Box::new(cancel));
        stream
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Read into `buf`, fetching the next hunk when the current one is used up
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        poll_fn(|cx| self.poll_read_slice(cx, &mut *buf)).await
    }

    /// Read one pool-sized batch.
    ///
    /// An unread hunk of exactly [`POOL_BUFFER_SIZE`] bytes is returned as
    /// is, sharing its allocation. Anything else is copied into a fresh
    /// buffer of at most that size.
    pub async fn read_multi_buffer(&mut self) -> Result<Bytes> {
        poll_fn(|cx| self.poll_fetch(cx)).await?;

        if self.index == 0 && self.buf.len() == POOL_BUFFER_SIZE {
            self.index = self.buf.len();
            return Ok(self.buf.clone());
        }

        let mut out = vec![0u8; POOL_BUFFER_SIZE];
        let mut filled = 0;
        while filled < out.len() && self.index < self.buf.len() {
            filled += self.copy_out(&mut out[filled..]);
        }
        out.truncate(filled);
        Ok(Bytes::from(out))
    }

    /// Send `buf` as a single hunk
    pub async fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if self.closed {
            return Err(HunkError::Closed);
        }
        self.inner
            .send(Hunk::new(Bytes::copy_from_slice(buf)))
            .await
            .map_err(HunkError::Write)?;
        Ok(buf.len())
    }

    /// Cancel the owning call and half-close the transport. Later calls do
    /// nothing.
    pub async fn close(&mut self) -> Result<()> {
        poll_fn(|cx| self.poll_close_inner(cx)).await
    }

    fn poll_fetch(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        // Empty hunks carry nothing to read; skip them so a successful read
        // never looks like end of stream.
        while self.index >= self.buf.len() {
            match ready!(self.inner.poll_next_unpin(cx)) {
                Some(Ok(hunk)) => {
                    self.buf = hunk.data;
                    self.index = 0;
                }
                Some(Err(e)) => return Poll::Ready(Err(HunkError::Read(e))),
                None => return Poll::Ready(Err(HunkError::StreamEnd)),
            }
        }
        Poll::Ready(Ok(()))
    }

    fn poll_read_slice(&mut self, cx: &mut Context<'_>, dst: &mut [u8]) -> Poll<Result<usize>> {
        if dst.is_empty() {
            return Poll::Ready(Ok(0));
        }
        ready!(self.poll_fetch(cx))?;
        Poll::Ready(Ok(self.copy_out(dst)))
    }

    fn copy_out(&mut self, dst: &mut [u8]) -> usize {
        let available = &self.buf[self.index..];
        let n = available.len().min(dst.len());
        dst[..n].copy_from_slice(&available[..n]);
        self.index += n;
        n
    }

    fn poll_write_hunk(&mut self, cx: &mut Context<'_>, data: &[u8]) -> Poll<Result<usize>> {
        if self.closed {
            return Poll::Ready(Err(HunkError::Closed));
        }
        ready!(self.inner.poll_ready_unpin(cx)).map_err(HunkError::Write)?;
        self.inner
            .start_send_unpin(Hunk::new(Bytes::copy_from_slice(data)))
            .map_err(HunkError::Write)?;
        Poll::Ready(Ok(data.len()))
    }

    fn poll_close_inner(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
        if self.closed {
            return Poll::Ready(Ok(()));
        }

        let result = ready!(self.inner.poll_close_unpin(cx));
        self.closed = true;
        debug!("Hunk stream closed");
        Poll::Ready(result.map_err(HunkError::Write))
    }
}

impl<S: HunkTransport> AsyncRead for HunkStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        match ready!(this.poll_fetch(cx)) {
            Ok(()) => {}
            // End of the RPC stream is a clean EOF for byte readers
            Err(HunkError::StreamEnd) => return Poll::Ready(Ok(())),
            Err(e) => return Poll::Ready(Err(e.into())),
        }

        let available = &this.buf[this.index..];
        let n = available.len().min(buf.remaining());
        buf.put_slice(&available[..n]);
        this.index += n;
        Poll::Ready(Ok(()))
    }
}

impl<S: HunkTransport> AsyncWrite for HunkStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if data.is_empty() {
            return Poll::Ready(Ok(0));
        }

        let n = ready!(this.poll_write_hunk(cx, data))?;
        // Push the hunk out now; a pending flush just leaves it queued
        if let Poll::Ready(Err(e)) = this.inner.poll_flush_unpin(cx) {
            return Poll::Ready(Err(HunkError::Write(e).into()));
        }
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.closed {
            return Poll::Ready(Ok(()));
        }
        this.inner
            .poll_flush_unpin(cx)
            .map_err(|e| HunkError::Write(e).into())
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().poll_close_inner(cx).map_err(Into::into)
    }
}
