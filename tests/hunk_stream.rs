//! Integration tests for the hunk stream adapter
//!
//! Both ends of an in-memory RPC channel, driven through the generic tokio
//! I/O helpers a proxy would use.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;

use wgstream_hunk::{channel, Hunk, HunkError, HunkStream, POOL_BUFFER_SIZE};

const WAIT: Duration = Duration::from_secs(2);

#[tokio::test]
async fn test_read_to_end_concatenates_hunks() {
    let (local, mut peer) = channel::pair();
    let mut stream = HunkStream::new(local);

    for part in [&b"GET / HTTP/1.1\r\n"[..], b"", b"Host: a\r\n", b"\r\n"] {
        peer.send(Hunk::new(part)).await.unwrap();
    }
    peer.close().await.unwrap();

    let mut out = Vec::new();
    stream.read_to_end(&mut out).await.unwrap();
    assert_eq!(out, b"GET / HTTP/1.1\r\nHost: a\r\n\r\n");
}

#[tokio::test]
async fn test_inherent_read_reports_stream_end() {
    let (local, mut peer) = channel::pair();
    let mut stream = HunkStream::new(local);

    peer.send(Hunk::new(&b"abc"[..])).await.unwrap();
    drop(peer);

    let mut buf = [0u8; 2];
    assert_eq!(stream.read(&mut buf).await.unwrap(), 2);
    assert_eq!(stream.read(&mut buf).await.unwrap(), 1);
    assert_eq!(buf[0], b'c');
    assert!(matches!(stream.read(&mut buf).await, Err(HunkError::StreamEnd)));
}

#[tokio::test]
async fn test_write_all_sends_one_hunk() {
    let (local, peer) = channel::pair();
    let mut stream = HunkStream::new(local);

    stream.write_all(b"first").await.unwrap();
    stream.write_all(b"second").await.unwrap();
    stream.shutdown().await.unwrap();

    let hunks: Vec<Hunk> = peer.map(|h| h.unwrap()).collect().await;
    assert_eq!(hunks.len(), 2);
    assert_eq!(&hunks[0].data[..], b"first");
    assert_eq!(&hunks[1].data[..], b"second");
    assert!(stream.is_closed());
}

#[tokio::test]
async fn test_write_after_close_fails() {
    let (local, _peer) = channel::pair();
    let mut stream = HunkStream::new(local);

    stream.close().await.unwrap();
    assert!(matches!(stream.write(b"late").await, Err(HunkError::Closed)));
    // Closing twice is harmless
    stream.close().await.unwrap();
}

#[tokio::test]
async fn test_write_to_departed_peer_fails() {
    let (local, peer) = channel::pair();
    let mut stream = HunkStream::new(local);
    drop(peer);

    let err = stream.write(b"anyone?").await.unwrap_err();
    assert!(matches!(err, HunkError::Write(_)));
    assert!(err.to_string().starts_with("Failed to send data over tunnel"));
}

#[tokio::test]
async fn test_close_runs_cancel_once() {
    let (local, mut peer) = channel::pair();
    let cancels = Arc::new(AtomicUsize::new(0));
    let counter = cancels.clone();
    let mut stream = HunkStream::with_cancel(local, move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    stream.close().await.unwrap();
    stream.close().await.unwrap();
    assert_eq!(cancels.load(Ordering::SeqCst), 1);

    // The peer sees the half-close as the end of its stream
    assert!(timeout(WAIT, peer.next()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_bulk_read_zero_copy_for_pool_sized_hunk() {
    let (local, mut peer) = channel::pair();
    let mut stream = HunkStream::new(local);

    let payload = Bytes::from(vec![0x5au8; POOL_BUFFER_SIZE]);
    let ptr = payload.as_ptr();
    peer.send(Hunk::new(payload)).await.unwrap();
    peer.send(Hunk::new(&b"tail"[..])).await.unwrap();

    let batch = stream.read_multi_buffer().await.unwrap();
    assert_eq!(batch.len(), POOL_BUFFER_SIZE);
    assert_eq!(batch.as_ptr(), ptr);

    let tail = stream.read_multi_buffer().await.unwrap();
    assert_eq!(&tail[..], b"tail");
}

#[tokio::test]
async fn test_bulk_read_splits_oversized_hunk() {
    let (local, mut peer) = channel::pair();
    let mut stream = HunkStream::new(local);

    peer.send(Hunk::new(vec![1u8; POOL_BUFFER_SIZE + 100])).await.unwrap();

    let first = stream.read_multi_buffer().await.unwrap();
    assert_eq!(first.len(), POOL_BUFFER_SIZE);
    let second = stream.read_multi_buffer().await.unwrap();
    assert_eq!(second.len(), 100);
}

#[tokio::test]
async fn test_echo_through_two_streams() {
    let (a, b) = channel::pair();
    let mut client = HunkStream::new(a);
    let server = HunkStream::new(b);

    let echo = tokio::spawn(async move {
        let (mut rd, mut wr) = tokio::io::split(server);
        tokio::io::copy(&mut rd, &mut wr).await.unwrap();
        wr.shutdown().await.unwrap();
    });

    let message = vec![0xc3u8; 3 * 1024];
    client.write_all(&message).await.unwrap();
    client.shutdown().await.unwrap();

    let mut echoed = Vec::new();
    timeout(WAIT, client.read_to_end(&mut echoed)).await.unwrap().unwrap();
    assert_eq!(echoed, message);
    timeout(WAIT, echo).await.unwrap().unwrap();
}
