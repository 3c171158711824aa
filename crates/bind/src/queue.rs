//! Dispatch queue between engine workers and per-endpoint forwarders
//!
//! Workers push a `ReadRequest` and wait on its one-shot completion; any
//! forwarding task may pop it. Closing the queue wakes every pusher, popper
//! and waiter with a closed result instead of leaving them parked.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch, Mutex};

use wgstream_core::{BindError, Result};

use crate::Endpoint;

/// Outcome of a serviced read
pub(crate) struct ReadCompletion {
    /// The request buffer, handed back so the worker can reuse it
    pub buf: Vec<u8>,
    pub result: Result<(usize, Arc<Endpoint>)>,
}

/// A worker's pending read, serviced exactly once by a forwarding task
pub(crate) struct ReadRequest {
    pub buf: Vec<u8>,
    done: oneshot::Sender<ReadCompletion>,
}

impl ReadRequest {
    pub fn new(buf: Vec<u8>) -> (Self, oneshot::Receiver<ReadCompletion>) {
        let (done, waiter) = oneshot::channel();
        (Self { buf, done }, waiter)
    }

    /// Hand the result back to the waiting worker. The worker may already
    /// have given up on a closed bind, in which case the result is dropped.
    pub fn complete(self, result: Result<(usize, Arc<Endpoint>)>) {
        let _ = self.done.send(ReadCompletion {
            buf: self.buf,
            result,
        });
    }
}

pub(crate) struct DispatchQueue {
    tx: mpsc::Sender<ReadRequest>,
    rx: Mutex<mpsc::Receiver<ReadRequest>>,
    closed: watch::Sender<bool>,
}

impl DispatchQueue {
    pub fn new() -> Arc<Self> {
        let (tx, rx) = mpsc::channel(1);
        let (closed, _) = watch::channel(false);
        Arc::new(Self {
            tx,
            rx: Mutex::new(rx),
            closed,
        })
    }

    /// Hand a request to whichever forwarder pops next
    pub async fn push(&self, request: ReadRequest) -> Result<()> {
        if self.is_closed() {
            return Err(BindError::Closed);
        }

        tokio::select! {
            biased;
            _ = self.closed() => Err(BindError::Closed),
            sent = self.tx.send(request) => sent.map_err(|_| BindError::Closed),
        }
    }

    /// Next request, or `None` once the queue is closed
    pub async fn pop(&self) -> Option<ReadRequest> {
        tokio::select! {
            biased;
            _ = self.closed() => None,
            request = async { self.rx.lock().await.recv().await } => request,
        }
    }

    /// Resolves once the queue has been closed
    pub async fn closed(&self) {
        let mut rx = self.closed.subscribe();
        loop {
            let closed = *rx.borrow_and_update();
            if closed {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Close the queue. Returns false if it was already closed.
    pub fn close(&self) -> bool {
        self.closed.send_if_modified(|closed| {
            if *closed {
                false
            } else {
                *closed = true;
                true
            }
        })
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}
