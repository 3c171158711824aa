//! wgstream Hunk
//!
//! Byte-stream view of a bidirectional message RPC channel. Each message
//! ("hunk") carries an opaque payload; [`HunkStream`] reads across message
//! boundaries and writes one message per call.

pub mod channel;
mod stream;

pub use stream::{HunkStream, HunkTransport, POOL_BUFFER_SIZE};

use std::io;

use bytes::Bytes;
use thiserror::Error;

/// One message on the RPC stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hunk {
    pub data: Bytes,
}

impl Hunk {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Error, Debug)]
pub enum HunkError {
    #[error("Failed to fetch hunk from tunnel: {0}")]
    Read(#[source] io::Error),

    #[error("Hunk stream ended")]
    StreamEnd,

    #[error("Failed to send data over tunnel: {0}")]
    Write(#[source] io::Error),

    #[error("Hunk stream closed")]
    Closed,
}

impl From<HunkError> for io::Error {
    fn from(err: HunkError) -> Self {
        let kind = match &err {
            HunkError::Read(e) | HunkError::Write(e) => e.kind(),
            HunkError::StreamEnd => io::ErrorKind::UnexpectedEof,
            HunkError::Closed => io::ErrorKind::BrokenPipe,
        };
        io::Error::new(kind, err)
    }
}

pub type Result<T> = std::result::Result<T, HunkError>;
