use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BindError {
    #[error("Invalid endpoint address: {0}")]
    Address(String),

    #[error("Failed to resolve {domain}: {reason}")]
    Resolution { domain: String, reason: String },

    #[error("Dial failed: {0}")]
    Dial(#[source] io::Error),

    #[error("Read failed: {0}")]
    Read(#[source] io::Error),

    #[error("Write failed: {0}")]
    Write(#[source] io::Error),

    #[error("Stream ended")]
    StreamEnd,

    #[error("Bind closed")]
    Closed,

    #[error("Connection not open yet")]
    NotConnected,

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl BindError {
    /// True for errors after which the endpoint's connection is gone
    pub fn is_stream_end(&self) -> bool {
        matches!(self, Self::StreamEnd)
    }
}

pub type Result<T> = std::result::Result<T, BindError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_address() {
        let err = BindError::Address("missing port in address".to_string());
        assert_eq!(err.to_string(), "Invalid endpoint address: missing port in address");
    }

    #[test]
    fn test_error_display_resolution() {
        let err = BindError::Resolution {
            domain: "peer.example".to_string(),
            reason: "empty response".to_string(),
        };
        assert_eq!(err.to_string(), "Failed to resolve peer.example: empty response");
    }

    #[test]
    fn test_error_display_dial() {
        let err = BindError::Dial(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
        assert_eq!(err.to_string(), "Dial failed: refused");
    }

    #[test]
    fn test_error_display_closed() {
        assert_eq!(BindError::Closed.to_string(), "Bind closed");
    }

    #[test]
    fn test_error_display_not_connected() {
        assert_eq!(BindError::NotConnected.to_string(), "Connection not open yet");
    }

    #[test]
    fn test_error_display_config() {
        let err = BindError::Config("reserved must be empty or 3 bytes".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: reserved must be empty or 3 bytes"
        );
    }

    #[test]
    fn test_error_source_preserved() {
        use std::error::Error as _;

        let err = BindError::Write(io::Error::new(io::ErrorKind::BrokenPipe, "pipe"));
        let source = err.source().unwrap();
        assert_eq!(source.to_string(), "pipe");
    }

    #[test]
    fn test_is_stream_end() {
        assert!(BindError::StreamEnd.is_stream_end());
        assert!(!BindError::Closed.is_stream_end());
        assert!(!BindError::Read(io::Error::new(io::ErrorKind::Other, "x")).is_stream_end());
    }
}
