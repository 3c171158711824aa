//! wgstream Core Types
//!
//! Shared vocabulary for the tunnel transport adapters: destinations, the
//! reserved datagram tag, the error taxonomy, and the dialer/resolver
//! capabilities the binds consume.

mod error;
mod transport;
mod types;

pub use error::*;
pub use transport::*;
pub use types::*;
