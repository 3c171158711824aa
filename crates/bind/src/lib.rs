//! wgstream Bind
//!
//! Runs a datagram-oriented tunnel engine over dialed byte streams.
//!
//! ## Model
//!
//! - The engine calls [`Bind::open`] and runs one task per returned
//!   [`ReceiveFunc`]. Each `recv` parks a request on a shared dispatch queue.
//! - Every connected [`Endpoint`] has one forwarding task that pops those
//!   requests, reads its stream, and completes them.
//! - [`ClientBind`] dials on first send and stamps/strips the reserved tag;
//!   [`ServerBind`] only writes to connections attached by an accept loop.
//!
//! Concurrent sends to one endpoint are serialised by the endpoint's write
//! lock, not ordered.

mod bind;
mod client;
mod endpoint;
mod forward;
mod queue;
mod server;

pub use bind::{Bind, NetBind, ReceiveFunc};
pub use client::ClientBind;
pub use endpoint::Endpoint;
pub use server::ServerBind;

pub use wgstream_core::{BindError, Result};
