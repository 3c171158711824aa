//! wgstream Settings
//!
//! Declarative tunnel configuration: the JSON shape users write, and the
//! validated device configuration the binds and engine are built from.
//!
//! ## Usage
//!
//! ```no_run
//! use wgstream_settings::WireGuardConfig;
//!
//! let config = WireGuardConfig::load_from("wgstream.json".as_ref())?;
//! let device = config.build()?;
//! assert!(device.mtu > 0);
//! # Ok::<(), wgstream_settings::SettingsError>(())
//! ```

mod config;
mod keys;

pub use config::{
    DeviceConfig, PeerConfig, PeerSettings, WireGuardConfig,
    DEFAULT_ADDRESSES, DEFAULT_ALLOWED_IPS, DEFAULT_MTU,
};
pub use keys::parse_key;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings: {0}")]
    ReadError(std::io::Error),

    #[error("Failed to parse settings: {0}")]
    ParseError(serde_json::Error),

    #[error("Failed to deserialize key: {0}")]
    InvalidKey(String),

    #[error("\"reserved\" should be empty or 3 bytes, got {0}")]
    InvalidReserved(usize),
}

pub type Result<T> = std::result::Result<T, SettingsError>;
