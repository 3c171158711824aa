//! wgstream Logging
//!
//! One place to install the `tracing` subscriber for wgstream binaries.
//! `RUST_LOG` overrides the level chosen by the caller.

use std::fmt;

use thiserror::Error;
use tracing_subscriber::{fmt as fmt_layer, prelude::*, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }

    /// Filter directives. Above info, only wgstream crates get the extra
    /// verbosity; dependencies stay at info.
    pub fn directives(&self) -> String {
        match self {
            Self::Debug | Self::Trace => format!(
                "info,wgstream={0},wgstream_bind={0},wgstream_hunk={0}",
                self.as_str()
            ),
            _ => self.as_str().to_string(),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
#[error("Logging already initialized: {0}")]
pub struct LoggingError(String);

/// Install the global subscriber. Fails if one is already installed.
pub fn try_init(level: LogLevel) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.directives()));

    tracing_subscriber::registry()
        .with(fmt_layer::layer())
        .with(filter)
        .try_init()
        .map_err(|e| LoggingError(e.to_string()))
}

/// Subscriber for tests: writes through the test harness, ignores repeat calls
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
