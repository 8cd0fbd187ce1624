//! # Observability Infrastructure
//!
//! Structured logging for the secretspin daemon via the `tracing`
//! ecosystem. All steady-state failures surface here: the daemon has no
//! status endpoint, so logs are the only operator-visible signal.
//! `RUST_LOG` overrides the configured level when set.

use tracing_subscriber::EnvFilter;

use crate::errors::{Error, Result};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(Error::config(format!("Unknown log format '{}'", other))),
        }
    }
}

/// Initialize the global tracing subscriber. Must run once, before anything
/// logs; a second call fails because a global subscriber is already set.
pub fn init_tracing(log_level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| Error::config(format!("Invalid log level '{}': {}", log_level, e)))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    let result = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.map_err(|e| Error::internal(format!("Failed to set tracing subscriber: {}", e)))
}
