//! Structured logging setup

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LogFormat;
use crate::error::{Error, Result};

/// Default filter when `RUST_LOG` is unset
const DEFAULT_FILTER: &str = "info,tower_http=info";

/// Initialize the global tracing subscriber
///
/// Filtering follows `RUST_LOG` and falls back to `info`.
pub fn init_subscriber(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = fmt().with_env_filter(filter).with_target(false);

    let result = match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    result.map_err(|e| Error::General(format!("Failed to initialize logging: {}", e)))
}
