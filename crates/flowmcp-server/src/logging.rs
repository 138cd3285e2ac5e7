//! Tracing initialization for server processes
//!
//! Logs go to stderr: stdout belongs to the protocol when running the
//! stdio transport. `RUST_LOG` overrides the default filter.

use tracing_subscriber::EnvFilter;

use crate::error::{ServerError, ServerResult};

/// Install a stderr subscriber with an env-overridable filter
pub fn init_tracing(default_filter: &str) -> ServerResult<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| ServerError::Configuration(error.to_string()))
}
