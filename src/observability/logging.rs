//! # Structured Logging
//!
//! Installs the global `tracing` subscriber and provides span macros.
//!
//! `RUST_LOG` takes precedence over the configured level, so a single
//! deployment can be made more verbose without editing its config file:
//!
//! ```text
//! RUST_LOG=bosh_vault::store=debug,info bosh-vault --config bv.yml
//! ```

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{AppConfig, LogConfig};
use crate::errors::{Error, Result};

/// Create a tracing span for one API request.
///
/// ```rust,ignore
/// let span = request_span!("GET", "/v1/data");
/// let span = request_span!("POST", "/v1/data", credential = "my_cert");
/// ```
#[macro_export]
macro_rules! request_span {
    ($method:expr, $path:expr) => {
        tracing::info_span!(
            "http_request",
            method = %$method,
            path = %$path,
            request_id = %uuid::Uuid::new_v4(),
            status = tracing::field::Empty
        )
    };
    ($method:expr, $path:expr, $($field:tt)*) => {
        tracing::info_span!(
            "http_request",
            method = %$method,
            path = %$path,
            request_id = %uuid::Uuid::new_v4(),
            status = tracing::field::Empty,
            $($field)*
        )
    };
}

/// Create a tracing span for a backend call.
#[macro_export]
macro_rules! backend_span {
    ($operation:expr, $backend:expr) => {
        tracing::debug_span!("backend_operation", operation = %$operation, backend = %$backend)
    };
    ($operation:expr, $backend:expr, $($field:tt)*) => {
        tracing::debug_span!(
            "backend_operation",
            operation = %$operation,
            backend = %$backend,
            $($field)*
        )
    };
}

/// Install the global subscriber.
///
/// Calling this more than once is harmless; only the first subscriber is
/// kept.
///
/// # Errors
///
/// Returns `Error::Config` if the configured level is not a valid filter.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => level_filter(&config.level)?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json {
        registry
            .with(fmt::layer().json().with_current_span(true).with_target(true))
            .try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    if installed.is_err() {
        tracing::debug!("Global tracing subscriber already installed");
    }
    Ok(())
}

/// Filter for the configured level, used when `RUST_LOG` is unset.
fn level_filter(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(level.to_lowercase())
        .map_err(|e| Error::config(format!("invalid log level '{}': {}", level, e)))
}

/// Log configuration at startup, without secrets.
pub fn log_config_info(config: &AppConfig) {
    tracing::info!(
        api_address = %config.api.address,
        tls_enabled = config.api.tls.is_enabled(),
        backend_kind = %config.vault.kind,
        backend_address = %config.vault.address,
        mount = %config.vault.mount,
        redirect_blocks = config.redirects.len(),
        redirect_rules = config.redirects.iter().map(|r| r.rules.len()).sum::<usize>(),
        log_level = %config.log.level,
        "bosh-vault configuration"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macros_compile() {
        let _span = request_span!("GET", "/v1/data");
        let _span = request_span!("POST", "/v1/data", credential = "my_cert");
        let _span = backend_span!("read_version", "memory://default");
        let _span = backend_span!("write", "memory://default", path = "a/b");
    }

    // Installing the global subscriber is covered in tests/logging.rs so it
    // cannot interfere with log capture in other unit tests.
    #[test]
    fn test_level_filter() {
        assert!(level_filter("DEBUG").is_ok());
        assert!(level_filter("bosh_vault::store=debug,info").is_ok());
        assert!(level_filter("error").unwrap().to_string().contains("error"));
    }

    #[test]
    fn test_log_config_info() {
        log_config_info(&AppConfig::default());
    }
}
