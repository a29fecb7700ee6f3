//! # Observability
//!
//! Structured logging through `tracing` and per-request spans for the HTTP
//! API.

pub mod http_tracing;
pub mod logging;

pub use http_tracing::trace_http_requests;
pub use logging::{init_logging, log_config_info};
