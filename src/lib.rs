//! # bosh-vault
//!
//! Credential generation and versioned secret storage for BOSH deployments,
//! backed by HashiCorp Vault's KV v2 engine.
//!
//! ## Architecture
//!
//! ```text
//! REST API → CredentialService → request parser → credential kinds
//!                   ↓                                   ↓
//!              SecretStore (simple | redirect) ← CA lookup for signing
//!                   ↓
//!              KvBackend (vault | memory)
//! ```
//!
//! ## Core Components
//!
//! - **Credential kinds**: password, certificate, RSA and SSH keypairs
//! - **Secret store**: versioned storage addressed by name or opaque
//!   reference, optionally redirecting names to remote Vault servers
//! - **Reference codec**: base64 `{name, version}` handles returned as ids
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bosh_vault::{config, service::CredentialService, store};
//!
//! #[tokio::main]
//! async fn main() -> bosh_vault::Result<()> {
//!     let config = config::load(None)?;
//!     let store = store::build_store(&config).await?;
//!     let service = Arc::new(CredentialService::new(store, config.credentials.clone()));
//!     bosh_vault::api::start_api_server(&config.api, service).await
//! }
//! ```

pub mod api;
pub mod config;
pub mod credentials;
pub mod errors;
pub mod observability;
pub mod service;
pub mod store;

pub use errors::{Error, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
