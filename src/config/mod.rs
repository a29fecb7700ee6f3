//! # Configuration Management
//!
//! Configuration is layered: built-in defaults, then an optional file (YAML,
//! JSON or TOML, chosen by extension), then `BV__`-prefixed environment
//! variables such as `BV__VAULT__ADDRESS` or `BV__LOG__LEVEL`.

pub mod secret;
pub mod settings;

use std::path::Path;

use tracing::warn;

pub use secret::SecretString;
pub use settings::{
    ApiConfig, AppConfig, BackendConfig, CredentialDefaults, LogConfig, RedirectConfig,
    RedirectRuleConfig, TlsConfig,
};

use crate::errors::Result;

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "BV";

/// Load and validate the application configuration.
///
/// A path that does not exist is reported and skipped so the service can
/// still start from defaults and environment variables.
///
/// # Errors
///
/// Returns `Error::Config` if a source cannot be parsed and
/// `Error::Validation` if the merged configuration is invalid.
pub fn load(path: Option<&Path>) -> Result<AppConfig> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else {
            warn!(path = %path.display(), "Config file not found, using defaults");
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    let app: AppConfig = builder.build()?.try_deserialize()?;
    app.validate()?;
    Ok(app)
}
