//! # Error Handling
//!
//! A single error type shared by the store, the credential generators and the
//! API layer. Variants follow the failure taxonomy of the service: client
//! mistakes (validation, bad references, unknown credential types), missing
//! secrets, backend outages and internal crypto failures.

/// Custom result type for bosh-vault operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for bosh-vault
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Malformed or semantically invalid request
    #[error("Validation error: {0}")]
    Validation(String),

    /// Request carried a `type` discriminator no credential kind handles
    #[error("Unsupported credential type '{kind}', supported types are: {supported}")]
    UnsupportedCredentialType { kind: String, supported: String },

    /// Requested name, id or version is absent at the resolved backend
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network or backend failure during a read or write
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Opaque reference string could not be decoded
    #[error("Invalid reference '{reference}': {reason}")]
    InvalidReference { reference: String, reason: String },

    /// Serialization of a reference or payload failed
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Key generation, RNG or certificate signing failure
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network transport errors
    #[error("Transport error: {0}")]
    Transport(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    /// Create a new unsupported credential type error
    pub fn unsupported_type<K: Into<String>, S: Into<String>>(kind: K, supported: S) -> Self {
        Self::UnsupportedCredentialType { kind: kind.into(), supported: supported.into() }
    }

    /// Create a new not found error
    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a new backend unavailable error
    pub fn backend<S: Into<String>>(message: S) -> Self {
        Self::BackendUnavailable(message.into())
    }

    /// Create a new invalid reference error
    pub fn invalid_reference<R: Into<String>, S: Into<String>>(reference: R, reason: S) -> Self {
        Self::InvalidReference { reference: reference.into(), reason: reason.into() }
    }

    /// Create a new encoding error
    pub fn encoding<S: Into<String>>(message: S) -> Self {
        Self::Encoding(message.into())
    }

    /// Create a new crypto error
    pub fn crypto<S: Into<String>>(message: S) -> Self {
        Self::Crypto(message.into())
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the error was caused by the caller rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::Validation(_)
                | Error::UnsupportedCredentialType { .. }
                | Error::InvalidReference { .. }
                | Error::NotFound(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Encoding(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Error::Validation(err.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}
