//! Opaque, self-describing references to one exact secret version.
//!
//! A reference is the URL-safe base64 encoding of the JSON object
//! `{"name": <name>, "version": <version>}`. Nothing in it is secret; it only
//! carries enough information to find a version in a KV v2 backend without
//! keeping any id mapping of our own. Version `0` means "latest".

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, URL_SAFE};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Version number that resolves to the newest live version.
pub const LATEST_VERSION: u64 = 0;

const LENIENT_URL_SAFE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A `(name, version)` pair identifying one version of a secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedReference {
    pub name: String,
    pub version: u64,
}

impl VersionedReference {
    pub fn new(name: impl Into<String>, version: u64) -> Self {
        Self { name: name.into(), version }
    }

    pub fn encode(&self) -> Result<String> {
        let bytes = serde_json::to_vec(self).map_err(|e| {
            tracing::error!(name = %self.name, version = self.version, error = %e, "Failed to serialize secret reference");
            Error::encoding(format!("failed to serialize reference for '{}': {}", self.name, e))
        })?;
        Ok(URL_SAFE.encode(bytes))
    }

    pub fn decode(reference: &str) -> Result<Self> {
        let bytes = LENIENT_URL_SAFE.decode(reference.trim()).map_err(|e| {
            tracing::debug!(reference = %reference, error = %e, "Reference is not valid base64");
            Error::invalid_reference(reference, format!("not valid base64: {}", e))
        })?;

        serde_json::from_slice(&bytes).map_err(|e| {
            tracing::debug!(reference = %reference, error = %e, "Reference payload has unexpected shape");
            Error::invalid_reference(reference, format!("unexpected payload: {}", e))
        })
    }
}

/// Encode `(name, version)` into an opaque reference string.
pub fn encode(name: &str, version: u64) -> Result<String> {
    VersionedReference::new(name, version).encode()
}

/// Decode an opaque reference string back into `(name, version)`.
pub fn decode(reference: &str) -> Result<VersionedReference> {
    VersionedReference::decode(reference)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_matches_known_reference() {
        let id = encode("/DatDirector/DatDeployment/DatVar", 1).unwrap();
        assert_eq!(
            id,
            "eyJuYW1lIjoiL0RhdERpcmVjdG9yL0RhdERlcGxveW1lbnQvRGF0VmFyIiwidmVyc2lvbiI6MX0="
        );
    }

    #[test]
    fn test_decode_known_references() {
        let reference = decode("eyJuYW1lIjoic29tZV9wYXNzd29yZCIsInZlcnNpb24iOjF9").unwrap();
        assert_eq!(reference, VersionedReference::new("some_password", 1));

        let reference = decode("eyJuYW1lIjoic29tZV92YWx1ZSIsInZlcnNpb24iOjB9").unwrap();
        assert_eq!(reference.name, "some_value");
        assert_eq!(reference.version, LATEST_VERSION);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode("$$$wakawakawaka$$$").unwrap_err();
        assert!(matches!(err, Error::InvalidReference { .. }));
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        let not_a_reference = URL_SAFE.encode(br#"{"foo":"bar"}"#);
        let err = decode(&not_a_reference).unwrap_err();
        assert!(matches!(err, Error::InvalidReference { .. }));

        let negative_version = URL_SAFE.encode(br#"{"name":"x","version":-1}"#);
        assert!(decode(&negative_version).is_err());
    }

    #[test]
    fn test_decode_empty_string() {
        assert!(decode("").is_err());
    }

    proptest! {
        #[test]
        fn prop_reference_round_trips(name in ".{0,64}", version in any::<u64>()) {
            let encoded = encode(&name, version).unwrap();
            let decoded = decode(&encoded).unwrap();
            prop_assert_eq!(decoded, VersionedReference::new(name, version));
        }
    }
}
