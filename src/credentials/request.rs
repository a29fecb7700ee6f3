//! Untyped request bodies to typed credential requests.
//!
//! Every body carries `name` and a `type` discriminator. Generation bodies
//! add optional `mode` and `parameters`; set bodies carry the record `value`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    CertificateParameters, CertificateRequest, CredentialGenerator, CredentialRecord,
    CredentialType, PasswordParameters, PasswordRequest, RsaKeypairRequest, SshKeypairRequest,
};
use crate::config::CredentialDefaults;
use crate::errors::{Error, Result};

/// Whether an existing credential is replaced by a generation request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GenerationMode {
    #[default]
    Overwrite,
    NoOverwrite,
}

#[derive(Debug)]
pub struct ParsedGeneration {
    pub mode: GenerationMode,
    pub generator: Box<dyn CredentialGenerator>,
}

#[derive(Debug, Deserialize)]
struct GenerationEnvelope {
    #[serde(default)]
    name: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    mode: GenerationMode,
    #[serde(default)]
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct SetEnvelope {
    #[serde(default)]
    name: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    value: Value,
}

/// Parse a generation body into the generator for its `type`.
///
/// # Errors
///
/// Returns `Error::Validation` for malformed JSON, a missing name or
/// parameters that do not fit the kind, and
/// `Error::UnsupportedCredentialType` for an unknown `type`.
pub fn parse_generation_request(
    body: &[u8],
    defaults: &CredentialDefaults,
) -> Result<ParsedGeneration> {
    let envelope: GenerationEnvelope = serde_json::from_slice(body)
        .map_err(|e| Error::validation(format!("error unmarshaling json request: {}", e)))?;
    let kind: CredentialType = envelope.kind.parse()?;
    let name = required_name(&envelope.name)?;
    let parameters = match envelope.parameters {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };

    let generator: Box<dyn CredentialGenerator> = match kind {
        CredentialType::Password => Box::new(PasswordRequest {
            name,
            parameters: parameters_for::<PasswordParameters>(kind, parameters)?,
            default_length: defaults.password_length,
        }),
        CredentialType::Certificate => Box::new(CertificateRequest {
            name,
            parameters: parameters_for::<CertificateParameters>(kind, parameters)?,
        }),
        CredentialType::Rsa => {
            Box::new(RsaKeypairRequest { name, parameters: parameters_for(kind, parameters)? })
        }
        CredentialType::Ssh => {
            Box::new(SshKeypairRequest { name, parameters: parameters_for(kind, parameters)? })
        }
    };

    tracing::debug!(
        name = %generator.name(),
        credential_type = %kind,
        mode = ?envelope.mode,
        "Parsed credential generation request"
    );

    Ok(ParsedGeneration { mode: envelope.mode, generator })
}

/// Parse a set body into the name and typed record to store.
///
/// # Errors
///
/// Same taxonomy as [`parse_generation_request`]; a `value` that does not
/// match the kind's record shape is a validation error.
pub fn parse_set_request(body: &[u8]) -> Result<(String, CredentialRecord)> {
    let envelope: SetEnvelope = serde_json::from_slice(body)
        .map_err(|e| Error::validation(format!("error unmarshaling json request: {}", e)))?;
    let kind: CredentialType = envelope.kind.parse()?;
    let name = required_name(&envelope.name)?;

    let tagged = serde_json::json!({ "type": kind.as_str(), "value": envelope.value });
    let record = CredentialRecord::from_value(&tagged)?;

    Ok((name, record))
}

fn required_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::validation("credential request is missing a name"));
    }
    Ok(trimmed.to_string())
}

fn parameters_for<T: serde::de::DeserializeOwned>(kind: CredentialType, parameters: Value) -> Result<T> {
    serde_json::from_value(parameters)
        .map_err(|e| Error::validation(format!("invalid {} parameters: {}", kind, e)))
}
