//! X.509 certificate generation.
//!
//! A certificate request is classified as a root CA, an intermediate CA or a
//! leaf certificate. Roots and self-signed requests sign themselves; every
//! other request is signed by a CA previously stored under the `ca` name.
//!
//! All keys are RSA. The subject key identifier is the SHA-1 digest of the
//! public modulus and every certificate carries an authority key identifier
//! equal to its signer's subject key identifier.

use std::fmt;

use async_trait::async_trait;
use rand::rngs::OsRng;
use rand::RngCore;
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DistinguishedName, DnType,
    ExtendedKeyUsagePurpose, IsCa, KeyIdMethod, KeyPair, KeyUsagePurpose, SerialNumber,
    PKCS_RSA_SHA256,
};
use ring::digest::{digest, SHA1_FOR_LEGACY_USE_ONLY};
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use x509_parser::extensions::ParsedExtension;
use x509_parser::pem::parse_x509_pem;
use x509_parser::public_key::PublicKey;

use super::keys;
use super::{CredentialGenerator, CredentialRecord, CredentialType};
use crate::errors::{Error, Result};
use crate::store::SecretStore;

pub const DEFAULT_ORGANIZATION: &str = "Cloud Foundry";
pub const DEFAULT_COUNTRY: &str = "USA";
pub const DEFAULT_DURATION_DAYS: u32 = 365;
pub const MAX_DURATION_DAYS: u32 = 36_500;
const SERIAL_NUMBER_BYTES: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CertificateParameters {
    pub common_name: String,
    pub is_ca: bool,
    /// Name of the stored CA that signs this certificate
    pub ca: String,
    pub alternative_names: Vec<String>,
    pub key_usage: Vec<String>,
    pub extended_key_usage: Vec<String>,
    pub organization: String,
    pub organization_unit: String,
    pub locality: String,
    pub state: String,
    pub country: String,
    pub key_length: usize,
    /// Validity in days
    pub duration: u32,
    pub self_sign: bool,
}

impl Default for CertificateParameters {
    fn default() -> Self {
        Self {
            common_name: String::new(),
            is_ca: false,
            ca: String::new(),
            alternative_names: Vec::new(),
            key_usage: Vec::new(),
            extended_key_usage: Vec::new(),
            organization: String::new(),
            organization_unit: String::new(),
            locality: String::new(),
            state: String::new(),
            country: String::new(),
            key_length: keys::DEFAULT_KEY_LENGTH,
            duration: DEFAULT_DURATION_DAYS,
            self_sign: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateKind {
    RootCa,
    IntermediateCa,
    Leaf,
}

/// PEM certificate, the PEM certificate of its issuer and a PKCS#1 key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRecord {
    pub certificate: String,
    #[serde(default)]
    pub ca: String,
    pub private_key: String,
}

impl fmt::Debug for CertificateRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateRecord")
            .field("certificate", &format!("[{} bytes PEM]", self.certificate.len()))
            .field("ca", &format!("[{} bytes PEM]", self.ca.len()))
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct CertificateRequest {
    pub name: String,
    pub parameters: CertificateParameters,
}

impl CertificateRequest {
    pub fn is_root_ca_request(&self) -> bool {
        let p = &self.parameters;
        p.is_ca && (p.ca.is_empty() || p.self_sign) && p.alternative_names.is_empty()
    }

    pub fn is_intermediate_ca_request(&self) -> bool {
        let p = &self.parameters;
        p.is_ca && (!p.ca.is_empty() || p.self_sign) && p.alternative_names.is_empty()
    }

    pub fn is_regular_certificate_request(&self) -> bool {
        let p = &self.parameters;
        !p.is_ca && (!p.ca.is_empty() || p.self_sign) && !p.common_name.is_empty()
    }

    /// First matching shape, in root, intermediate, leaf order.
    pub fn classify(&self) -> Option<CertificateKind> {
        if self.is_root_ca_request() {
            Some(CertificateKind::RootCa)
        } else if self.is_intermediate_ca_request() {
            Some(CertificateKind::IntermediateCa)
        } else if self.is_regular_certificate_request() {
            Some(CertificateKind::Leaf)
        } else {
            None
        }
    }

    fn signs_itself(&self, kind: CertificateKind) -> bool {
        kind == CertificateKind::RootCa || self.parameters.self_sign
    }

    fn template(&self, kind: CertificateKind, key: &RsaPrivateKey) -> Result<CertificateParams> {
        let p = &self.parameters;

        let alternative_names = match kind {
            CertificateKind::Leaf => p.alternative_names.clone(),
            CertificateKind::RootCa | CertificateKind::IntermediateCa => Vec::new(),
        };
        // IP literals become IP SANs, everything else a DNS SAN
        let mut params = CertificateParams::new(alternative_names)
            .map_err(|e| Error::validation(format!("invalid alternative name: {}", e)))?;

        params.distinguished_name = subject(p);
        params.serial_number = Some(random_serial()?);

        let now = OffsetDateTime::now_utc();
        params.not_before = now;
        params.not_after = now
            .checked_add(time::Duration::days(i64::from(p.duration)))
            .ok_or_else(|| {
                Error::validation(format!("certificate duration of {} days is out of range", p.duration))
            })?;

        params.key_identifier_method = KeyIdMethod::PreSpecified(subject_key_id(key));
        params.use_authority_key_identifier_extension = true;

        params.is_ca = match kind {
            CertificateKind::RootCa | CertificateKind::IntermediateCa => {
                IsCa::Ca(BasicConstraints::Unconstrained)
            }
            CertificateKind::Leaf => IsCa::ExplicitNoCa,
        };

        params.key_usages = p.key_usage.iter().filter_map(|u| parse_key_usage(u)).collect();
        params.extended_key_usages =
            p.extended_key_usage.iter().filter_map(|u| parse_extended_key_usage(u)).collect();

        match kind {
            CertificateKind::RootCa | CertificateKind::IntermediateCa => {
                if p.key_usage.is_empty() {
                    params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
                }
            }
            CertificateKind::Leaf => {
                if p.key_usage.is_empty() {
                    params.key_usages =
                        vec![KeyUsagePurpose::KeyEncipherment, KeyUsagePurpose::DigitalSignature];
                }
                if p.extended_key_usage.is_empty() {
                    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
                }
            }
        }

        Ok(params)
    }
}

#[async_trait]
impl CredentialGenerator for CertificateRequest {
    fn name(&self) -> &str {
        &self.name
    }

    fn credential_type(&self) -> CredentialType {
        CredentialType::Certificate
    }

    fn validate(&self) -> Result<()> {
        if self.classify().is_none() {
            return Err(Error::validation(format!(
                "certificate request '{}' is neither a root CA, an intermediate CA nor a leaf certificate request",
                self.name
            )));
        }
        keys::validate_key_length(self.parameters.key_length)?;
        if self.parameters.duration == 0 {
            return Err(Error::validation("certificate duration must be at least one day"));
        }
        if self.parameters.duration > MAX_DURATION_DAYS {
            return Err(Error::validation(format!(
                "certificate duration must be at most {} days",
                MAX_DURATION_DAYS
            )));
        }
        Ok(())
    }

    async fn generate(&self, store: &dyn SecretStore) -> Result<CredentialRecord> {
        self.validate()?;
        let kind = self
            .classify()
            .ok_or_else(|| Error::validation("unclassifiable certificate request"))?;

        let key = keys::generate_rsa_key(self.parameters.key_length).await?;
        let key_pair = rcgen_key_pair(&key)?;
        let params = self.template(kind, &key)?;

        let (certificate, ca) = if self.signs_itself(kind) {
            let certificate = params
                .self_signed(&key_pair)
                .map_err(|e| Error::crypto(format!("failed to self-sign certificate: {}", e)))?;
            let pem = certificate.pem();
            (pem.clone(), pem)
        } else {
            let issuer = fetch_signing_ca(store, &self.parameters.ca).await?;
            let certificate = params
                .signed_by(&key_pair, &issuer.certificate, &issuer.key_pair)
                .map_err(|e| Error::crypto(format!("failed to sign certificate: {}", e)))?;
            (certificate.pem(), issuer.certificate_pem)
        };

        tracing::info!(
            name = %self.name,
            kind = ?kind,
            common_name = %self.parameters.common_name,
            signed_by = %if self.signs_itself(kind) { "self" } else { self.parameters.ca.as_str() },
            "Generated certificate"
        );

        Ok(CredentialRecord::Certificate(CertificateRecord {
            certificate,
            ca,
            private_key: keys::private_key_pkcs1_pem(&key)?,
        }))
    }
}

/// Issuer material recovered from a stored certificate record.
pub struct SigningCa {
    /// PEM exactly as stored
    pub certificate_pem: String,
    pub certificate: Certificate,
    pub key_pair: KeyPair,
}

impl fmt::Debug for SigningCa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningCa").field("certificate_pem", &self.certificate_pem).finish()
    }
}

/// Load the newest version of the CA stored under `name` for signing.
///
/// # Errors
///
/// Returns `Error::Validation` if the secret is missing, is not a certificate,
/// or its certificate or PKCS#1 key cannot be parsed or do not belong together.
pub async fn fetch_signing_ca(store: &dyn SecretStore, name: &str) -> Result<SigningCa> {
    let secret = store.get_latest_by_name(name).await.map_err(|e| match e {
        Error::NotFound(_) => Error::validation(format!("signing CA '{}' does not exist", name)),
        other => other,
    })?;

    let record = match CredentialRecord::from_value(&secret.value) {
        Ok(CredentialRecord::Certificate(record)) => record,
        Ok(other) => {
            return Err(Error::validation(format!(
                "signing CA '{}' is a {} credential, not a certificate",
                name,
                other.credential_type()
            )))
        }
        Err(e) => {
            return Err(Error::validation(format!("signing CA '{}' is not usable: {}", name, e)))
        }
    };

    let (_, pem) = parse_x509_pem(record.certificate.as_bytes()).map_err(|e| {
        Error::validation(format!("signing CA '{}' has no PEM certificate: {}", name, e))
    })?;
    let parsed = pem.parse_x509().map_err(|e| {
        Error::validation(format!("signing CA '{}' certificate is not valid X.509: {}", name, e))
    })?;

    let key = keys::parse_pkcs1_private_key(&record.private_key)
        .map_err(|e| Error::validation(format!("signing CA '{}': {}", name, e)))?;

    if let Ok(PublicKey::RSA(public)) = parsed.public_key().parsed() {
        if trim_leading_zeros(public.modulus) != trim_leading_zeros(&keys::modulus_bytes(&key)) {
            return Err(Error::validation(format!(
                "signing CA '{}' private key does not match its certificate",
                name
            )));
        }
    }

    let stored_kid = parsed.extensions().iter().find_map(|ext| match ext.parsed_extension() {
        ParsedExtension::SubjectKeyIdentifier(kid) => Some(kid.0.to_vec()),
        _ => None,
    });

    let key_pair = rcgen_key_pair(&key)?;
    let mut params = CertificateParams::from_ca_cert_pem(&record.certificate).map_err(|e| {
        Error::validation(format!("signing CA '{}' cannot be used as an issuer: {}", name, e))
    })?;
    params.key_identifier_method = match stored_kid {
        Some(kid) => KeyIdMethod::PreSpecified(kid),
        None => KeyIdMethod::PreSpecified(subject_key_id(&key)),
    };
    let certificate = params
        .self_signed(&key_pair)
        .map_err(|e| Error::crypto(format!("failed to load signing CA '{}': {}", name, e)))?;

    Ok(SigningCa { certificate_pem: record.certificate, certificate, key_pair })
}

fn subject(p: &CertificateParameters) -> DistinguishedName {
    let or_default = |value: &str, default: &str| {
        if value.is_empty() {
            default.to_string()
        } else {
            value.to_string()
        }
    };

    let mut dn = DistinguishedName::new();
    if !p.common_name.is_empty() {
        dn.push(DnType::CommonName, p.common_name.clone());
    }
    dn.push(DnType::OrganizationName, or_default(&p.organization, DEFAULT_ORGANIZATION));
    if !p.organization_unit.is_empty() {
        dn.push(DnType::OrganizationalUnitName, p.organization_unit.clone());
    }
    if !p.locality.is_empty() {
        dn.push(DnType::LocalityName, p.locality.clone());
    }
    if !p.state.is_empty() {
        dn.push(DnType::StateOrProvinceName, p.state.clone());
    }
    dn.push(DnType::CountryName, or_default(&p.country, DEFAULT_COUNTRY));
    dn
}

fn random_serial() -> Result<SerialNumber> {
    let mut bytes = [0u8; SERIAL_NUMBER_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| Error::crypto(format!("failed to generate serial number: {}", e)))?;
    Ok(SerialNumber::from(bytes.to_vec()))
}

/// SHA-1 over the big-endian public modulus.
pub fn subject_key_id(key: &RsaPrivateKey) -> Vec<u8> {
    digest(&SHA1_FOR_LEGACY_USE_ONLY, &keys::modulus_bytes(key)).as_ref().to_vec()
}

fn rcgen_key_pair(key: &RsaPrivateKey) -> Result<KeyPair> {
    let pem = keys::private_key_pkcs8_pem(key)?;
    KeyPair::from_pem_and_sign_algo(&pem, &PKCS_RSA_SHA256)
        .map_err(|e| Error::crypto(format!("failed to load RSA key for signing: {}", e)))
}

fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

fn parse_key_usage(usage: &str) -> Option<KeyUsagePurpose> {
    let purpose = match usage {
        "digital_signature" => KeyUsagePurpose::DigitalSignature,
        "non_repudiation" | "content_commitment" => KeyUsagePurpose::ContentCommitment,
        "key_encipherment" => KeyUsagePurpose::KeyEncipherment,
        "data_encipherment" => KeyUsagePurpose::DataEncipherment,
        "key_agreement" => KeyUsagePurpose::KeyAgreement,
        "key_cert_sign" => KeyUsagePurpose::KeyCertSign,
        "crl_sign" => KeyUsagePurpose::CrlSign,
        "encipher_only" => KeyUsagePurpose::EncipherOnly,
        "decipher_only" => KeyUsagePurpose::DecipherOnly,
        unknown => {
            tracing::warn!(key_usage = %unknown, "Ignoring unknown key usage");
            return None;
        }
    };
    Some(purpose)
}

fn parse_extended_key_usage(usage: &str) -> Option<ExtendedKeyUsagePurpose> {
    let purpose = match usage {
        "server_auth" => ExtendedKeyUsagePurpose::ServerAuth,
        "client_auth" => ExtendedKeyUsagePurpose::ClientAuth,
        "code_signing" => ExtendedKeyUsagePurpose::CodeSigning,
        "email_protection" => ExtendedKeyUsagePurpose::EmailProtection,
        "timestamping" | "time_stamping" => ExtendedKeyUsagePurpose::TimeStamping,
        "ocsp_signing" => ExtendedKeyUsagePurpose::OcspSigning,
        unknown => {
            tracing::warn!(extended_key_usage = %unknown, "Ignoring unknown extended key usage");
            return None;
        }
    };
    Some(purpose)
}
