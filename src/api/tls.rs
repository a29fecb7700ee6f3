//! PEM certificate and key loading for the HTTPS listener.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::{pem::PemObject, CertificateDer, PrivateKeyDer};
use tokio_rustls::TlsAcceptor;

use crate::errors::{Error, Result};

/// Subject and expiry of the served certificate, for startup logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    pub subject: String,
    pub not_after: String,
}

#[derive(Debug)]
pub struct CertificateBundle {
    /// Leaf first, then any intermediates from the same file
    pub chain: Vec<CertificateDer<'static>>,
    pub private_key: PrivateKeyDer<'static>,
    pub info: CertificateInfo,
}

/// Read a PEM certificate chain and private key from disk.
pub fn load_certificate_bundle(cert_path: &Path, key_path: &Path) -> Result<CertificateBundle> {
    let cert_bytes = fs::read(cert_path).map_err(|e| {
        Error::config(format!("Failed to read TLS certificate {}: {}", cert_path.display(), e))
    })?;

    let chain: Vec<CertificateDer<'static>> = CertificateDer::pem_slice_iter(&cert_bytes)
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| {
            Error::config(format!("Invalid PEM in TLS certificate {}: {}", cert_path.display(), e))
        })?;

    let leaf = chain.first().ok_or_else(|| {
        Error::config(format!("TLS certificate {} contains no certificates", cert_path.display()))
    })?;
    let info = certificate_info(leaf)?;

    let key_bytes = fs::read(key_path).map_err(|e| {
        Error::config(format!("Failed to read TLS private key {}: {}", key_path.display(), e))
    })?;
    let private_key = PrivateKeyDer::from_pem_slice(&key_bytes).map_err(|e| {
        Error::config(format!("Invalid TLS private key {}: {}", key_path.display(), e))
    })?;

    Ok(CertificateBundle { chain, private_key, info })
}

fn certificate_info(der: &CertificateDer<'_>) -> Result<CertificateInfo> {
    let (_, cert) = x509_parser::parse_x509_certificate(der.as_ref())
        .map_err(|e| Error::config(format!("TLS certificate is not valid X.509: {}", e)))?;

    if !cert.validity().is_valid() {
        return Err(Error::config(format!(
            "TLS certificate for '{}' is outside its validity period",
            cert.subject()
        )));
    }

    Ok(CertificateInfo {
        subject: cert.subject().to_string(),
        not_after: cert.validity().not_after.to_string(),
    })
}

/// Build a rustls acceptor from the configured certificate and key.
pub fn configure_tls_acceptor(
    cert_path: &Path,
    key_path: &Path,
) -> Result<(TlsAcceptor, CertificateInfo)> {
    let bundle = load_certificate_bundle(cert_path, key_path)?;

    let provider = rustls::crypto::ring::default_provider();
    let builder = rustls::ServerConfig::builder_with_provider(provider.into())
        .with_safe_default_protocol_versions()
        .map_err(|err| Error::config(format!("Invalid TLS protocol configuration: {err}")))?;

    let server_config = builder
        .with_no_client_auth()
        .with_single_cert(bundle.chain, bundle.private_key)
        .map_err(|err| Error::config(format!("Failed to load TLS certificate: {err}")))?;

    Ok((TlsAcceptor::from(Arc::new(server_config)), bundle.info))
}
