//! SSH keypairs: RSA keys with an OpenSSH authorized-keys public key and its
//! legacy MD5 fingerprint.

use std::fmt;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use md5::{Digest, Md5};
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use serde::{Deserialize, Serialize};

use super::keys;
use super::rsa_keypair::KeypairParameters;
use super::{CredentialGenerator, CredentialRecord, CredentialType};
use crate::errors::Result;
use crate::store::SecretStore;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshKeypairRecord {
    pub public_key: String,
    pub private_key: String,
    #[serde(default)]
    pub public_key_fingerprint: String,
}

impl fmt::Debug for SshKeypairRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshKeypairRecord")
            .field("public_key", &self.public_key)
            .field("private_key", &"[REDACTED]")
            .field("public_key_fingerprint", &self.public_key_fingerprint)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct SshKeypairRequest {
    pub name: String,
    pub parameters: KeypairParameters,
}

#[async_trait]
impl CredentialGenerator for SshKeypairRequest {
    fn name(&self) -> &str {
        &self.name
    }

    fn credential_type(&self) -> CredentialType {
        CredentialType::Ssh
    }

    fn validate(&self) -> Result<()> {
        keys::validate_key_length(self.parameters.key_length)
    }

    async fn generate(&self, _store: &dyn SecretStore) -> Result<CredentialRecord> {
        let key = keys::generate_rsa_key(self.parameters.key_length).await?;
        let blob = ssh_rsa_blob(&key.to_public_key());

        Ok(CredentialRecord::Ssh(SshKeypairRecord {
            public_key: format!("ssh-rsa {}", STANDARD.encode(&blob)),
            private_key: keys::private_key_pkcs1_pem(&key)?,
            public_key_fingerprint: md5_fingerprint(&blob),
        }))
    }
}

/// RFC 4253 `ssh-rsa` public key blob: string name, mpint e, mpint n.
pub fn ssh_rsa_blob(key: &RsaPublicKey) -> Vec<u8> {
    let mut blob = Vec::new();
    write_string(&mut blob, b"ssh-rsa");
    write_mpint(&mut blob, &key.e().to_bytes_be());
    write_mpint(&mut blob, &key.n().to_bytes_be());
    blob
}

/// Colon separated hex MD5 digest, as printed by `ssh-keygen -E md5`.
pub fn md5_fingerprint(blob: &[u8]) -> String {
    Md5::digest(blob).iter().map(|b| hex::encode([*b])).collect::<Vec<_>>().join(":")
}

fn write_string(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(data);
}

fn write_mpint(out: &mut Vec<u8>, magnitude: &[u8]) {
    let trimmed: &[u8] = match magnitude.iter().position(|b| *b != 0) {
        Some(start) => &magnitude[start..],
        None => &[],
    };
    if trimmed.first().is_some_and(|b| b & 0x80 != 0) {
        out.extend_from_slice(&(trimmed.len() as u32 + 1).to_be_bytes());
        out.push(0);
        out.extend_from_slice(trimmed);
    } else {
        write_string(out, trimmed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryBackend, SimpleStore};
    use std::sync::Arc;

    #[test]
    fn test_mpint_encoding() {
        let mut out = Vec::new();
        write_mpint(&mut out, &[0x01, 0x00, 0x01]);
        assert_eq!(out, vec![0, 0, 0, 3, 0x01, 0x00, 0x01]);

        let mut out = Vec::new();
        write_mpint(&mut out, &[0x80, 0x01]);
        assert_eq!(out, vec![0, 0, 0, 3, 0x00, 0x80, 0x01]);

        let mut out = Vec::new();
        write_mpint(&mut out, &[0x00, 0x00]);
        assert_eq!(out, vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_md5_fingerprint_format() {
        let fingerprint = md5_fingerprint(b"");
        assert_eq!(fingerprint, "d4:1d:8c:d9:8f:00:b2:04:e9:80:09:98:ec:f8:42:7e");
    }

    #[tokio::test]
    async fn test_generate_ssh_keypair() {
        let store = SimpleStore::new(Arc::new(InMemoryBackend::default()));
        let request =
            SshKeypairRequest { name: "ssh".into(), parameters: KeypairParameters::default() };

        let CredentialRecord::Ssh(record) = request.generate(&store).await.unwrap() else {
            panic!("expected an SSH record");
        };

        let private = keys::parse_pkcs1_private_key(&record.private_key).unwrap();
        let blob = ssh_rsa_blob(&private.to_public_key());
        assert_eq!(record.public_key, format!("ssh-rsa {}", STANDARD.encode(&blob)));
        assert_eq!(record.public_key_fingerprint, md5_fingerprint(&blob));
        assert_eq!(record.public_key_fingerprint.split(':').count(), 16);

        let decoded = STANDARD.decode(record.public_key.trim_start_matches("ssh-rsa ")).unwrap();
        assert_eq!(&decoded[..11], b"\0\0\0\x07ssh-rsa");
    }
}
