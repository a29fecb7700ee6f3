//! Random password generation.

use async_trait::async_trait;
use rand::rngs::OsRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{CredentialGenerator, CredentialRecord, CredentialType};
use crate::config::settings::MAX_PASSWORD_LENGTH;
use crate::errors::{Error, Result};
use crate::store::SecretStore;

const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWER: &str = "abcdefghijklmnopqrstuvwxyz";
const DIGITS: &str = "0123456789";
const SPECIAL: &str = "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordParameters {
    /// Falls back to the configured default when absent
    pub length: Option<usize>,
    pub exclude_upper: bool,
    pub exclude_lower: bool,
    pub exclude_number: bool,
    pub include_special: bool,
}

impl PasswordParameters {
    /// Union of the enabled character classes.
    pub fn alphabet(&self) -> Vec<char> {
        let mut alphabet = String::new();
        if !self.exclude_upper {
            alphabet.push_str(UPPER);
        }
        if !self.exclude_lower {
            alphabet.push_str(LOWER);
        }
        if !self.exclude_number {
            alphabet.push_str(DIGITS);
        }
        if self.include_special {
            alphabet.push_str(SPECIAL);
        }
        alphabet.chars().collect()
    }
}

#[derive(Debug, Clone)]
pub struct PasswordRequest {
    pub name: String,
    pub parameters: PasswordParameters,
    pub default_length: usize,
}

impl PasswordRequest {
    pub fn length(&self) -> usize {
        self.parameters.length.unwrap_or(self.default_length)
    }

    /// Draw `length` characters uniformly, with repetition, from the OS RNG.
    pub fn generate_password(&self) -> Result<String> {
        self.validate()?;
        let alphabet = self.parameters.alphabet();
        let mut rng = OsRng;
        Ok((0..self.length()).map(|_| alphabet[rng.gen_range(0..alphabet.len())]).collect())
    }
}

#[async_trait]
impl CredentialGenerator for PasswordRequest {
    fn name(&self) -> &str {
        &self.name
    }

    fn credential_type(&self) -> CredentialType {
        CredentialType::Password
    }

    fn validate(&self) -> Result<()> {
        if self.length() == 0 {
            return Err(Error::validation("password length must be at least 1"));
        }
        if self.length() > MAX_PASSWORD_LENGTH {
            return Err(Error::validation(format!(
                "password length must be at most {}",
                MAX_PASSWORD_LENGTH
            )));
        }
        if self.parameters.alphabet().is_empty() {
            return Err(Error::validation("password request excludes every character class"));
        }
        Ok(())
    }

    async fn generate(&self, _store: &dyn SecretStore) -> Result<CredentialRecord> {
        Ok(CredentialRecord::Password(self.generate_password()?))
    }
}
