//! Secure credential value generation.
//!
//! Values are drawn from the operating system CSPRNG ([`OsRng`]); every
//! character of an alphanumeric value is an independent uniform draw from the
//! active charset.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::error::{Error, Result};
use crate::types::SecretString;

/// Minimum length for generic secret-store values.
pub const GENERIC_SECRET_MIN_LENGTH: usize = 8;

/// Minimum length for database passwords.
pub const DATABASE_PASSWORD_MIN_LENGTH: usize = 12;

/// Upper bound on requested length.
pub const MAX_LENGTH: usize = 4096;

/// Default generated length.
pub const DEFAULT_LENGTH: usize = 32;

const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";

/// Punctuation added to the alphanumeric charset when special characters are enabled.
pub const SPECIAL_CHARS: &[u8] = b"!@#$%^&*()_+-=[]{}|;:,.<>?";

/// Output encoding of a generated value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Upper/lowercase letters and digits, optionally punctuation.
    #[default]
    Alphanumeric,
    /// Standard base64 (with padding) of raw random bytes.
    Base64,
    /// Lowercase hexadecimal.
    Hex,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alphanumeric => write!(f, "alphanumeric"),
            Self::Base64 => write!(f, "base64"),
            Self::Hex => write!(f, "hex"),
        }
    }
}

impl FromStr for Encoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "alphanumeric" => Ok(Self::Alphanumeric),
            "base64" => Ok(Self::Base64),
            "hex" => Ok(Self::Hex),
            other => Err(Error::validation(format!(
                "unknown encoding '{other}'; supported: alphanumeric, base64, hex"
            ))),
        }
    }
}

/// Parameters for one generated value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationSpec {
    /// Requested length: characters for alphanumeric/hex, random bytes for base64.
    pub length: usize,
    /// Output encoding.
    #[serde(default)]
    pub encoding: Encoding,
    /// Include [`SPECIAL_CHARS`]; alphanumeric only.
    #[serde(default)]
    pub include_special_chars: bool,
}

impl GenerationSpec {
    /// Creates generation parameters with the given length and encoding.
    #[must_use]
    pub const fn new(length: usize, encoding: Encoding) -> Self {
        Self {
            length,
            encoding,
            include_special_chars: false,
        }
    }

    /// Enables punctuation in alphanumeric output.
    #[must_use]
    pub const fn with_special_chars(mut self) -> Self {
        self.include_special_chars = true;
        self
    }

    /// Checks the parameters against a minimum length.
    pub fn validate(&self, min_length: usize) -> Result<()> {
        if self.length < min_length {
            return Err(Error::validation(format!(
                "length {} is below the minimum of {min_length}",
                self.length
            )));
        }
        if self.length > MAX_LENGTH {
            return Err(Error::validation(format!(
                "length {} exceeds the maximum of {MAX_LENGTH}",
                self.length
            )));
        }
        if self.include_special_chars && self.encoding != Encoding::Alphanumeric {
            return Err(Error::validation(format!(
                "special characters are only supported for alphanumeric encoding, not {}",
                self.encoding
            )));
        }
        Ok(())
    }
}

impl Default for GenerationSpec {
    fn default() -> Self {
        Self::new(DEFAULT_LENGTH, Encoding::Alphanumeric)
    }
}

/// Generates credential values from the OS CSPRNG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecretGenerator {
    min_length: usize,
}

impl SecretGenerator {
    /// Creates a generator that rejects lengths below `min_length`.
    ///
    /// A `min_length` of zero is raised to one; empty secrets are never valid.
    #[must_use]
    pub fn new(min_length: usize) -> Self {
        Self {
            min_length: min_length.max(1),
        }
    }

    /// Generator for generic secret-store values.
    #[must_use]
    pub fn generic() -> Self {
        Self::new(GENERIC_SECRET_MIN_LENGTH)
    }

    /// Generator for database passwords.
    #[must_use]
    pub fn database_password() -> Self {
        Self::new(DATABASE_PASSWORD_MIN_LENGTH)
    }

    /// The minimum accepted length.
    #[must_use]
    pub const fn min_length(&self) -> usize {
        self.min_length
    }

    /// Generates one value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the parameters are out of range.
    pub fn generate(&self, spec: &GenerationSpec) -> Result<SecretString> {
        spec.validate(self.min_length)?;

        let value = match spec.encoding {
            Encoding::Alphanumeric => alphanumeric(spec.length, spec.include_special_chars),
            Encoding::Base64 => {
                let mut bytes = random_bytes(spec.length);
                let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
                bytes.zeroize();
                encoded
            }
            Encoding::Hex => {
                let mut bytes = random_bytes(spec.length.div_ceil(2));
                let mut encoded = hex::encode(&bytes);
                bytes.zeroize();
                encoded.truncate(spec.length);
                encoded
            }
        };

        Ok(SecretString::new(value))
    }
}

impl Default for SecretGenerator {
    fn default() -> Self {
        Self::generic()
    }
}

/// The charset used for alphanumeric output.
#[must_use]
pub fn alphanumeric_charset(include_special_chars: bool) -> Vec<u8> {
    let mut charset = Vec::with_capacity(62 + SPECIAL_CHARS.len());
    charset.extend_from_slice(UPPERCASE);
    charset.extend_from_slice(LOWERCASE);
    charset.extend_from_slice(DIGITS);
    if include_special_chars {
        charset.extend_from_slice(SPECIAL_CHARS);
    }
    charset
}

fn alphanumeric(length: usize, include_special_chars: bool) -> String {
    let charset = alphanumeric_charset(include_special_chars);
    let mut rng = OsRng;
    // gen_range samples without modulo bias.
    (0..length)
        .map(|_| char::from(charset[rng.gen_range(0..charset.len())]))
        .collect()
}

fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    bytes
}
