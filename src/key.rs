//! Key handles and the value types that travel with them.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::algorithm::Algorithm;
use crate::error::{Error, Result};
use crate::jwk::JsonWebKey;
use crate::native::NativeKey;

/// Key class: symmetric secret, or one half of an asymmetric pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
    Secret,
    Public,
    Private,
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Secret => "secret",
            Self::Public => "public",
            Self::Private => "private",
        };
        f.write_str(name)
    }
}

/// Operations a key is allowed to take part in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyUsage {
    Encrypt,
    Decrypt,
    Sign,
    Verify,
    DeriveKey,
    DeriveBits,
    WrapKey,
    UnwrapKey,
}

impl KeyUsage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Encrypt => "encrypt",
            Self::Decrypt => "decrypt",
            Self::Sign => "sign",
            Self::Verify => "verify",
            Self::DeriveKey => "deriveKey",
            Self::DeriveBits => "deriveBits",
            Self::WrapKey => "wrapKey",
            Self::UnwrapKey => "unwrapKey",
        }
    }
}

impl fmt::Display for KeyUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Intersect the class-allowed usage set with what the caller requested.
pub(crate) fn filter_usages(allowed: &[KeyUsage], requested: &[KeyUsage]) -> Vec<KeyUsage> {
    allowed
        .iter()
        .copied()
        .filter(|usage| requested.contains(usage))
        .collect()
}

/// Key material interchange formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFormat {
    Raw,
    Jwk,
    Pkcs8,
    Spki,
}

impl KeyFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Jwk => "jwk",
            Self::Pkcs8 => "pkcs8",
            Self::Spki => "spki",
        }
    }
}

impl FromStr for KeyFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "raw" => Ok(Self::Raw),
            "jwk" => Ok(Self::Jwk),
            "pkcs8" => Ok(Self::Pkcs8),
            "spki" => Ok(Self::Spki),
            _ => Err(Error::config(format!("unknown key format '{s}'"))),
        }
    }
}

impl fmt::Display for KeyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An opaque native key reference plus its public metadata snapshot.
///
/// Handles are immutable once constructed and cheap to clone; the native
/// material is shared behind an `Arc`, so a handle can be moved across
/// concurrently running operations without synchronization.
#[derive(Debug, Clone)]
pub struct CryptoKey {
    native: Arc<NativeKey>,
    pub algorithm: Algorithm,
    pub kind: KeyKind,
    pub extractable: bool,
    pub usages: Vec<KeyUsage>,
}

impl CryptoKey {
    pub(crate) fn new(
        native: NativeKey,
        algorithm: Algorithm,
        kind: KeyKind,
        extractable: bool,
        usages: Vec<KeyUsage>,
    ) -> Self {
        Self::from_shared(Arc::new(native), algorithm, kind, extractable, usages)
    }

    /// Build a handle over already-shared native material; generated key pairs
    /// hand the same native reference to both halves.
    pub(crate) fn from_shared(
        native: Arc<NativeKey>,
        algorithm: Algorithm,
        kind: KeyKind,
        extractable: bool,
        usages: Vec<KeyUsage>,
    ) -> Self {
        Self {
            native,
            algorithm,
            kind,
            extractable,
            usages,
        }
    }

    pub(crate) fn native(&self) -> &NativeKey {
        &self.native
    }

    pub(crate) fn native_arc(&self) -> Arc<NativeKey> {
        Arc::clone(&self.native)
    }

    pub fn has_usage(&self, usage: KeyUsage) -> bool {
        self.usages.contains(&usage)
    }
}

/// The two halves of a generated asymmetric key, sharing one descriptor.
#[derive(Debug, Clone)]
pub struct KeyPair {
    pub public: CryptoKey,
    pub private: CryptoKey,
}

/// Result of `generate_key`: a single secret key or an asymmetric pair.
#[derive(Debug, Clone)]
pub enum GeneratedKey {
    Single(CryptoKey),
    Pair(KeyPair),
}

impl GeneratedKey {
    pub fn into_single(self) -> Result<CryptoKey> {
        match self {
            Self::Single(key) => Ok(key),
            Self::Pair(_) => Err(Error::data("expected a secret key, got a key pair")),
        }
    }

    pub fn into_pair(self) -> Result<KeyPair> {
        match self {
            Self::Pair(pair) => Ok(pair),
            Self::Single(_) => Err(Error::data("expected a key pair, got a secret key")),
        }
    }
}

/// Import payload: raw/binary formats carry bytes, `jwk` carries a record.
#[derive(Debug, Clone)]
pub enum KeyData {
    Bytes(Vec<u8>),
    Jwk(JsonWebKey),
}

impl KeyData {
    pub(crate) fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            Self::Bytes(bytes) => Ok(bytes),
            Self::Jwk(_) => Err(Error::config("importKey: keyData is not a byte buffer")),
        }
    }

    pub(crate) fn into_jwk(self) -> Result<JsonWebKey> {
        match self {
            Self::Jwk(jwk) => Ok(jwk),
            Self::Bytes(_) => Err(Error::config(
                "importKey: the jwk format requires a structured key record",
            )),
        }
    }
}

impl From<Vec<u8>> for KeyData {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<&[u8]> for KeyData {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

impl From<JsonWebKey> for KeyData {
    fn from(jwk: JsonWebKey) -> Self {
        Self::Jwk(jwk)
    }
}

/// Export result: raw bytes or a structured record, depending on the format.
#[derive(Debug, Clone)]
pub enum ExportedKey {
    Bytes(Vec<u8>),
    Jwk(JsonWebKey),
}

impl ExportedKey {
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            Self::Bytes(bytes) => Ok(bytes),
            Self::Jwk(_) => Err(Error::data("export produced a structured record, not bytes")),
        }
    }

    pub fn into_jwk(self) -> Result<JsonWebKey> {
        match self {
            Self::Jwk(jwk) => Ok(jwk),
            Self::Bytes(_) => Err(Error::data("export produced raw bytes, not a record")),
        }
    }

    pub fn as_jwk(&self) -> Option<&JsonWebKey> {
        match self {
            Self::Jwk(jwk) => Some(jwk),
            Self::Bytes(_) => None,
        }
    }
}
