//! Algorithm descriptors and name normalization.
//!
//! Every facade operation takes an [`Algorithm`]: the family name plus the
//! family-specific parameters that operation needs. Descriptors are normalized
//! (case-folded name, defaults applied) before any dispatch decision is made,
//! and a codec may enrich its own copy, for example by overwriting `length`
//! with the actual byte length of imported key material.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::key::CryptoKey;

/// Hash identifiers understood by the native engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashKind {
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl HashKind {
    /// Resolve a case-insensitive hash name ("SHA-256", "sha-1", ...).
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "sha-1" => Ok(Self::Sha1),
            "sha-224" => Ok(Self::Sha224),
            "sha-256" => Ok(Self::Sha256),
            "sha-384" => Ok(Self::Sha384),
            "sha-512" => Ok(Self::Sha512),
            _ => Err(Error::not_supported(name)),
        }
    }

    /// Canonical display name, e.g. `SHA-256`.
    pub fn name(self) -> &'static str {
        match self {
            Self::Sha1 => "SHA-1",
            Self::Sha224 => "SHA-224",
            Self::Sha256 => "SHA-256",
            Self::Sha384 => "SHA-384",
            Self::Sha512 => "SHA-512",
        }
    }

    /// Digest output size in bits.
    pub fn output_bits(self) -> u32 {
        match self {
            Self::Sha1 => 160,
            Self::Sha224 => 224,
            Self::Sha256 => 256,
            Self::Sha384 => 384,
            Self::Sha512 => 512,
        }
    }

    /// The digit suffix of the hash name, used when synthesizing JWK `alg`
    /// labels ("RS256", "HS512", "RS1", ...).
    pub fn name_digits(self) -> &'static str {
        match self {
            Self::Sha1 => "1",
            Self::Sha224 => "224",
            Self::Sha256 => "256",
            Self::Sha384 => "384",
            Self::Sha512 => "512",
        }
    }
}

/// A caller-supplied algorithm descriptor.
///
/// Only `name` is universal; everything else is read by the family the name
/// resolves to. Unknown fields are simply ignored by the codec, which keeps a
/// single descriptor type workable across the whole catalog, the same way a
/// loosely-typed parameter object would be.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Algorithm {
    pub name: String,

    /// Hash name for HMAC, RSA schemes, ECDSA and the KDFs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,

    /// Key length in bits for symmetric families; counter bit-length for the
    /// AES-CTR transform parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,

    /// Initialization vector (AES-GCM, AES-CBC).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iv: Option<Vec<u8>>,

    /// Additional authenticated data (AES-GCM). Defaults to empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_data: Option<Vec<u8>>,

    /// Authentication tag length in bits (AES-GCM). Defaults to 128.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_length: Option<u32>,

    /// Initial counter block (AES-CTR).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counter: Option<Vec<u8>>,

    /// Curve label for the EC family (`P-256`, `K-256`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub named_curve: Option<String>,

    /// RSA modulus length in bits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modulus_length: Option<u32>,

    /// RSA public exponent, big-endian.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_exponent: Option<Vec<u8>>,

    /// PSS salt length in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salt_length: Option<u32>,

    /// PBKDF2 salt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salt: Option<Vec<u8>>,

    /// PBKDF2 iteration count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u32>,

    /// OAEP label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<Vec<u8>>,

    /// Peer public key for ECDH derivation. Operation-only, never persisted.
    #[serde(skip)]
    pub public: Option<Box<CryptoKey>>,
}

impl Algorithm {
    /// A descriptor carrying just a family name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Case-folded family name used for dispatch.
    pub fn normalized(&self) -> String {
        self.name.to_ascii_lowercase()
    }

    /// Resolve the `hash` parameter, which must be present.
    pub fn hash_kind(&self) -> Result<HashKind> {
        let hash = self.hash.as_deref().ok_or_else(|| {
            Error::config(format!("{}: hash parameter is required", self.name))
        })?;
        HashKind::from_name(hash)
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    pub fn with_length(mut self, bits: u32) -> Self {
        self.length = Some(bits);
        self
    }

    pub fn with_iv(mut self, iv: impl Into<Vec<u8>>) -> Self {
        self.iv = Some(iv.into());
        self
    }

    pub fn with_additional_data(mut self, aad: impl Into<Vec<u8>>) -> Self {
        self.additional_data = Some(aad.into());
        self
    }

    pub fn with_tag_length(mut self, bits: u32) -> Self {
        self.tag_length = Some(bits);
        self
    }

    pub fn with_counter(mut self, counter: impl Into<Vec<u8>>) -> Self {
        self.counter = Some(counter.into());
        self
    }

    pub fn with_named_curve(mut self, curve: impl Into<String>) -> Self {
        self.named_curve = Some(curve.into());
        self
    }

    pub fn with_modulus_length(mut self, bits: u32) -> Self {
        self.modulus_length = Some(bits);
        self
    }

    pub fn with_public_exponent(mut self, exponent: impl Into<Vec<u8>>) -> Self {
        self.public_exponent = Some(exponent.into());
        self
    }

    pub fn with_salt_length(mut self, bytes: u32) -> Self {
        self.salt_length = Some(bytes);
        self
    }

    pub fn with_salt(mut self, salt: impl Into<Vec<u8>>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = Some(iterations);
        self
    }

    pub fn with_label(mut self, label: impl Into<Vec<u8>>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_public(mut self, peer: CryptoKey) -> Self {
        self.public = Some(Box::new(peer));
        self
    }
}
