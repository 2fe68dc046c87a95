//! The dispatch/resolution engine.
//!
//! [`SubtleCrypto`] normalizes every caller-supplied descriptor, resolves the
//! family codec from a fixed registry, runs the cheap parameter checks
//! synchronously, and forwards the operation. Wrap/unwrap are composed here
//! from export/import plus the encrypt/decrypt primitives.

use async_trait::async_trait;
use log::debug;

use crate::algorithm::{Algorithm, HashKind};
use crate::crypto::{aes, ec, hmac, pbkdf2, rsa};
use crate::error::{Error, Result};
use crate::key::{
    CryptoKey, ExportedKey, GeneratedKey, KeyData, KeyFormat, KeyUsage,
};
use crate::native;

/// A family codec. Every family implements the operations it supports; the
/// defaults reject the call with a `NotSupported` error naming the requested
/// algorithm, so a missing capability fails at the call site rather than as a
/// missing method.
#[async_trait]
pub(crate) trait Codec: Send + Sync + std::fmt::Debug {
    async fn generate_key(
        &self,
        algorithm: Algorithm,
        extractable: bool,
        usages: &[KeyUsage],
    ) -> Result<GeneratedKey> {
        let _ = (extractable, usages);
        Err(Error::not_supported(&algorithm.name))
    }

    async fn import_key(
        &self,
        format: KeyFormat,
        data: KeyData,
        algorithm: Algorithm,
        extractable: bool,
        usages: &[KeyUsage],
    ) -> Result<CryptoKey>;

    async fn export_key(&self, format: KeyFormat, key: &CryptoKey) -> Result<ExportedKey> {
        let _ = format;
        Err(Error::not_supported(&key.algorithm.name))
    }

    async fn encrypt(&self, algorithm: &Algorithm, key: &CryptoKey, data: &[u8]) -> Result<Vec<u8>> {
        let _ = (key, data);
        Err(Error::not_supported(&algorithm.name))
    }

    async fn decrypt(&self, algorithm: &Algorithm, key: &CryptoKey, data: &[u8]) -> Result<Vec<u8>> {
        let _ = (key, data);
        Err(Error::not_supported(&algorithm.name))
    }

    async fn sign(&self, algorithm: &Algorithm, key: &CryptoKey, data: &[u8]) -> Result<Vec<u8>> {
        let _ = (key, data);
        Err(Error::not_supported(&algorithm.name))
    }

    async fn verify(
        &self,
        algorithm: &Algorithm,
        key: &CryptoKey,
        signature: &[u8],
        data: &[u8],
    ) -> Result<bool> {
        let _ = (key, signature, data);
        Err(Error::not_supported(&algorithm.name))
    }

    async fn derive_bits(
        &self,
        algorithm: &Algorithm,
        base_key: &CryptoKey,
        length: u32,
    ) -> Result<Vec<u8>> {
        let _ = (base_key, length);
        Err(Error::not_supported(&algorithm.name))
    }

    async fn derive_key(
        &self,
        algorithm: &Algorithm,
        base_key: &CryptoKey,
        derived_type: Algorithm,
        extractable: bool,
        usages: &[KeyUsage],
    ) -> Result<CryptoKey> {
        let _ = (base_key, derived_type, extractable, usages);
        Err(Error::not_supported(&algorithm.name))
    }
}

/// Resolve a codec by exact, case-insensitive family name.
fn resolve(name: &str) -> Result<&'static dyn Codec> {
    let codec: &'static dyn Codec = match name.to_ascii_lowercase().as_str() {
        "aes-ecb" | "aes-cbc" | "aes-ctr" | "aes-gcm" | "aes-kw" => &aes::AES,
        "rsassa-pkcs1-v1_5" => &rsa::RSA_PKCS1,
        "rsa-pss" => &rsa::RSA_PSS,
        "rsa-oaep" => &rsa::RSA_OAEP,
        "ecdsa" | "ecdh" => &ec::EC,
        "hmac" => &hmac::HMAC,
        "pbkdf2" => &pbkdf2::PBKDF2,
        _ => return Err(Error::not_supported(name)),
    };
    Ok(codec)
}

fn require_usage(key: &CryptoKey, usage: KeyUsage) -> Result<()> {
    if key.has_usage(usage) {
        return Ok(());
    }
    Err(Error::config(format!(
        "key does not allow the '{usage}' operation"
    )))
}

/// The cryptographic-operations facade.
///
/// Every public operation is asynchronous: parameter validation may fail
/// before any native work starts, but engine failures only ever surface
/// through the returned future.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubtleCrypto;

impl SubtleCrypto {
    pub fn new() -> Self {
        Self
    }

    /// Hash `data` with one of the fixed digest algorithms. No key involved,
    /// so this is handled inline rather than through a codec.
    pub async fn digest(&self, algorithm: &Algorithm, data: &[u8]) -> Result<Vec<u8>> {
        let kind = match algorithm.normalized().as_str() {
            "sha-1" => HashKind::Sha1,
            "sha-224" => HashKind::Sha224,
            "sha-256" => HashKind::Sha256,
            "sha-384" => HashKind::Sha384,
            "sha-512" => HashKind::Sha512,
            _ => return Err(Error::not_supported(&algorithm.name)),
        };
        let data = data.to_vec();
        native::offload(move || Ok(native::digest(kind, &data))).await
    }

    pub async fn generate_key(
        &self,
        algorithm: &Algorithm,
        extractable: bool,
        usages: &[KeyUsage],
    ) -> Result<GeneratedKey> {
        debug!("generateKey: {}", algorithm.name);
        resolve(&algorithm.name)?
            .generate_key(algorithm.clone(), extractable, usages)
            .await
    }

    pub async fn import_key(
        &self,
        format: KeyFormat,
        data: KeyData,
        algorithm: &Algorithm,
        extractable: bool,
        usages: &[KeyUsage],
    ) -> Result<CryptoKey> {
        debug!("importKey: {} as {format}", algorithm.name);
        resolve(&algorithm.name)?
            .import_key(format, data, algorithm.clone(), extractable, usages)
            .await
    }

    /// Export resolves the codec from the key's own algorithm; a
    /// non-extractable key never releases its material in any format.
    pub async fn export_key(&self, format: KeyFormat, key: &CryptoKey) -> Result<ExportedKey> {
        if !key.extractable {
            return Err(Error::config("key is not extractable"));
        }
        resolve(&key.algorithm.name)?.export_key(format, key).await
    }

    pub async fn encrypt(
        &self,
        algorithm: &Algorithm,
        key: &CryptoKey,
        data: &[u8],
    ) -> Result<Vec<u8>> {
        require_usage(key, KeyUsage::Encrypt)?;
        resolve(&algorithm.name)?.encrypt(algorithm, key, data).await
    }

    pub async fn decrypt(
        &self,
        algorithm: &Algorithm,
        key: &CryptoKey,
        data: &[u8],
    ) -> Result<Vec<u8>> {
        require_usage(key, KeyUsage::Decrypt)?;
        resolve(&algorithm.name)?.decrypt(algorithm, key, data).await
    }

    pub async fn sign(&self, algorithm: &Algorithm, key: &CryptoKey, data: &[u8]) -> Result<Vec<u8>> {
        require_usage(key, KeyUsage::Sign)?;
        resolve(&algorithm.name)?.sign(algorithm, key, data).await
    }

    pub async fn verify(
        &self,
        algorithm: &Algorithm,
        key: &CryptoKey,
        signature: &[u8],
        data: &[u8],
    ) -> Result<bool> {
        require_usage(key, KeyUsage::Verify)?;
        resolve(&algorithm.name)?
            .verify(algorithm, key, signature, data)
            .await
    }

    pub async fn derive_bits(
        &self,
        algorithm: &Algorithm,
        base_key: &CryptoKey,
        length: u32,
    ) -> Result<Vec<u8>> {
        require_usage(base_key, KeyUsage::DeriveBits)?;
        resolve(&algorithm.name)?
            .derive_bits(algorithm, base_key, length)
            .await
    }

    pub async fn derive_key(
        &self,
        algorithm: &Algorithm,
        base_key: &CryptoKey,
        derived_type: &Algorithm,
        extractable: bool,
        usages: &[KeyUsage],
    ) -> Result<CryptoKey> {
        require_usage(base_key, KeyUsage::DeriveKey)?;
        resolve(&algorithm.name)?
            .derive_key(algorithm, base_key, derived_type.clone(), extractable, usages)
            .await
    }

    /// Export `key` in `format`, serialize the result, and encrypt it under
    /// `wrapping_key`. The dedicated key-wrap family goes straight to its
    /// wrap primitive; every other algorithm flows through the generic
    /// encrypt path, usage checks included.
    pub async fn wrap_key(
        &self,
        format: KeyFormat,
        key: &CryptoKey,
        wrapping_key: &CryptoKey,
        wrap_algorithm: &Algorithm,
    ) -> Result<Vec<u8>> {
        require_usage(wrapping_key, KeyUsage::WrapKey)?;
        let exported = self.export_key(format, key).await?;
        let serialized = match exported {
            ExportedKey::Bytes(bytes) => bytes,
            ExportedKey::Jwk(jwk) => serde_json::to_vec(&jwk)?,
        };
        if wrap_algorithm.normalized() == "aes-kw" {
            aes::AES.encrypt(wrap_algorithm, wrapping_key, &serialized).await
        } else {
            self.encrypt(wrap_algorithm, wrapping_key, &serialized).await
        }
    }

    /// The mirror of [`SubtleCrypto::wrap_key`]: decrypt, parse, import.
    #[allow(clippy::too_many_arguments)]
    pub async fn unwrap_key(
        &self,
        format: KeyFormat,
        wrapped_key: &[u8],
        unwrapping_key: &CryptoKey,
        unwrap_algorithm: &Algorithm,
        unwrapped_key_algorithm: &Algorithm,
        extractable: bool,
        usages: &[KeyUsage],
    ) -> Result<CryptoKey> {
        require_usage(unwrapping_key, KeyUsage::UnwrapKey)?;
        let plaintext = if unwrap_algorithm.normalized() == "aes-kw" {
            aes::AES
                .decrypt(unwrap_algorithm, unwrapping_key, wrapped_key)
                .await?
        } else {
            self.decrypt(unwrap_algorithm, unwrapping_key, wrapped_key)
                .await?
        };
        let data = match format {
            KeyFormat::Jwk => KeyData::Jwk(serde_json::from_slice(&plaintext)?),
            _ => KeyData::Bytes(plaintext),
        };
        self.import_key(format, data, unwrapped_key_algorithm, extractable, usages)
            .await
    }
}
