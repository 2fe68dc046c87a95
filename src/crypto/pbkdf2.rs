//! Password-based KDF (PBKDF2) codec.
//!
//! There is no `generate_key` and no export for this family: a password must
//! always be supplied by the caller, and it never leaves the engine again.

use async_trait::async_trait;

use crate::algorithm::Algorithm;
use crate::error::{Error, Result};
use crate::key::{CryptoKey, KeyData, KeyFormat, KeyKind, KeyUsage};
use crate::native::{offload, NativeKey, Pbkdf2Key};
use crate::subtle::Codec;

pub(crate) static PBKDF2: Pbkdf2Codec = Pbkdf2Codec;

#[derive(Debug)]
pub(crate) struct Pbkdf2Codec;

#[async_trait]
impl Codec for Pbkdf2Codec {
    async fn import_key(
        &self,
        format: KeyFormat,
        data: KeyData,
        mut algorithm: Algorithm,
        extractable: bool,
        usages: &[KeyUsage],
    ) -> Result<CryptoKey> {
        let raw = match format {
            KeyFormat::Jwk => data.into_jwk()?.require("k")?,
            KeyFormat::Raw => data.into_bytes()?,
            other => {
                return Err(Error::config(format!(
                    "importKey: wrong format value '{other}' for {}",
                    algorithm.name
                )));
            }
        };
        algorithm.name = algorithm.name.to_ascii_uppercase();
        algorithm.length = Some((raw.len() * 8) as u32);
        let key = offload(move || Pbkdf2Key::import(&raw)).await?;
        Ok(CryptoKey::new(
            NativeKey::Pbkdf2(key),
            algorithm,
            KeyKind::Secret,
            extractable,
            usages.to_vec(),
        ))
    }

    async fn derive_bits(
        &self,
        algorithm: &Algorithm,
        base_key: &CryptoKey,
        length: u32,
    ) -> Result<Vec<u8>> {
        let hash = algorithm.hash_kind()?;
        let salt = algorithm
            .salt
            .clone()
            .ok_or_else(|| Error::config("PBKDF2: salt parameter is required"))?;
        let iterations = algorithm
            .iterations
            .ok_or_else(|| Error::config("PBKDF2: iterations parameter is required"))?;
        let native = base_key.native_arc();
        offload(move || {
            native
                .as_pbkdf2()?
                .derive_bits(hash, &salt, iterations, length)
        })
        .await
    }

    async fn derive_key(
        &self,
        algorithm: &Algorithm,
        base_key: &CryptoKey,
        derived_type: Algorithm,
        extractable: bool,
        usages: &[KeyUsage],
    ) -> Result<CryptoKey> {
        let bits = derived_type.length.ok_or_else(|| {
            Error::config("derived key type: length parameter is required")
        })?;
        let raw = self.derive_bits(algorithm, base_key, bits).await?;
        match derived_type.normalized().as_str() {
            "aes-cbc" | "aes-gcm" | "aes-kw" => {
                super::aes::AES
                    .import_key(
                        KeyFormat::Raw,
                        KeyData::Bytes(raw),
                        derived_type,
                        extractable,
                        usages,
                    )
                    .await
            }
            "hmac" => {
                super::hmac::HMAC
                    .import_key(
                        KeyFormat::Raw,
                        KeyData::Bytes(raw),
                        derived_type,
                        extractable,
                        usages,
                    )
                    .await
            }
            _ => Err(Error::not_supported(&derived_type.name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn password_key(password: &[u8]) -> CryptoKey {
        PBKDF2
            .import_key(
                KeyFormat::Raw,
                KeyData::from(password),
                Algorithm::new("pbkdf2"),
                false,
                &[KeyUsage::DeriveKey, KeyUsage::DeriveBits],
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn import_fixes_the_length_and_uppercases_the_name() {
        let key = password_key(b"hunter2").await;
        assert_eq!(key.algorithm.name, "PBKDF2");
        assert_eq!(key.algorithm.length, Some(56));
        assert_eq!(key.kind, KeyKind::Secret);
    }

    #[tokio::test]
    async fn derive_bits_is_deterministic() {
        let key = password_key(b"password").await;
        let params = Algorithm::new("PBKDF2")
            .with_hash("SHA-256")
            .with_salt(b"salt".to_vec())
            .with_iterations(100);
        let first = PBKDF2.derive_bits(&params, &key, 256).await.unwrap();
        let second = PBKDF2.derive_bits(&params, &key, 256).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 32);
    }

    #[tokio::test]
    async fn derive_key_into_hmac_and_aes() {
        let key = password_key(b"password").await;
        let params = Algorithm::new("PBKDF2")
            .with_hash("SHA-256")
            .with_salt(b"salt".to_vec())
            .with_iterations(10);

        let aes = PBKDF2
            .derive_key(
                &params,
                &key,
                Algorithm::new("AES-GCM").with_length(256),
                true,
                &[KeyUsage::Encrypt, KeyUsage::Decrypt],
            )
            .await
            .unwrap();
        assert_eq!(aes.algorithm.length, Some(256));

        let mac = PBKDF2
            .derive_key(
                &params,
                &key,
                Algorithm::new("HMAC").with_hash("SHA-256").with_length(256),
                true,
                &[KeyUsage::Sign],
            )
            .await
            .unwrap();
        assert_eq!(mac.algorithm.length, Some(256));
    }

    #[tokio::test]
    async fn derive_key_rejects_asymmetric_targets() {
        let key = password_key(b"password").await;
        let params = Algorithm::new("PBKDF2")
            .with_hash("SHA-256")
            .with_salt(b"salt".to_vec())
            .with_iterations(10);
        let err = PBKDF2
            .derive_key(
                &params,
                &key,
                Algorithm::new("RSA-OAEP").with_length(256),
                true,
                &[],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotSupported(name) if name == "RSA-OAEP"));
    }

    #[tokio::test]
    async fn generate_key_is_not_part_of_this_family() {
        let err = PBKDF2
            .generate_key(Algorithm::new("PBKDF2"), false, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotSupported(name) if name == "PBKDF2"));
    }
}
