//! Keyed-hash (HMAC) codec.

use async_trait::async_trait;

use crate::algorithm::{Algorithm, HashKind};
use crate::error::{Error, Result};
use crate::jwk::{b64url_encode, JsonWebKey};
use crate::key::{
    CryptoKey, ExportedKey, GeneratedKey, KeyData, KeyFormat, KeyKind, KeyUsage,
};
use crate::native::{offload, HmacKey, NativeKey};
use crate::subtle::Codec;

pub(crate) static HMAC: HmacCodec = HmacCodec;

#[derive(Debug)]
pub(crate) struct HmacCodec;

/// Default key length when the descriptor omits one: the hash's native output
/// size. Only the four signing hashes carry a default.
fn default_length_bits(algorithm: &Algorithm) -> Result<u32> {
    let name = algorithm
        .hash
        .as_deref()
        .ok_or_else(|| Error::config("HMAC: hash parameter is required"))?;
    match HashKind::from_name(name)? {
        HashKind::Sha1 => Ok(160),
        HashKind::Sha256 => Ok(256),
        HashKind::Sha384 => Ok(384),
        HashKind::Sha512 => Ok(512),
        HashKind::Sha224 => Err(Error::not_supported(name)),
    }
}

#[async_trait]
impl Codec for HmacCodec {
    async fn generate_key(
        &self,
        algorithm: Algorithm,
        extractable: bool,
        usages: &[KeyUsage],
    ) -> Result<GeneratedKey> {
        let bits = match algorithm.length {
            Some(bits) => bits,
            None => default_length_bits(&algorithm)?,
        };
        let key = offload(move || HmacKey::generate(bits)).await?;
        Ok(GeneratedKey::Single(CryptoKey::new(
            NativeKey::Hmac(key),
            algorithm,
            KeyKind::Secret,
            extractable,
            usages.to_vec(),
        )))
    }

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
        algorithm.length = Some((raw.len() * 8) as u32);
        let key = offload(move || HmacKey::import(&raw)).await?;
        Ok(CryptoKey::new(
            NativeKey::Hmac(key),
            algorithm,
            KeyKind::Secret,
            extractable,
            usages.to_vec(),
        ))
    }

    async fn export_key(&self, format: KeyFormat, key: &CryptoKey) -> Result<ExportedKey> {
        let native = key.native().as_hmac()?;
        match format {
            KeyFormat::Jwk => {
                let digits = key.algorithm.hash_kind()?.name_digits();
                Ok(ExportedKey::Jwk(JsonWebKey {
                    kty: "oct".to_string(),
                    alg: Some(format!("HS{digits}")),
                    key_ops: Some(vec![KeyUsage::Sign, KeyUsage::Verify]),
                    ext: Some(true),
                    k: Some(b64url_encode(&native.export())),
                    ..Default::default()
                }))
            }
            KeyFormat::Raw => Ok(ExportedKey::Bytes(native.export())),
            other => Err(Error::config(format!(
                "exportKey: unknown export format '{other}'"
            ))),
        }
    }

    async fn sign(&self, _algorithm: &Algorithm, key: &CryptoKey, data: &[u8]) -> Result<Vec<u8>> {
        let hash = key.algorithm.hash_kind()?;
        let native = key.native_arc();
        let data = data.to_vec();
        offload(move || native.as_hmac()?.sign(hash, &data)).await
    }

    async fn verify(
        &self,
        _algorithm: &Algorithm,
        key: &CryptoKey,
        signature: &[u8],
        data: &[u8],
    ) -> Result<bool> {
        let hash = key.algorithm.hash_kind()?;
        let native = key.native_arc();
        let signature = signature.to_vec();
        let data = data.to_vec();
        offload(move || native.as_hmac()?.verify(hash, &data, &signature)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn generate_defaults_the_length_to_the_hash_size() {
        let key = HMAC
            .generate_key(
                Algorithm::new("HMAC").with_hash("SHA-384"),
                true,
                &[KeyUsage::Sign, KeyUsage::Verify],
            )
            .await
            .unwrap()
            .into_single()
            .unwrap();
        let raw = HMAC
            .export_key(KeyFormat::Raw, &key)
            .await
            .unwrap()
            .into_bytes()
            .unwrap();
        assert_eq!(raw.len(), 48);
    }

    #[tokio::test]
    async fn default_length_rejects_hashes_outside_the_table() {
        let err = HMAC
            .generate_key(
                Algorithm::new("HMAC").with_hash("SHA-224"),
                true,
                &[KeyUsage::Sign],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotSupported(name) if name == "SHA-224"));
    }

    #[tokio::test]
    async fn sign_verify_roundtrip_via_jwk_import() {
        let alg = Algorithm::new("HMAC").with_hash("SHA-256");
        let key = HMAC
            .generate_key(alg.clone(), true, &[KeyUsage::Sign, KeyUsage::Verify])
            .await
            .unwrap()
            .into_single()
            .unwrap();
        let tag = HMAC.sign(&alg, &key, b"message").await.unwrap();

        let jwk = HMAC
            .export_key(KeyFormat::Jwk, &key)
            .await
            .unwrap()
            .into_jwk()
            .unwrap();
        assert_eq!(jwk.alg.as_deref(), Some("HS256"));

        let imported = HMAC
            .import_key(
                KeyFormat::Jwk,
                KeyData::from(jwk),
                alg.clone(),
                true,
                &[KeyUsage::Verify],
            )
            .await
            .unwrap();
        assert!(HMAC.verify(&alg, &imported, &tag, b"message").await.unwrap());
        assert!(!HMAC.verify(&alg, &imported, &tag, b"other").await.unwrap());
    }
}
