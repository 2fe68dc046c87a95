//! AES family codec: GCM, CBC, CTR, ECB and the dedicated key-wrap transform.

use async_trait::async_trait;

use crate::algorithm::Algorithm;
use crate::error::{Error, Result};
use crate::jwk::{b64url_encode, JsonWebKey};
use crate::key::{
    CryptoKey, ExportedKey, GeneratedKey, KeyData, KeyFormat, KeyKind, KeyUsage,
};
use crate::native::{offload, AesKey, NativeKey};
use crate::subtle::Codec;

pub(crate) static AES: AesCodec = AesCodec;

const DEFAULT_TAG_BITS: u32 = 128;

#[derive(Debug)]
pub(crate) struct AesCodec;

impl AesCodec {
    /// Shared encrypt/decrypt path. The key-wrap family never reaches this:
    /// it has its own primitive and no iv/mode parameters.
    async fn transform(
        &self,
        algorithm: &Algorithm,
        key: &CryptoKey,
        data: &[u8],
        encrypt: bool,
    ) -> Result<Vec<u8>> {
        let native = key.native_arc();
        let data = data.to_vec();
        match algorithm.normalized().as_str() {
            "aes-kw" => {
                offload(move || {
                    let key = native.as_aes()?;
                    if encrypt { key.wrap(&data) } else { key.unwrap(&data) }
                })
                .await
            }
            "aes-gcm" => {
                let iv = algorithm
                    .iv
                    .clone()
                    .ok_or_else(|| Error::config("AES-GCM: iv parameter is required"))?;
                let aad = algorithm.additional_data.clone().unwrap_or_default();
                let tag_bits = algorithm.tag_length.unwrap_or(DEFAULT_TAG_BITS);
                offload(move || {
                    let key = native.as_aes()?;
                    if encrypt {
                        key.encrypt_gcm(&iv, &data, &aad, tag_bits)
                    } else {
                        key.decrypt_gcm(&iv, &data, &aad, tag_bits)
                    }
                })
                .await
            }
            "aes-cbc" => {
                let iv = algorithm
                    .iv
                    .clone()
                    .ok_or_else(|| Error::config("AES-CBC: iv parameter is required"))?;
                offload(move || {
                    let key = native.as_aes()?;
                    if encrypt {
                        key.encrypt_cbc(&iv, &data)
                    } else {
                        key.decrypt_cbc(&iv, &data)
                    }
                })
                .await
            }
            "aes-ctr" => {
                let counter = algorithm
                    .counter
                    .clone()
                    .ok_or_else(|| Error::config("AES-CTR: counter parameter is required"))?;
                let counter_bits = algorithm.length.ok_or_else(|| {
                    Error::config("AES-CTR: counter length parameter is required")
                })?;
                // Symmetric in both directions: CTR only applies a keystream.
                offload(move || native.as_aes()?.apply_ctr(&counter, counter_bits, &data)).await
            }
            "aes-ecb" => {
                offload(move || {
                    let key = native.as_aes()?;
                    if encrypt { key.encrypt_ecb(&data) } else { key.decrypt_ecb(&data) }
                })
                .await
            }
            _ => Err(Error::not_supported(&algorithm.name)),
        }
    }
}

/// The JWK `alg` mode label is the suffix of the algorithm name ("AES-GCM"
/// yields "GCM").
fn mode_suffix(name: &str) -> Result<String> {
    match name.rsplit_once('-') {
        Some((_, suffix)) if !suffix.is_empty() => Ok(suffix.to_ascii_uppercase()),
        _ => Err(Error::data(format!(
            "cannot derive a JWK alg label from algorithm name '{name}'"
        ))),
    }
}

#[async_trait]
impl Codec for AesCodec {
    async fn generate_key(
        &self,
        algorithm: Algorithm,
        extractable: bool,
        usages: &[KeyUsage],
    ) -> Result<GeneratedKey> {
        let bits = algorithm.length.ok_or_else(|| {
            Error::config(format!("{}: length parameter is required", algorithm.name))
        })?;
        let key = offload(move || AesKey::generate((bits / 8) as usize)).await?;
        Ok(GeneratedKey::Single(CryptoKey::new(
            NativeKey::Aes(key),
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
        // The declared length is never trusted; it always reflects the
        // imported material.
        algorithm.length = Some((raw.len() * 8) as u32);
        let key = offload(move || AesKey::import(&raw)).await?;
        Ok(CryptoKey::new(
            NativeKey::Aes(key),
            algorithm,
            KeyKind::Secret,
            extractable,
            usages.to_vec(),
        ))
    }

    async fn export_key(&self, format: KeyFormat, key: &CryptoKey) -> Result<ExportedKey> {
        let native = key.native().as_aes()?;
        match format {
            KeyFormat::Jwk => {
                let mode = mode_suffix(&key.algorithm.name)?;
                let bits = key
                    .algorithm
                    .length
                    .unwrap_or((native.len() * 8) as u32);
                Ok(ExportedKey::Jwk(JsonWebKey {
                    kty: "oct".to_string(),
                    alg: Some(format!("A{bits}{mode}")),
                    key_ops: Some(vec![
                        KeyUsage::Encrypt,
                        KeyUsage::Decrypt,
                        KeyUsage::WrapKey,
                        KeyUsage::UnwrapKey,
                    ]),
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

    async fn encrypt(&self, algorithm: &Algorithm, key: &CryptoKey, data: &[u8]) -> Result<Vec<u8>> {
        self.transform(algorithm, key, data, true).await
    }

    async fn decrypt(&self, algorithm: &Algorithm, key: &CryptoKey, data: &[u8]) -> Result<Vec<u8>> {
        self.transform(algorithm, key, data, false).await
    }
}
