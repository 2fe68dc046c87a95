//! RSA codec. One codec type covers the three schemes; shared behavior
//! (generate, import, the common export fields) is scheme-independent and the
//! scheme tag only decides signing/encryption semantics and the JWK
//! annotations.

use std::sync::Arc;

use async_trait::async_trait;

use crate::algorithm::Algorithm;
use crate::error::{Error, Result};
use crate::jwk::{b64url_encode, JsonWebKey};
use crate::key::{
    filter_usages, CryptoKey, ExportedKey, GeneratedKey, KeyData, KeyFormat, KeyKind, KeyPair,
    KeyUsage,
};
use crate::native::{offload, NativeKey, RsaComponents, RsaKey};
use crate::subtle::Codec;

pub(crate) static RSA_PKCS1: RsaCodec = RsaCodec {
    scheme: RsaScheme::Pkcs1,
};
pub(crate) static RSA_PSS: RsaCodec = RsaCodec {
    scheme: RsaScheme::Pss,
};
pub(crate) static RSA_OAEP: RsaCodec = RsaCodec {
    scheme: RsaScheme::Oaep,
};

/// Scheme variants of the RSA family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RsaScheme {
    Pkcs1,
    Pss,
    Oaep,
}

#[derive(Debug)]
pub(crate) struct RsaCodec {
    pub(crate) scheme: RsaScheme,
}

const PRIVATE_USAGES: [KeyUsage; 3] = [KeyUsage::Sign, KeyUsage::Decrypt, KeyUsage::UnwrapKey];
const PUBLIC_USAGES: [KeyUsage; 3] = [KeyUsage::Verify, KeyUsage::Encrypt, KeyUsage::WrapKey];

impl RsaCodec {
    /// Scheme-specific JWK export annotations.
    fn annotate(&self, jwk: &mut JsonWebKey, key: &CryptoKey) -> Result<()> {
        let digits = key.algorithm.hash_kind()?.name_digits();
        match self.scheme {
            RsaScheme::Pkcs1 => {
                jwk.alg = Some(format!("RS{digits}"));
                jwk.ext = Some(true);
                if key.kind == KeyKind::Public {
                    jwk.key_ops = Some(vec![KeyUsage::Verify]);
                }
            }
            RsaScheme::Pss => {
                jwk.alg = Some(format!("PS{digits}"));
                jwk.ext = Some(true);
                if key.kind == KeyKind::Public {
                    jwk.key_ops = Some(vec![KeyUsage::Verify]);
                }
            }
            RsaScheme::Oaep => {
                let mut alg = "RSA-OAEP".to_string();
                if digits != "1" {
                    alg.push('-');
                    alg.push_str(digits);
                }
                jwk.alg = Some(alg);
                jwk.ext = Some(true);
                jwk.key_ops = Some(if key.kind == KeyKind::Public {
                    vec![KeyUsage::Encrypt, KeyUsage::WrapKey]
                } else {
                    vec![KeyUsage::Decrypt, KeyUsage::UnwrapKey]
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Codec for RsaCodec {
    async fn generate_key(
        &self,
        algorithm: Algorithm,
        extractable: bool,
        usages: &[KeyUsage],
    ) -> Result<GeneratedKey> {
        let modulus_bits = algorithm.modulus_length.ok_or_else(|| {
            Error::config(format!(
                "{}: modulusLength parameter is required",
                algorithm.name
            ))
        })? as usize;
        let exponent = algorithm.public_exponent.clone().ok_or_else(|| {
            Error::config(format!(
                "{}: publicExponent parameter is required",
                algorithm.name
            ))
        })?;
        // A 3-byte exponent encoding selects F4; anything else falls back to
        // the engine's short default exponent.
        let use_f4 = exponent.len() == 3;

        let key = offload(move || RsaKey::generate(modulus_bits, use_f4)).await?;
        let native = Arc::new(NativeKey::Rsa(key));

        let private = CryptoKey::from_shared(
            Arc::clone(&native),
            algorithm.clone(),
            KeyKind::Private,
            extractable,
            filter_usages(&PRIVATE_USAGES, usages),
        );
        let public = CryptoKey::from_shared(
            native,
            algorithm,
            KeyKind::Public,
            extractable,
            filter_usages(&PUBLIC_USAGES, usages),
        );
        Ok(GeneratedKey::Pair(KeyPair { public, private }))
    }

    async fn import_key(
        &self,
        format: KeyFormat,
        data: KeyData,
        mut algorithm: Algorithm,
        extractable: bool,
        usages: &[KeyUsage],
    ) -> Result<CryptoKey> {
        let key = match format {
            KeyFormat::Jwk => {
                let jwk = data.into_jwk()?;
                let mut components = RsaComponents {
                    n: jwk.require("n")?,
                    e: jwk.require("e")?,
                    ..Default::default()
                };
                if jwk.d.is_some() {
                    components.d = Some(jwk.require("d")?);
                    components.p = Some(jwk.require("p")?);
                    components.q = Some(jwk.require("q")?);
                    components.dp = Some(jwk.require("dp")?);
                    components.dq = Some(jwk.require("dq")?);
                    components.qi = Some(jwk.require("qi")?);
                }
                offload(move || RsaKey::from_components(&components)).await?
            }
            KeyFormat::Pkcs8 => {
                let der = data.into_bytes()?;
                offload(move || RsaKey::from_pkcs8(&der)).await?
            }
            KeyFormat::Spki => {
                let der = data.into_bytes()?;
                offload(move || RsaKey::from_spki(&der)).await?
            }
            other => {
                return Err(Error::config(format!(
                    "importKey: wrong format value '{other}' for {}",
                    algorithm.name
                )));
            }
        };

        // Re-derive the modulus parameters from the native key object; the
        // caller-declared values are discarded.
        algorithm.modulus_length = Some((key.modulus_bytes() * 8) as u32);
        algorithm.public_exponent = Some(key.public_exponent());
        let kind = if key.is_private() {
            KeyKind::Private
        } else {
            KeyKind::Public
        };
        Ok(CryptoKey::new(
            NativeKey::Rsa(key),
            algorithm,
            kind,
            extractable,
            usages.to_vec(),
        ))
    }

    async fn export_key(&self, format: KeyFormat, key: &CryptoKey) -> Result<ExportedKey> {
        match format {
            KeyFormat::Jwk => {
                let include_private = key.kind == KeyKind::Private;
                let native = key.native_arc();
                let components =
                    offload(move || native.as_rsa()?.components(include_private)).await?;
                let mut jwk = JsonWebKey {
                    kty: "RSA".to_string(),
                    key_ops: Some(key.usages.clone()),
                    n: Some(b64url_encode(&components.n)),
                    e: Some(b64url_encode(&components.e)),
                    d: components.d.as_deref().map(b64url_encode),
                    p: components.p.as_deref().map(b64url_encode),
                    q: components.q.as_deref().map(b64url_encode),
                    dp: components.dp.as_deref().map(b64url_encode),
                    dq: components.dq.as_deref().map(b64url_encode),
                    qi: components.qi.as_deref().map(b64url_encode),
                    ..Default::default()
                };
                self.annotate(&mut jwk, key)?;
                Ok(ExportedKey::Jwk(jwk))
            }
            KeyFormat::Spki => {
                let native = key.native_arc();
                Ok(ExportedKey::Bytes(
                    offload(move || native.as_rsa()?.to_spki()).await?,
                ))
            }
            KeyFormat::Pkcs8 => {
                let native = key.native_arc();
                Ok(ExportedKey::Bytes(
                    offload(move || native.as_rsa()?.to_pkcs8()).await?,
                ))
            }
            other => Err(Error::config(format!(
                "exportKey: unknown export format '{other}'"
            ))),
        }
    }

    async fn sign(&self, algorithm: &Algorithm, key: &CryptoKey, data: &[u8]) -> Result<Vec<u8>> {
        // The hash comes from the key's descriptor; PSS reads its salt length
        // from the operation parameters.
        let hash = key.algorithm.hash_kind()?;
        let native = key.native_arc();
        let data = data.to_vec();
        match self.scheme {
            RsaScheme::Pkcs1 => {
                offload(move || native.as_rsa()?.sign_pkcs1(hash, &data)).await
            }
            RsaScheme::Pss => {
                let salt_len = algorithm.salt_length.ok_or_else(|| {
                    Error::config("RSA-PSS: saltLength parameter is required")
                })? as usize;
                offload(move || native.as_rsa()?.sign_pss(hash, salt_len, &data)).await
            }
            RsaScheme::Oaep => Err(Error::not_supported(&algorithm.name)),
        }
    }

    async fn verify(
        &self,
        algorithm: &Algorithm,
        key: &CryptoKey,
        signature: &[u8],
        data: &[u8],
    ) -> Result<bool> {
        let hash = key.algorithm.hash_kind()?;
        let native = key.native_arc();
        let signature = signature.to_vec();
        let data = data.to_vec();
        match self.scheme {
            RsaScheme::Pkcs1 => {
                offload(move || native.as_rsa()?.verify_pkcs1(hash, &data, &signature)).await
            }
            RsaScheme::Pss => {
                let salt_len = algorithm.salt_length.ok_or_else(|| {
                    Error::config("RSA-PSS: saltLength parameter is required")
                })? as usize;
                offload(move || native.as_rsa()?.verify_pss(hash, salt_len, &data, &signature))
                    .await
            }
            RsaScheme::Oaep => Err(Error::not_supported(&algorithm.name)),
        }
    }

    async fn encrypt(&self, algorithm: &Algorithm, key: &CryptoKey, data: &[u8]) -> Result<Vec<u8>> {
        if self.scheme != RsaScheme::Oaep {
            return Err(Error::not_supported(&algorithm.name));
        }
        let hash = key.algorithm.hash_kind()?;
        let label = algorithm.label.clone();
        let native = key.native_arc();
        let data = data.to_vec();
        offload(move || native.as_rsa()?.encrypt_oaep(hash, label.as_deref(), &data)).await
    }

    async fn decrypt(&self, algorithm: &Algorithm, key: &CryptoKey, data: &[u8]) -> Result<Vec<u8>> {
        if self.scheme != RsaScheme::Oaep {
            return Err(Error::not_supported(&algorithm.name));
        }
        let hash = key.algorithm.hash_kind()?;
        let label = algorithm.label.clone();
        let native = key.native_arc();
        let data = data.to_vec();
        offload(move || native.as_rsa()?.decrypt_oaep(hash, label.as_deref(), &data)).await
    }
}
