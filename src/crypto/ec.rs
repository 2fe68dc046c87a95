//! Elliptic-curve codec: ECDSA and ECDH over the named-curve table.
//!
//! All external byte layouts here are fixed-width: raw points are
//! `0x04 || X || Y` and JWK coordinates are re-padded to the curve width before
//! encoding, because the engine may hand back variable-width integers.

use std::sync::Arc;

use async_trait::async_trait;

use crate::algorithm::Algorithm;
use crate::error::{Error, Result};
use crate::jwk::{b64url_encode, left_pad, JsonWebKey};
use crate::key::{
    filter_usages, CryptoKey, ExportedKey, GeneratedKey, KeyData, KeyFormat, KeyKind, KeyPair,
    KeyUsage,
};
use crate::native::{offload, EcComponents, EcCurve, EcKey, NativeKey};
use crate::subtle::Codec;

pub(crate) static EC: EcCodec = EcCodec;

#[derive(Debug)]
pub(crate) struct EcCodec;

const PRIVATE_USAGES: [KeyUsage; 3] = [KeyUsage::Sign, KeyUsage::DeriveKey, KeyUsage::DeriveBits];
const PUBLIC_USAGES: [KeyUsage; 1] = [KeyUsage::Verify];

/// Uncompressed-point tag from SEC 1.
const POINT_TAG: u8 = 0x04;

/// Map a curve label onto the engine's identifier.
pub(crate) fn curve_from_label(label: &str) -> Result<EcCurve> {
    match label.to_ascii_uppercase().as_str() {
        "P-192" => Ok(EcCurve::Secp192r1),
        "P-256" => Ok(EcCurve::Secp256r1),
        "P-384" => Ok(EcCurve::Secp384r1),
        "P-521" => Ok(EcCurve::Secp521r1),
        "K-256" => Ok(EcCurve::Secp256k1),
        _ => Err(Error::config(format!("unsupported namedCurve '{label}'"))),
    }
}

/// The label for an engine curve identifier.
pub(crate) fn curve_label(curve: EcCurve) -> &'static str {
    match curve {
        EcCurve::Secp192r1 => "P-192",
        EcCurve::Secp256r1 => "P-256",
        EcCurve::Secp384r1 => "P-384",
        EcCurve::Secp521r1 => "P-521",
        EcCurve::Secp256k1 => "K-256",
    }
}

/// Fixed coordinate width used by external encodings. Curves outside the
/// padding table cannot be exported.
fn pad_width(label: &str) -> Result<usize> {
    match label.to_ascii_uppercase().as_str() {
        "P-256" | "K-256" => Ok(32),
        "P-384" => Ok(48),
        "P-521" => Ok(66),
        other => Err(Error::config(format!("unsupported named curve '{other}'"))),
    }
}

fn required_curve(algorithm: &Algorithm) -> Result<String> {
    algorithm.named_curve.clone().ok_or_else(|| {
        Error::config(format!(
            "{}: namedCurve parameter is required",
            algorithm.name
        ))
    })
}

#[async_trait]
impl Codec for EcCodec {
    async fn generate_key(
        &self,
        algorithm: Algorithm,
        extractable: bool,
        usages: &[KeyUsage],
    ) -> Result<GeneratedKey> {
        let curve = curve_from_label(&required_curve(&algorithm)?)?;
        let key = offload(move || EcKey::generate(curve)).await?;
        let native = Arc::new(NativeKey::Ec(key));

        let private = CryptoKey::from_shared(
            Arc::clone(&native),
            algorithm.clone(),
            KeyKind::Private,
            extractable,
            filter_usages(&PRIVATE_USAGES, usages),
        );
        // The public half is always exportable.
        let public = CryptoKey::from_shared(
            native,
            algorithm,
            KeyKind::Public,
            true,
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
        let (key, kind) = match format {
            KeyFormat::Raw => {
                let bytes = data.into_bytes()?;
                let curve = curve_from_label(&required_curve(&algorithm)?)?;
                let coord = match bytes.len() {
                    65 => 32,
                    97 => 48,
                    133 => 66,
                    other => {
                        return Err(Error::data(format!(
                            "raw EC point has unexpected length {other}"
                        )));
                    }
                };
                if bytes[0] != POINT_TAG {
                    return Err(Error::data(
                        "raw EC point must carry the uncompressed-point tag 0x04",
                    ));
                }
                let components = EcComponents {
                    curve,
                    x: left_pad(&bytes[1..1 + coord], coord),
                    y: left_pad(&bytes[1 + coord..1 + 2 * coord], coord),
                    d: None,
                };
                let key = offload(move || EcKey::from_components(&components)).await?;
                (key, KeyKind::Public)
            }
            KeyFormat::Jwk => {
                let jwk = data.into_jwk()?;
                let label = jwk
                    .crv
                    .clone()
                    .ok_or_else(|| Error::data("JWK is missing the 'crv' field"))?;
                let curve = curve_from_label(&label)?;
                let d = jwk.optional("d")?;
                let kind = if d.is_some() {
                    KeyKind::Private
                } else {
                    KeyKind::Public
                };
                let components = EcComponents {
                    curve,
                    x: jwk.require("x")?,
                    y: jwk.require("y")?,
                    d,
                };
                let key = offload(move || EcKey::from_components(&components)).await?;
                (key, kind)
            }
            KeyFormat::Pkcs8 => {
                let der = data.into_bytes()?;
                let key = offload(move || EcKey::from_pkcs8(&der)).await?;
                (key, KeyKind::Private)
            }
            KeyFormat::Spki => {
                let der = data.into_bytes()?;
                let key = offload(move || EcKey::from_spki(&der)).await?;
                (key, KeyKind::Public)
            }
        };
        // The binary containers carry their own curve; reflect it.
        algorithm.named_curve = Some(curve_label(key.curve()).to_string());
        Ok(CryptoKey::new(
            NativeKey::Ec(key),
            algorithm,
            kind,
            extractable,
            usages.to_vec(),
        ))
    }

    async fn export_key(&self, format: KeyFormat, key: &CryptoKey) -> Result<ExportedKey> {
        match format {
            KeyFormat::Jwk => {
                let label = required_curve(&key.algorithm)?;
                let width = pad_width(&label)?;
                let include_private = key.kind == KeyKind::Private;
                let native = key.native_arc();
                let components =
                    offload(move || native.as_ec()?.components(include_private)).await?;
                Ok(ExportedKey::Jwk(JsonWebKey {
                    kty: "EC".to_string(),
                    crv: Some(label),
                    key_ops: Some(key.usages.clone()),
                    x: Some(b64url_encode(&left_pad(&components.x, width))),
                    y: Some(b64url_encode(&left_pad(&components.y, width))),
                    d: components
                        .d
                        .as_deref()
                        .map(|d| b64url_encode(&left_pad(d, width))),
                    ..Default::default()
                }))
            }
            KeyFormat::Raw => {
                let label = required_curve(&key.algorithm)?;
                let width = pad_width(&label)?;
                let native = key.native_arc();
                let components = offload(move || native.as_ec()?.components(false)).await?;
                let mut point = Vec::with_capacity(1 + 2 * width);
                point.push(POINT_TAG);
                point.extend_from_slice(&left_pad(&components.x, width));
                point.extend_from_slice(&left_pad(&components.y, width));
                Ok(ExportedKey::Bytes(point))
            }
            KeyFormat::Spki => {
                let native = key.native_arc();
                Ok(ExportedKey::Bytes(
                    offload(move || native.as_ec()?.to_spki()).await?,
                ))
            }
            KeyFormat::Pkcs8 => {
                let native = key.native_arc();
                Ok(ExportedKey::Bytes(
                    offload(move || native.as_ec()?.to_pkcs8()).await?,
                ))
            }
        }
    }

    async fn sign(&self, algorithm: &Algorithm, key: &CryptoKey, data: &[u8]) -> Result<Vec<u8>> {
        if algorithm.normalized() != "ecdsa" {
            return Err(Error::not_supported(&algorithm.name));
        }
        let hash = algorithm.hash_kind()?;
        let native = key.native_arc();
        let data = data.to_vec();
        offload(move || native.as_ec()?.sign(hash, &data)).await
    }

    async fn verify(
        &self,
        algorithm: &Algorithm,
        key: &CryptoKey,
        signature: &[u8],
        data: &[u8],
    ) -> Result<bool> {
        if algorithm.normalized() != "ecdsa" {
            return Err(Error::not_supported(&algorithm.name));
        }
        let hash = algorithm.hash_kind()?;
        let native = key.native_arc();
        let signature = signature.to_vec();
        let data = data.to_vec();
        offload(move || native.as_ec()?.verify(hash, &data, &signature)).await
    }

    async fn derive_bits(
        &self,
        algorithm: &Algorithm,
        base_key: &CryptoKey,
        length: u32,
    ) -> Result<Vec<u8>> {
        if algorithm.normalized() != "ecdh" {
            return Err(Error::not_supported(&algorithm.name));
        }
        let peer = algorithm
            .public
            .clone()
            .ok_or_else(|| Error::config("ECDH: public parameter (peer key) is required"))?;
        let base = base_key.native_arc();
        let peer = peer.native_arc();
        offload(move || base.as_ec()?.derive_bits(peer.as_ec()?, length)).await
    }

    async fn derive_key(
        &self,
        algorithm: &Algorithm,
        base_key: &CryptoKey,
        derived_type: Algorithm,
        extractable: bool,
        usages: &[KeyUsage],
    ) -> Result<CryptoKey> {
        if algorithm.normalized() != "ecdh" {
            return Err(Error::not_supported(&algorithm.name));
        }
        // Only symmetric block-cipher targets are derivable; checked before
        // any agreement work happens.
        match derived_type.normalized().as_str() {
            "aes-cbc" | "aes-gcm" | "aes-kw" => {}
            _ => return Err(Error::not_supported(&derived_type.name)),
        }
        let bits = derived_type.length.ok_or_else(|| {
            Error::config("derived key type: length parameter is required")
        })?;
        let raw = self.derive_bits(algorithm, base_key, bits).await?;
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
}
