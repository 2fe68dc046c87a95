//! Elliptic-curve primitives: key generation, component and DER codecs,
//! ECDSA prehash signatures, and ECDH shared-secret derivation.

use p256::elliptic_curve::ecdh::diffie_hellman;
use p256::elliptic_curve::generic_array::GenericArray;
use p256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rand_core::OsRng;

use crate::algorithm::HashKind;
use crate::error::{Error, Result};
use crate::jwk::left_pad;

/// Native identifiers for the curve parameter sets the descriptor table maps
/// onto. `secp192r1` resolves but carries no arithmetic in this engine build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcCurve {
    Secp192r1,
    Secp256r1,
    Secp384r1,
    Secp521r1,
    Secp256k1,
}

impl EcCurve {
    /// Fixed coordinate width in bytes.
    pub fn coordinate_bytes(self) -> usize {
        match self {
            Self::Secp192r1 => 24,
            Self::Secp256r1 | Self::Secp256k1 => 32,
            Self::Secp384r1 => 48,
            Self::Secp521r1 => 66,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Secp192r1 => "secp192r1",
            Self::Secp256r1 => "secp256r1",
            Self::Secp384r1 => "secp384r1",
            Self::Secp521r1 => "secp521r1",
            Self::Secp256k1 => "secp256k1",
        }
    }
}

/// Affine coordinates (and optionally the scalar) of an EC key, fixed-width
/// big-endian per the curve.
#[derive(Debug, Clone)]
pub struct EcComponents {
    pub curve: EcCurve,
    pub x: Vec<u8>,
    pub y: Vec<u8>,
    pub d: Option<Vec<u8>>,
}

/// An EC key held by the engine.
pub enum EcKey {
    P256Private(p256::SecretKey),
    P256Public(p256::PublicKey),
    P384Private(p384::SecretKey),
    P384Public(p384::PublicKey),
    P521Private(p521::SecretKey),
    P521Public(p521::PublicKey),
    K256Private(k256::SecretKey),
    K256Public(k256::PublicKey),
}

/// Normalize a big-endian integer encoding to exactly `width` bytes,
/// tolerating redundant leading zeros.
fn fixed_width(bytes: &[u8], width: usize) -> Result<Vec<u8>> {
    let mut slice = bytes;
    while slice.len() > width && slice[0] == 0 {
        slice = &slice[1..];
    }
    if slice.len() > width {
        return Err(Error::data(format!(
            "integer encoding of {} bytes exceeds the curve width {width}",
            bytes.len()
        )));
    }
    Ok(left_pad(slice, width))
}

fn unavailable_curve(curve: EcCurve) -> Error {
    Error::Native(format!(
        "{} is not available in this engine",
        curve.name()
    ))
}

fn off_curve() -> Error {
    Error::Native("EC point is not on the curve".to_string())
}

impl EcKey {
    pub fn generate(curve: EcCurve) -> Result<Self> {
        match curve {
            EcCurve::Secp256r1 => Ok(Self::P256Private(p256::SecretKey::random(&mut OsRng))),
            EcCurve::Secp384r1 => Ok(Self::P384Private(p384::SecretKey::random(&mut OsRng))),
            EcCurve::Secp521r1 => Ok(Self::P521Private(p521::SecretKey::random(&mut OsRng))),
            EcCurve::Secp256k1 => Ok(Self::K256Private(k256::SecretKey::random(&mut OsRng))),
            EcCurve::Secp192r1 => Err(unavailable_curve(curve)),
        }
    }

    /// Rebuild a key from affine coordinates, or from the scalar when `d`
    /// is present.
    pub fn from_components(components: &EcComponents) -> Result<Self> {
        let width = components.curve.coordinate_bytes();
        macro_rules! build {
            ($curve:ident, $private:ident, $public:ident) => {{
                match &components.d {
                    Some(d) => {
                        let scalar = fixed_width(d, width)?;
                        let key =
                            $curve::SecretKey::from_slice(&scalar).map_err(Error::native)?;
                        Ok(Self::$private(key))
                    }
                    None => {
                        let x = fixed_width(&components.x, width)?;
                        let y = fixed_width(&components.y, width)?;
                        let point = $curve::EncodedPoint::from_affine_coordinates(
                            GenericArray::from_slice(&x),
                            GenericArray::from_slice(&y),
                            false,
                        );
                        let key = Option::<$curve::PublicKey>::from(
                            $curve::PublicKey::from_encoded_point(&point),
                        )
                        .ok_or_else(off_curve)?;
                        Ok(Self::$public(key))
                    }
                }
            }};
        }
        match components.curve {
            EcCurve::Secp256r1 => build!(p256, P256Private, P256Public),
            EcCurve::Secp384r1 => build!(p384, P384Private, P384Public),
            EcCurve::Secp521r1 => build!(p521, P521Private, P521Public),
            EcCurve::Secp256k1 => build!(k256, K256Private, K256Public),
            EcCurve::Secp192r1 => Err(unavailable_curve(components.curve)),
        }
    }

    /// Decode a PKCS#8 private key, detecting the curve from the container.
    pub fn from_pkcs8(der: &[u8]) -> Result<Self> {
        if let Ok(key) = p256::SecretKey::from_pkcs8_der(der) {
            return Ok(Self::P256Private(key));
        }
        if let Ok(key) = p384::SecretKey::from_pkcs8_der(der) {
            return Ok(Self::P384Private(key));
        }
        if let Ok(key) = p521::SecretKey::from_pkcs8_der(der) {
            return Ok(Self::P521Private(key));
        }
        if let Ok(key) = k256::SecretKey::from_pkcs8_der(der) {
            return Ok(Self::K256Private(key));
        }
        Err(Error::Native(
            "PKCS#8 container does not hold a supported EC private key".to_string(),
        ))
    }

    /// Decode an SPKI public key, detecting the curve from the container.
    pub fn from_spki(der: &[u8]) -> Result<Self> {
        if let Ok(key) = p256::PublicKey::from_public_key_der(der) {
            return Ok(Self::P256Public(key));
        }
        if let Ok(key) = p384::PublicKey::from_public_key_der(der) {
            return Ok(Self::P384Public(key));
        }
        if let Ok(key) = p521::PublicKey::from_public_key_der(der) {
            return Ok(Self::P521Public(key));
        }
        if let Ok(key) = k256::PublicKey::from_public_key_der(der) {
            return Ok(Self::K256Public(key));
        }
        Err(Error::Native(
            "SPKI container does not hold a supported EC public key".to_string(),
        ))
    }

    pub fn curve(&self) -> EcCurve {
        match self {
            Self::P256Private(_) | Self::P256Public(_) => EcCurve::Secp256r1,
            Self::P384Private(_) | Self::P384Public(_) => EcCurve::Secp384r1,
            Self::P521Private(_) | Self::P521Public(_) => EcCurve::Secp521r1,
            Self::K256Private(_) | Self::K256Public(_) => EcCurve::Secp256k1,
        }
    }

    pub fn is_private(&self) -> bool {
        matches!(
            self,
            Self::P256Private(_) | Self::P384Private(_) | Self::P521Private(_) | Self::K256Private(_)
        )
    }

    /// Export affine coordinates; `include_private` additionally emits the
    /// scalar and requires private material.
    pub fn components(&self, include_private: bool) -> Result<EcComponents> {
        macro_rules! emit {
            ($point:expr, $d:expr) => {{
                let point = $point;
                let x = point.x().ok_or_else(off_curve)?.to_vec();
                let y = point.y().ok_or_else(off_curve)?.to_vec();
                Ok(EcComponents {
                    curve: self.curve(),
                    x,
                    y,
                    d: $d,
                })
            }};
        }
        match self {
            Self::P256Private(sk) => emit!(
                sk.public_key().to_encoded_point(false),
                include_private.then(|| sk.to_bytes().to_vec())
            ),
            Self::P384Private(sk) => emit!(
                sk.public_key().to_encoded_point(false),
                include_private.then(|| sk.to_bytes().to_vec())
            ),
            Self::P521Private(sk) => emit!(
                sk.public_key().to_encoded_point(false),
                include_private.then(|| sk.to_bytes().to_vec())
            ),
            Self::K256Private(sk) => emit!(
                sk.public_key().to_encoded_point(false),
                include_private.then(|| sk.to_bytes().to_vec())
            ),
            Self::P256Public(pk) => {
                if include_private {
                    return Err(Error::Native("no private material to export".to_string()));
                }
                emit!(pk.to_encoded_point(false), None)
            }
            Self::P384Public(pk) => {
                if include_private {
                    return Err(Error::Native("no private material to export".to_string()));
                }
                emit!(pk.to_encoded_point(false), None)
            }
            Self::P521Public(pk) => {
                if include_private {
                    return Err(Error::Native("no private material to export".to_string()));
                }
                emit!(pk.to_encoded_point(false), None)
            }
            Self::K256Public(pk) => {
                if include_private {
                    return Err(Error::Native("no private material to export".to_string()));
                }
                emit!(pk.to_encoded_point(false), None)
            }
        }
    }

    pub fn to_pkcs8(&self) -> Result<Vec<u8>> {
        let der = match self {
            Self::P256Private(sk) => sk.to_pkcs8_der().map_err(Error::native)?,
            Self::P384Private(sk) => sk.to_pkcs8_der().map_err(Error::native)?,
            Self::P521Private(sk) => sk.to_pkcs8_der().map_err(Error::native)?,
            Self::K256Private(sk) => sk.to_pkcs8_der().map_err(Error::native)?,
            _ => {
                return Err(Error::Native(
                    "no private material to export".to_string(),
                ));
            }
        };
        Ok(der.as_bytes().to_vec())
    }

    pub fn to_spki(&self) -> Result<Vec<u8>> {
        let der = match self {
            Self::P256Private(sk) => sk.public_key().to_public_key_der(),
            Self::P256Public(pk) => pk.to_public_key_der(),
            Self::P384Private(sk) => sk.public_key().to_public_key_der(),
            Self::P384Public(pk) => pk.to_public_key_der(),
            Self::P521Private(sk) => sk.public_key().to_public_key_der(),
            Self::P521Public(pk) => pk.to_public_key_der(),
            Self::K256Private(sk) => sk.public_key().to_public_key_der(),
            Self::K256Public(pk) => pk.to_public_key_der(),
        };
        Ok(der.map_err(Error::native)?.as_bytes().to_vec())
    }

    /// ECDSA signature over the digest of `data`, fixed-width `r || s`.
    pub fn sign(&self, hash: HashKind, data: &[u8]) -> Result<Vec<u8>> {
        let digest = crate::native::digest(hash, data);
        match self {
            Self::P256Private(sk) => {
                let signer = p256::ecdsa::SigningKey::from(sk.clone());
                let signature: p256::ecdsa::Signature =
                    signer.sign_prehash(&digest).map_err(Error::native)?;
                Ok(signature.to_bytes().to_vec())
            }
            Self::P384Private(sk) => {
                let signer = p384::ecdsa::SigningKey::from(sk.clone());
                let signature: p384::ecdsa::Signature =
                    signer.sign_prehash(&digest).map_err(Error::native)?;
                Ok(signature.to_bytes().to_vec())
            }
            Self::P521Private(sk) => {
                let signer =
                    p521::ecdsa::SigningKey::from_bytes(&sk.to_bytes()).map_err(Error::native)?;
                let signature: p521::ecdsa::Signature =
                    signer.sign_prehash(&digest).map_err(Error::native)?;
                Ok(signature.to_bytes().to_vec())
            }
            Self::K256Private(sk) => {
                let signer = k256::ecdsa::SigningKey::from(sk.clone());
                let signature: k256::ecdsa::Signature =
                    signer.sign_prehash(&digest).map_err(Error::native)?;
                Ok(signature.to_bytes().to_vec())
            }
            _ => Err(Error::Native(
                "ECDSA signing requires a private key".to_string(),
            )),
        }
    }

    /// Verify a fixed-width `r || s` signature over the digest of `data`.
    pub fn verify(&self, hash: HashKind, data: &[u8], signature: &[u8]) -> Result<bool> {
        let digest = crate::native::digest(hash, data);
        match self {
            Self::P256Private(sk) => verify_p256(&sk.public_key(), &digest, signature),
            Self::P256Public(pk) => verify_p256(pk, &digest, signature),
            Self::P384Private(sk) => verify_p384(&sk.public_key(), &digest, signature),
            Self::P384Public(pk) => verify_p384(pk, &digest, signature),
            Self::P521Private(sk) => verify_p521(&sk.public_key(), &digest, signature),
            Self::P521Public(pk) => verify_p521(pk, &digest, signature),
            Self::K256Private(sk) => verify_k256(&sk.public_key(), &digest, signature),
            Self::K256Public(pk) => verify_k256(pk, &digest, signature),
        }
    }

    /// ECDH: derive exactly `length_bits` bits of shared secret against the
    /// peer's public key. Both keys must sit on the same curve.
    pub fn derive_bits(&self, peer: &EcKey, length_bits: u32) -> Result<Vec<u8>> {
        if length_bits == 0 || length_bits % 8 != 0 {
            return Err(Error::Native(format!(
                "derived length must be a positive multiple of 8 bits, got {length_bits}"
            )));
        }
        let shared = match self {
            Self::P256Private(sk) => {
                let pk = peer.p256_public()?;
                diffie_hellman(sk.to_nonzero_scalar(), pk.as_affine())
                    .raw_secret_bytes()
                    .to_vec()
            }
            Self::P384Private(sk) => {
                let pk = peer.p384_public()?;
                diffie_hellman(sk.to_nonzero_scalar(), pk.as_affine())
                    .raw_secret_bytes()
                    .to_vec()
            }
            Self::P521Private(sk) => {
                let pk = peer.p521_public()?;
                diffie_hellman(sk.to_nonzero_scalar(), pk.as_affine())
                    .raw_secret_bytes()
                    .to_vec()
            }
            Self::K256Private(sk) => {
                let pk = peer.k256_public()?;
                diffie_hellman(sk.to_nonzero_scalar(), pk.as_affine())
                    .raw_secret_bytes()
                    .to_vec()
            }
            _ => {
                return Err(Error::Native(
                    "ECDH derivation requires a private base key".to_string(),
                ));
            }
        };
        let wanted = (length_bits / 8) as usize;
        if wanted > shared.len() {
            return Err(Error::Native(format!(
                "requested {length_bits} bits but the shared secret is {} bits",
                shared.len() * 8
            )));
        }
        Ok(shared[..wanted].to_vec())
    }

    fn p256_public(&self) -> Result<p256::PublicKey> {
        match self {
            Self::P256Private(sk) => Ok(sk.public_key()),
            Self::P256Public(pk) => Ok(*pk),
            _ => Err(curve_mismatch()),
        }
    }

    fn p384_public(&self) -> Result<p384::PublicKey> {
        match self {
            Self::P384Private(sk) => Ok(sk.public_key()),
            Self::P384Public(pk) => Ok(*pk),
            _ => Err(curve_mismatch()),
        }
    }

    fn p521_public(&self) -> Result<p521::PublicKey> {
        match self {
            Self::P521Private(sk) => Ok(sk.public_key()),
            Self::P521Public(pk) => Ok(*pk),
            _ => Err(curve_mismatch()),
        }
    }

    fn k256_public(&self) -> Result<k256::PublicKey> {
        match self {
            Self::K256Private(sk) => Ok(sk.public_key()),
            Self::K256Public(pk) => Ok(*pk),
            _ => Err(curve_mismatch()),
        }
    }
}

fn curve_mismatch() -> Error {
    Error::Native("ECDH peer key is on a different curve".to_string())
}

fn verify_p256(pk: &p256::PublicKey, digest: &[u8], signature: &[u8]) -> Result<bool> {
    let verifier = p256::ecdsa::VerifyingKey::from(pk);
    let signature = p256::ecdsa::Signature::from_slice(signature).map_err(Error::native)?;
    Ok(verifier.verify_prehash(digest, &signature).is_ok())
}

fn verify_p384(pk: &p384::PublicKey, digest: &[u8], signature: &[u8]) -> Result<bool> {
    let verifier = p384::ecdsa::VerifyingKey::from(pk);
    let signature = p384::ecdsa::Signature::from_slice(signature).map_err(Error::native)?;
    Ok(verifier.verify_prehash(digest, &signature).is_ok())
}

fn verify_p521(pk: &p521::PublicKey, digest: &[u8], signature: &[u8]) -> Result<bool> {
    let verifier = p521::ecdsa::VerifyingKey::from_encoded_point(&pk.to_encoded_point(false))
        .map_err(Error::native)?;
    let signature = p521::ecdsa::Signature::from_slice(signature).map_err(Error::native)?;
    Ok(verifier.verify_prehash(digest, &signature).is_ok())
}

fn verify_k256(pk: &k256::PublicKey, digest: &[u8], signature: &[u8]) -> Result<bool> {
    let verifier = k256::ecdsa::VerifyingKey::from(pk);
    let signature = k256::ecdsa::Signature::from_slice(signature).map_err(Error::native)?;
    Ok(verifier.verify_prehash(digest, &signature).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_roundtrip_keeps_the_public_point() {
        let key = EcKey::generate(EcCurve::Secp256r1).unwrap();
        let components = key.components(true).unwrap();
        assert_eq!(components.x.len(), 32);
        assert_eq!(components.y.len(), 32);
        assert!(components.d.is_some());

        let public_only = EcComponents {
            d: None,
            ..components.clone()
        };
        let rebuilt = EcKey::from_components(&public_only).unwrap();
        assert!(!rebuilt.is_private());
        assert_eq!(rebuilt.components(false).unwrap().x, components.x);
    }

    #[test]
    fn coordinate_widths_per_curve() {
        for (curve, width) in [
            (EcCurve::Secp256r1, 32),
            (EcCurve::Secp384r1, 48),
            (EcCurve::Secp521r1, 66),
            (EcCurve::Secp256k1, 32),
        ] {
            let key = EcKey::generate(curve).unwrap();
            let components = key.components(false).unwrap();
            assert_eq!(components.x.len(), width, "{curve:?}");
            assert_eq!(components.y.len(), width, "{curve:?}");
        }
    }

    #[test]
    fn unavailable_curve_is_reported() {
        assert!(EcKey::generate(EcCurve::Secp192r1).is_err());
    }

    #[test]
    fn sign_verify_across_curves() {
        for curve in [
            EcCurve::Secp256r1,
            EcCurve::Secp384r1,
            EcCurve::Secp521r1,
            EcCurve::Secp256k1,
        ] {
            let key = EcKey::generate(curve).unwrap();
            let signature = key.sign(HashKind::Sha256, b"payload").unwrap();
            assert_eq!(signature.len(), 2 * curve.coordinate_bytes(), "{curve:?}");
            assert!(key.verify(HashKind::Sha256, b"payload", &signature).unwrap());
            assert!(!key.verify(HashKind::Sha256, b"other", &signature).unwrap());
        }
    }

    #[test]
    fn ecdh_agrees_both_ways() {
        let alice = EcKey::generate(EcCurve::Secp256r1).unwrap();
        let bob = EcKey::generate(EcCurve::Secp256r1).unwrap();
        let ab = alice.derive_bits(&bob, 256).unwrap();
        let ba = bob.derive_bits(&alice, 256).unwrap();
        assert_eq!(ab, ba);
        assert_eq!(alice.derive_bits(&bob, 128).unwrap(), &ab[..16]);
        assert!(alice.derive_bits(&bob, 512).is_err());
    }

    #[test]
    fn ecdh_rejects_cross_curve_peers() {
        let alice = EcKey::generate(EcCurve::Secp256r1).unwrap();
        let bob = EcKey::generate(EcCurve::Secp384r1).unwrap();
        assert!(alice.derive_bits(&bob, 128).is_err());
    }

    #[test]
    fn der_roundtrips_detect_the_curve() {
        let key = EcKey::generate(EcCurve::Secp384r1).unwrap();
        let pkcs8 = key.to_pkcs8().unwrap();
        let restored = EcKey::from_pkcs8(&pkcs8).unwrap();
        assert_eq!(restored.curve(), EcCurve::Secp384r1);

        let spki = key.to_spki().unwrap();
        let public = EcKey::from_spki(&spki).unwrap();
        assert_eq!(public.curve(), EcCurve::Secp384r1);
        assert!(!public.is_private());
    }
}
