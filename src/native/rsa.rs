//! RSA primitives: key generation, component and DER codecs, and the
//! PKCS#1 v1.5 / PSS / OAEP operations.

use num_bigint_dig::{BigInt, ModInverse, Sign};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::pss::Pss;
use rsa::rand_core::OsRng;
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{BigUint, Oaep, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};

use crate::algorithm::HashKind;
use crate::error::{Error, Result};

/// Big-endian unsigned integer fields of an RSA key, minimal-width encoded.
#[derive(Debug, Clone, Default)]
pub struct RsaComponents {
    pub n: Vec<u8>,
    pub e: Vec<u8>,
    pub d: Option<Vec<u8>>,
    pub p: Option<Vec<u8>>,
    pub q: Option<Vec<u8>>,
    pub dp: Option<Vec<u8>>,
    pub dq: Option<Vec<u8>>,
    pub qi: Option<Vec<u8>>,
}

impl RsaComponents {
    pub fn is_private(&self) -> bool {
        self.d.is_some()
    }
}

/// An RSA key held by the engine; private keys can stand in for their public
/// half wherever only the public operations are needed.
pub enum RsaKey {
    Private(RsaPrivateKey),
    Public(RsaPublicKey),
}

impl RsaKey {
    /// Generate a fresh private key. `use_f4` selects the 65537 exponent;
    /// otherwise the engine's short default exponent (3) is used.
    pub fn generate(modulus_bits: usize, use_f4: bool) -> Result<Self> {
        let exponent = if use_f4 {
            BigUint::from(65537u32)
        } else {
            BigUint::from(3u32)
        };
        let key = RsaPrivateKey::new_with_exp(&mut OsRng, modulus_bits, &exponent)
            .map_err(Error::native)?;
        Ok(Self::Private(key))
    }

    /// Rebuild a key from its integer components. The CRT fields are
    /// recomputed from `d`, `p` and `q`, so stored values are advisory.
    pub fn from_components(components: &RsaComponents) -> Result<Self> {
        let n = BigUint::from_bytes_be(&components.n);
        let e = BigUint::from_bytes_be(&components.e);
        match (&components.d, &components.p, &components.q) {
            (Some(d), Some(p), Some(q)) => {
                let key = RsaPrivateKey::from_components(
                    n,
                    e,
                    BigUint::from_bytes_be(d),
                    vec![BigUint::from_bytes_be(p), BigUint::from_bytes_be(q)],
                )
                .map_err(Error::native)?;
                Ok(Self::Private(key))
            }
            (None, _, _) => {
                let key = RsaPublicKey::new(n, e).map_err(Error::native)?;
                Ok(Self::Public(key))
            }
            _ => Err(Error::data(
                "private RSA components require both prime factors",
            )),
        }
    }

    pub fn from_pkcs8(der: &[u8]) -> Result<Self> {
        let key = RsaPrivateKey::from_pkcs8_der(der).map_err(Error::native)?;
        Ok(Self::Private(key))
    }

    pub fn from_spki(der: &[u8]) -> Result<Self> {
        let key = RsaPublicKey::from_public_key_der(der).map_err(Error::native)?;
        Ok(Self::Public(key))
    }

    pub fn is_private(&self) -> bool {
        matches!(self, Self::Private(_))
    }

    fn public(&self) -> RsaPublicKey {
        match self {
            Self::Private(key) => key.to_public_key(),
            Self::Public(key) => key.clone(),
        }
    }

    fn private(&self) -> Result<&RsaPrivateKey> {
        match self {
            Self::Private(key) => Ok(key),
            Self::Public(_) => Err(Error::Native(
                "operation requires private key material".to_string(),
            )),
        }
    }

    /// Modulus width in bytes.
    pub fn modulus_bytes(&self) -> usize {
        match self {
            Self::Private(key) => key.size(),
            Self::Public(key) => key.size(),
        }
    }

    /// Public exponent, minimal big-endian encoding.
    pub fn public_exponent(&self) -> Vec<u8> {
        match self {
            Self::Private(key) => key.e().to_bytes_be(),
            Self::Public(key) => key.e().to_bytes_be(),
        }
    }

    /// Export integer components; `include_private` additionally emits the
    /// private exponent and the CRT fields.
    pub fn components(&self, include_private: bool) -> Result<RsaComponents> {
        let public = self.public();
        let mut components = RsaComponents {
            n: public.n().to_bytes_be(),
            e: public.e().to_bytes_be(),
            ..Default::default()
        };
        if !include_private {
            return Ok(components);
        }

        let key = self.private()?;
        let primes = key.primes();
        if primes.len() != 2 {
            return Err(Error::Native(format!(
                "multi-prime RSA keys are not supported ({} primes)",
                primes.len()
            )));
        }
        let (p, q) = (&primes[0], &primes[1]);
        let one = BigUint::from(1u32);
        let dp = key.d() % &(p - &one);
        let dq = key.d() % &(q - &one);
        let qi = crt_coefficient(p, q)?;

        components.d = Some(key.d().to_bytes_be());
        components.p = Some(p.to_bytes_be());
        components.q = Some(q.to_bytes_be());
        components.dp = Some(dp.to_bytes_be());
        components.dq = Some(dq.to_bytes_be());
        components.qi = Some(qi.to_bytes_be());
        Ok(components)
    }

    pub fn to_pkcs8(&self) -> Result<Vec<u8>> {
        let der = self.private()?.to_pkcs8_der().map_err(Error::native)?;
        Ok(der.as_bytes().to_vec())
    }

    pub fn to_spki(&self) -> Result<Vec<u8>> {
        let der = self.public().to_public_key_der().map_err(Error::native)?;
        Ok(der.as_bytes().to_vec())
    }

    pub fn sign_pkcs1(&self, hash: HashKind, data: &[u8]) -> Result<Vec<u8>> {
        let digest = crate::native::digest(hash, data);
        self.private()?
            .sign_with_rng(&mut OsRng, pkcs1_padding(hash), &digest)
            .map_err(Error::native)
    }

    pub fn verify_pkcs1(&self, hash: HashKind, data: &[u8], signature: &[u8]) -> Result<bool> {
        let digest = crate::native::digest(hash, data);
        Ok(self
            .public()
            .verify(pkcs1_padding(hash), &digest, signature)
            .is_ok())
    }

    pub fn sign_pss(&self, hash: HashKind, salt_len: usize, data: &[u8]) -> Result<Vec<u8>> {
        let digest = crate::native::digest(hash, data);
        self.private()?
            .sign_with_rng(&mut OsRng, pss_padding(hash, salt_len), &digest)
            .map_err(Error::native)
    }

    pub fn verify_pss(
        &self,
        hash: HashKind,
        salt_len: usize,
        data: &[u8],
        signature: &[u8],
    ) -> Result<bool> {
        let digest = crate::native::digest(hash, data);
        Ok(self
            .public()
            .verify(pss_padding(hash, salt_len), &digest, signature)
            .is_ok())
    }

    pub fn encrypt_oaep(&self, hash: HashKind, label: Option<&[u8]>, data: &[u8]) -> Result<Vec<u8>> {
        let padding = oaep_padding(hash, label)?;
        self.public()
            .encrypt(&mut OsRng, padding, data)
            .map_err(Error::native)
    }

    pub fn decrypt_oaep(&self, hash: HashKind, label: Option<&[u8]>, data: &[u8]) -> Result<Vec<u8>> {
        let padding = oaep_padding(hash, label)?;
        self.private()?.decrypt(padding, data).map_err(Error::native)
    }
}

/// `q^-1 mod p`, normalized to the non-negative representative.
fn crt_coefficient(p: &BigUint, q: &BigUint) -> Result<BigUint> {
    let p_int = BigInt::from_biguint(Sign::Plus, p.clone());
    let mut qi = q
        .mod_inverse(p)
        .ok_or_else(|| Error::Native("RSA primes are not coprime".to_string()))?;
    if qi.sign() == Sign::Minus {
        qi += &p_int;
    }
    qi.to_biguint()
        .ok_or_else(|| Error::Native("RSA CRT coefficient is out of range".to_string()))
}

fn pkcs1_padding(hash: HashKind) -> Pkcs1v15Sign {
    match hash {
        HashKind::Sha1 => Pkcs1v15Sign::new::<Sha1>(),
        HashKind::Sha224 => Pkcs1v15Sign::new::<Sha224>(),
        HashKind::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
        HashKind::Sha384 => Pkcs1v15Sign::new::<Sha384>(),
        HashKind::Sha512 => Pkcs1v15Sign::new::<Sha512>(),
    }
}

fn pss_padding(hash: HashKind, salt_len: usize) -> Pss {
    match hash {
        HashKind::Sha1 => Pss::new_with_salt::<Sha1>(salt_len),
        HashKind::Sha224 => Pss::new_with_salt::<Sha224>(salt_len),
        HashKind::Sha256 => Pss::new_with_salt::<Sha256>(salt_len),
        HashKind::Sha384 => Pss::new_with_salt::<Sha384>(salt_len),
        HashKind::Sha512 => Pss::new_with_salt::<Sha512>(salt_len),
    }
}

fn oaep_padding(hash: HashKind, label: Option<&[u8]>) -> Result<Oaep> {
    let mut padding = match hash {
        HashKind::Sha1 => Oaep::new::<Sha1>(),
        HashKind::Sha224 => Oaep::new::<Sha224>(),
        HashKind::Sha256 => Oaep::new::<Sha256>(),
        HashKind::Sha384 => Oaep::new::<Sha384>(),
        HashKind::Sha512 => Oaep::new::<Sha512>(),
    };
    if let Some(label) = label {
        if !label.is_empty() {
            // The engine's OAEP label parameter is textual.
            let text = std::str::from_utf8(label).map_err(|_| {
                Error::config("OAEP label must be valid UTF-8 for this engine")
            })?;
            padding.label = Some(text.to_string());
        }
    }
    Ok(padding)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_key() -> RsaKey {
        RsaKey::generate(1024, true).expect("keygen")
    }

    #[test]
    fn component_roundtrip_preserves_the_modulus() {
        let key = small_key();
        let components = key.components(true).unwrap();
        assert!(components.is_private());
        assert_eq!(components.n.len(), 128);

        let rebuilt = RsaKey::from_components(&components).unwrap();
        assert!(rebuilt.is_private());
        assert_eq!(rebuilt.components(true).unwrap().n, components.n);
    }

    #[test]
    fn public_components_never_leak_private_fields() {
        let key = small_key();
        let components = key.components(false).unwrap();
        assert!(components.d.is_none());
        assert!(components.qi.is_none());
    }

    #[test]
    fn pkcs1_sign_verify() {
        let key = small_key();
        let signature = key.sign_pkcs1(HashKind::Sha256, b"payload").unwrap();
        assert!(key.verify_pkcs1(HashKind::Sha256, b"payload", &signature).unwrap());
        assert!(!key.verify_pkcs1(HashKind::Sha256, b"other", &signature).unwrap());
    }

    #[test]
    fn pss_sign_verify_with_salt() {
        let key = small_key();
        let signature = key.sign_pss(HashKind::Sha256, 32, b"payload").unwrap();
        assert!(key
            .verify_pss(HashKind::Sha256, 32, b"payload", &signature)
            .unwrap());
    }

    #[test]
    fn oaep_roundtrip_with_label() {
        let key = small_key();
        let ciphertext = key
            .encrypt_oaep(HashKind::Sha1, Some(b"label"), b"secret")
            .unwrap();
        let plaintext = key
            .decrypt_oaep(HashKind::Sha1, Some(b"label"), &ciphertext)
            .unwrap();
        assert_eq!(plaintext, b"secret");
        assert!(key
            .decrypt_oaep(HashKind::Sha1, Some(b"wrong"), &ciphertext)
            .is_err());
    }

    #[test]
    fn der_roundtrips() {
        let key = small_key();
        let pkcs8 = key.to_pkcs8().unwrap();
        let spki = key.to_spki().unwrap();
        assert!(RsaKey::from_pkcs8(&pkcs8).unwrap().is_private());
        let public = RsaKey::from_spki(&spki).unwrap();
        assert!(!public.is_private());
        assert!(public.to_pkcs8().is_err());
    }

    #[test]
    fn short_exponent_mode_uses_three() {
        let key = RsaKey::generate(1024, false).unwrap();
        assert_eq!(key.public_exponent(), vec![3]);
        let f4 = small_key();
        assert_eq!(f4.public_exponent(), vec![1, 0, 1]);
    }
}
