//! Keyed-hash (HMAC) primitives.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};
use zeroize::Zeroizing;

use crate::algorithm::HashKind;
use crate::error::{Error, Result};
use crate::native::random_vec;

/// MAC key material held by the engine. Any key length is accepted; the
/// underlying construction hashes long keys down per RFC 2104.
pub struct HmacKey {
    material: Zeroizing<Vec<u8>>,
}

impl HmacKey {
    pub fn generate(length_bits: u32) -> Result<Self> {
        if length_bits == 0 || length_bits % 8 != 0 {
            return Err(Error::Native(format!(
                "HMAC key length must be a positive multiple of 8 bits, got {length_bits}"
            )));
        }
        Ok(Self {
            material: Zeroizing::new(random_vec((length_bits / 8) as usize)),
        })
    }

    pub fn import(raw: &[u8]) -> Result<Self> {
        Ok(Self {
            material: Zeroizing::new(raw.to_vec()),
        })
    }

    pub fn export(&self) -> Vec<u8> {
        self.material.to_vec()
    }

    pub fn len(&self) -> usize {
        self.material.len()
    }

    pub fn is_empty(&self) -> bool {
        self.material.is_empty()
    }

    pub fn sign(&self, hash: HashKind, data: &[u8]) -> Result<Vec<u8>> {
        macro_rules! mac {
            ($digest:ty) => {{
                let mut mac =
                    Hmac::<$digest>::new_from_slice(&self.material).map_err(Error::native)?;
                mac.update(data);
                Ok(mac.finalize().into_bytes().to_vec())
            }};
        }
        match hash {
            HashKind::Sha1 => mac!(Sha1),
            HashKind::Sha224 => mac!(Sha224),
            HashKind::Sha256 => mac!(Sha256),
            HashKind::Sha384 => mac!(Sha384),
            HashKind::Sha512 => mac!(Sha512),
        }
    }

    /// Constant-time tag comparison.
    pub fn verify(&self, hash: HashKind, data: &[u8], signature: &[u8]) -> Result<bool> {
        macro_rules! check {
            ($digest:ty) => {{
                let mut mac =
                    Hmac::<$digest>::new_from_slice(&self.material).map_err(Error::native)?;
                mac.update(data);
                Ok(mac.verify_slice(signature).is_ok())
            }};
        }
        match hash {
            HashKind::Sha1 => check!(Sha1),
            HashKind::Sha224 => check!(Sha224),
            HashKind::Sha256 => check!(Sha256),
            HashKind::Sha384 => check!(Sha384),
            HashKind::Sha512 => check!(Sha512),
        }
    }
}
