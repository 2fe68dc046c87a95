//! Password-based key derivation (PBKDF2) primitives.

use hmac::Hmac;
use pbkdf2::pbkdf2;
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};
use zeroize::Zeroizing;

use crate::algorithm::HashKind;
use crate::error::{Error, Result};

/// Imported password material. Passwords are never generated, only supplied.
pub struct Pbkdf2Key {
    material: Zeroizing<Vec<u8>>,
}

impl Pbkdf2Key {
    pub fn import(raw: &[u8]) -> Result<Self> {
        Ok(Self {
            material: Zeroizing::new(raw.to_vec()),
        })
    }

    pub fn len(&self) -> usize {
        self.material.len()
    }

    pub fn is_empty(&self) -> bool {
        self.material.is_empty()
    }

    pub fn derive_bits(
        &self,
        hash: HashKind,
        salt: &[u8],
        iterations: u32,
        length_bits: u32,
    ) -> Result<Vec<u8>> {
        if iterations == 0 {
            return Err(Error::Native(
                "PBKDF2 iteration count must be nonzero".to_string(),
            ));
        }
        if length_bits == 0 || length_bits % 8 != 0 {
            return Err(Error::Native(format!(
                "PBKDF2 derived length must be a positive multiple of 8 bits, got {length_bits}"
            )));
        }
        let mut out = vec![0u8; (length_bits / 8) as usize];
        let outcome = match hash {
            HashKind::Sha1 => pbkdf2::<Hmac<Sha1>>(&self.material, salt, iterations, &mut out),
            HashKind::Sha224 => pbkdf2::<Hmac<Sha224>>(&self.material, salt, iterations, &mut out),
            HashKind::Sha256 => pbkdf2::<Hmac<Sha256>>(&self.material, salt, iterations, &mut out),
            HashKind::Sha384 => pbkdf2::<Hmac<Sha384>>(&self.material, salt, iterations, &mut out),
            HashKind::Sha512 => pbkdf2::<Hmac<Sha512>>(&self.material, salt, iterations, &mut out),
        };
        outcome.map_err(|_| Error::Native("PBKDF2 derivation failed".to_string()))?;
        Ok(out)
    }
}
