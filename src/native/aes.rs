//! AES primitives: block modes, GCM, and the RFC 3394 key-wrap transform.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyInit, KeyIvInit, StreamCipher};
use aes::{Aes128, Aes192, Aes256};
use aes_gcm::aead::consts::{U12, U13, U14, U15, U16};
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, Payload};
use aes_gcm::AesGcm;
use aes_kw::Kek;
use ctr::{Ctr128BE, Ctr32BE, Ctr64BE};
use zeroize::Zeroizing;

use crate::error::{Error, Result};
use crate::native::random_vec;

const BLOCK_SIZE: usize = 16;
const GCM_NONCE_SIZE: usize = 12;
const KW_SEMIBLOCK: usize = 8;

/// Symmetric key material held by the engine.
pub struct AesKey {
    material: Zeroizing<Vec<u8>>,
}

impl AesKey {
    /// Draw a fresh key of `len` bytes from the CSPRNG.
    pub fn generate(len: usize) -> Result<Self> {
        if !matches!(len, 16 | 24 | 32) {
            return Err(Error::Native(format!(
                "AES key length must be 128, 192 or 256 bits, got {} bits",
                len * 8
            )));
        }
        Ok(Self {
            material: Zeroizing::new(random_vec(len)),
        })
    }

    /// Adopt caller-supplied key bytes verbatim; the length is validated when
    /// the key is first used with a cipher.
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

    pub fn encrypt_gcm(&self, iv: &[u8], data: &[u8], aad: &[u8], tag_bits: u32) -> Result<Vec<u8>> {
        self.gcm_apply(iv, data, aad, tag_bits, true)
    }

    pub fn decrypt_gcm(&self, iv: &[u8], data: &[u8], aad: &[u8], tag_bits: u32) -> Result<Vec<u8>> {
        self.gcm_apply(iv, data, aad, tag_bits, false)
    }

    fn gcm_apply(
        &self,
        iv: &[u8],
        data: &[u8],
        aad: &[u8],
        tag_bits: u32,
        encrypt: bool,
    ) -> Result<Vec<u8>> {
        if iv.len() != GCM_NONCE_SIZE {
            return Err(Error::Native(format!(
                "AES-GCM initialization vector must be {GCM_NONCE_SIZE} bytes, got {}",
                iv.len()
            )));
        }
        let nonce = GenericArray::from_slice(iv);
        let payload = Payload { msg: data, aad };

        macro_rules! run {
            ($aes:ty, $tag:ty) => {{
                let cipher = AesGcm::<$aes, U12, $tag>::new_from_slice(&self.material)
                    .map_err(Error::native)?;
                let outcome = if encrypt {
                    cipher.encrypt(nonce, payload)
                } else {
                    cipher.decrypt(nonce, payload)
                };
                outcome.map_err(|_| {
                    Error::Native(format!(
                        "AES-GCM {} failed",
                        if encrypt { "encryption" } else { "decryption" }
                    ))
                })
            }};
        }

        match (self.material.len(), tag_bits) {
            (16, 96) => run!(Aes128, U12),
            (16, 104) => run!(Aes128, U13),
            (16, 112) => run!(Aes128, U14),
            (16, 120) => run!(Aes128, U15),
            (16, 128) => run!(Aes128, U16),
            (24, 96) => run!(Aes192, U12),
            (24, 104) => run!(Aes192, U13),
            (24, 112) => run!(Aes192, U14),
            (24, 120) => run!(Aes192, U15),
            (24, 128) => run!(Aes192, U16),
            (32, 96) => run!(Aes256, U12),
            (32, 104) => run!(Aes256, U13),
            (32, 112) => run!(Aes256, U14),
            (32, 120) => run!(Aes256, U15),
            (32, 128) => run!(Aes256, U16),
            (16 | 24 | 32, bits) => Err(Error::Native(format!(
                "AES-GCM tag length {bits} is not supported"
            ))),
            (len, _) => Err(invalid_key_len(len)),
        }
    }

    pub fn encrypt_cbc(&self, iv: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        check_iv(iv)?;
        match self.material.len() {
            16 => Ok(cbc::Encryptor::<Aes128>::new_from_slices(&self.material, iv)
                .map_err(Error::native)?
                .encrypt_padded_vec_mut::<Pkcs7>(data)),
            24 => Ok(cbc::Encryptor::<Aes192>::new_from_slices(&self.material, iv)
                .map_err(Error::native)?
                .encrypt_padded_vec_mut::<Pkcs7>(data)),
            32 => Ok(cbc::Encryptor::<Aes256>::new_from_slices(&self.material, iv)
                .map_err(Error::native)?
                .encrypt_padded_vec_mut::<Pkcs7>(data)),
            len => Err(invalid_key_len(len)),
        }
    }

    pub fn decrypt_cbc(&self, iv: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        check_iv(iv)?;
        let unpad = |_| Error::Native("AES-CBC unpadding failed".to_string());
        match self.material.len() {
            16 => cbc::Decryptor::<Aes128>::new_from_slices(&self.material, iv)
                .map_err(Error::native)?
                .decrypt_padded_vec_mut::<Pkcs7>(data)
                .map_err(unpad),
            24 => cbc::Decryptor::<Aes192>::new_from_slices(&self.material, iv)
                .map_err(Error::native)?
                .decrypt_padded_vec_mut::<Pkcs7>(data)
                .map_err(unpad),
            32 => cbc::Decryptor::<Aes256>::new_from_slices(&self.material, iv)
                .map_err(Error::native)?
                .decrypt_padded_vec_mut::<Pkcs7>(data)
                .map_err(unpad),
            len => Err(invalid_key_len(len)),
        }
    }

    /// CTR keystream application; encryption and decryption are the same
    /// operation. `counter_bits` selects how many trailing bits of the counter
    /// block roll over: this engine pins the convention to big-endian 32, 64
    /// or 128 bit counters.
    pub fn apply_ctr(&self, counter: &[u8], counter_bits: u32, data: &[u8]) -> Result<Vec<u8>> {
        if counter.len() != BLOCK_SIZE {
            return Err(Error::Native(format!(
                "AES-CTR counter block must be {BLOCK_SIZE} bytes, got {}",
                counter.len()
            )));
        }
        let mut buffer = data.to_vec();

        macro_rules! run {
            ($ctr:ident, $aes:ty) => {{
                let mut cipher =
                    $ctr::<$aes>::new_from_slices(&self.material, counter).map_err(Error::native)?;
                cipher.apply_keystream(&mut buffer);
            }};
        }

        match (self.material.len(), counter_bits) {
            (16, 32) => run!(Ctr32BE, Aes128),
            (16, 64) => run!(Ctr64BE, Aes128),
            (16, 128) => run!(Ctr128BE, Aes128),
            (24, 32) => run!(Ctr32BE, Aes192),
            (24, 64) => run!(Ctr64BE, Aes192),
            (24, 128) => run!(Ctr128BE, Aes192),
            (32, 32) => run!(Ctr32BE, Aes256),
            (32, 64) => run!(Ctr64BE, Aes256),
            (32, 128) => run!(Ctr128BE, Aes256),
            (16 | 24 | 32, bits) => {
                return Err(Error::Native(format!(
                    "AES-CTR counter length {bits} is not supported; use 32, 64 or 128"
                )));
            }
            (len, _) => return Err(invalid_key_len(len)),
        }
        Ok(buffer)
    }

    pub fn encrypt_ecb(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self.material.len() {
            16 => Ok(ecb::Encryptor::<Aes128>::new_from_slice(&self.material)
                .map_err(Error::native)?
                .encrypt_padded_vec_mut::<Pkcs7>(data)),
            24 => Ok(ecb::Encryptor::<Aes192>::new_from_slice(&self.material)
                .map_err(Error::native)?
                .encrypt_padded_vec_mut::<Pkcs7>(data)),
            32 => Ok(ecb::Encryptor::<Aes256>::new_from_slice(&self.material)
                .map_err(Error::native)?
                .encrypt_padded_vec_mut::<Pkcs7>(data)),
            len => Err(invalid_key_len(len)),
        }
    }

    pub fn decrypt_ecb(&self, data: &[u8]) -> Result<Vec<u8>> {
        let unpad = |_| Error::Native("AES-ECB unpadding failed".to_string());
        match self.material.len() {
            16 => ecb::Decryptor::<Aes128>::new_from_slice(&self.material)
                .map_err(Error::native)?
                .decrypt_padded_vec_mut::<Pkcs7>(data)
                .map_err(unpad),
            24 => ecb::Decryptor::<Aes192>::new_from_slice(&self.material)
                .map_err(Error::native)?
                .decrypt_padded_vec_mut::<Pkcs7>(data)
                .map_err(unpad),
            32 => ecb::Decryptor::<Aes256>::new_from_slice(&self.material)
                .map_err(Error::native)?
                .decrypt_padded_vec_mut::<Pkcs7>(data)
                .map_err(unpad),
            len => Err(invalid_key_len(len)),
        }
    }

    /// RFC 3394 key wrap. The payload must be a whole number of 8-byte
    /// semiblocks, at least two of them.
    pub fn wrap(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() < 2 * KW_SEMIBLOCK || data.len() % KW_SEMIBLOCK != 0 {
            return Err(Error::Native(format!(
                "key wrap input must be a multiple of {KW_SEMIBLOCK} bytes (at least 16), got {}",
                data.len()
            )));
        }
        let mut out = vec![0u8; data.len() + KW_SEMIBLOCK];
        match self.material.len() {
            16 => Kek::<Aes128>::try_from(self.material.as_slice())
                .map_err(Error::native)?
                .wrap(data, &mut out)
                .map_err(Error::native)?,
            24 => Kek::<Aes192>::try_from(self.material.as_slice())
                .map_err(Error::native)?
                .wrap(data, &mut out)
                .map_err(Error::native)?,
            32 => Kek::<Aes256>::try_from(self.material.as_slice())
                .map_err(Error::native)?
                .wrap(data, &mut out)
                .map_err(Error::native)?,
            len => return Err(invalid_key_len(len)),
        }
        Ok(out)
    }

    /// RFC 3394 key unwrap, the inverse of [`AesKey::wrap`].
    pub fn unwrap(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() < 3 * KW_SEMIBLOCK || data.len() % KW_SEMIBLOCK != 0 {
            return Err(Error::Native(format!(
                "wrapped key must be a multiple of {KW_SEMIBLOCK} bytes (at least 24), got {}",
                data.len()
            )));
        }
        let mut out = vec![0u8; data.len() - KW_SEMIBLOCK];
        match self.material.len() {
            16 => Kek::<Aes128>::try_from(self.material.as_slice())
                .map_err(Error::native)?
                .unwrap(data, &mut out)
                .map_err(Error::native)?,
            24 => Kek::<Aes192>::try_from(self.material.as_slice())
                .map_err(Error::native)?
                .unwrap(data, &mut out)
                .map_err(Error::native)?,
            32 => Kek::<Aes256>::try_from(self.material.as_slice())
                .map_err(Error::native)?
                .unwrap(data, &mut out)
                .map_err(Error::native)?,
            len => return Err(invalid_key_len(len)),
        }
        Ok(out)
    }
}

fn check_iv(iv: &[u8]) -> Result<()> {
    if iv.len() != BLOCK_SIZE {
        return Err(Error::Native(format!(
            "AES initialization vector must be {BLOCK_SIZE} bytes, got {}",
            iv.len()
        )));
    }
    Ok(())
}

fn invalid_key_len(len: usize) -> Error {
    Error::Native(format!(
        "invalid AES key length {} bits; expected 128, 192 or 256",
        len * 8
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_rejects_odd_lengths() {
        assert!(AesKey::generate(16).is_ok());
        assert!(AesKey::generate(24).is_ok());
        assert!(AesKey::generate(32).is_ok());
        assert!(AesKey::generate(20).is_err());
    }

    #[test]
    fn gcm_roundtrip_with_aad() {
        let key = AesKey::generate(32).unwrap();
        let iv = [7u8; 12];
        let ciphertext = key
            .encrypt_gcm(&iv, b"plaintext", b"header", 128)
            .unwrap();
        let plaintext = key.decrypt_gcm(&iv, &ciphertext, b"header", 128).unwrap();
        assert_eq!(plaintext, b"plaintext");
        // A mismatched tag fails closed.
        assert!(key.decrypt_gcm(&iv, &ciphertext, b"tampered", 128).is_err());
    }

    #[test]
    fn gcm_rejects_unsupported_tag_lengths() {
        let key = AesKey::generate(16).unwrap();
        let err = key.encrypt_gcm(&[0u8; 12], b"x", b"", 64).unwrap_err();
        assert!(matches!(err, Error::Native(_)));
    }

    #[test]
    fn cbc_roundtrip_pads_to_block() {
        let key = AesKey::generate(16).unwrap();
        let iv = [1u8; 16];
        let ciphertext = key.encrypt_cbc(&iv, b"short").unwrap();
        assert_eq!(ciphertext.len() % 16, 0);
        assert_eq!(key.decrypt_cbc(&iv, &ciphertext).unwrap(), b"short");
    }

    #[test]
    fn ctr_is_its_own_inverse() {
        let key = AesKey::generate(24).unwrap();
        let counter = [9u8; 16];
        let ciphertext = key.apply_ctr(&counter, 64, b"stream data").unwrap();
        assert_eq!(key.apply_ctr(&counter, 64, &ciphertext).unwrap(), b"stream data");
        assert!(key.apply_ctr(&counter, 48, b"x").is_err());
    }

    #[test]
    fn ecb_roundtrip() {
        let key = AesKey::generate(32).unwrap();
        let ciphertext = key.encrypt_ecb(b"0123456789abcdef!").unwrap();
        assert_eq!(key.decrypt_ecb(&ciphertext).unwrap(), b"0123456789abcdef!");
    }

    #[test]
    fn key_wrap_roundtrip_adds_a_semiblock() {
        let kek = AesKey::generate(16).unwrap();
        let payload = [0x42u8; 16];
        let wrapped = kek.wrap(&payload).unwrap();
        assert_eq!(wrapped.len(), payload.len() + 8);
        assert_eq!(kek.unwrap(&wrapped).unwrap(), payload);
        assert!(kek.wrap(&[1, 2, 3]).is_err());
    }
}
