//! Native engine adapter.
//!
//! Everything below this seam is an opaque primitive provider: key material
//! handles plus the raw cryptographic operations for each family, implemented
//! over the RustCrypto crates. The facade layers above never touch a cipher
//! or a big integer directly; they hand parameters across this boundary and
//! get bytes back.
//!
//! All primitive calls run on the blocking worker pool via [`offload`], so the
//! calling task never blocks; a failed worker surfaces through the deferred
//! result like any other engine failure. Handles are read-only after
//! construction and safe to share between in-flight operations.

pub mod aes;
pub mod ec;
pub mod hmac;
pub mod pbkdf2;
pub mod rsa;

use std::fmt;

use rand_core::{OsRng, RngCore};
use sha1::Sha1;
use sha2::{Digest as _, Sha224, Sha256, Sha384, Sha512};

use crate::algorithm::HashKind;
use crate::error::{Error, Result};

pub use aes::AesKey;
pub use ec::{EcComponents, EcCurve, EcKey};
pub use hmac::HmacKey;
pub use pbkdf2::Pbkdf2Key;
pub use rsa::{RsaComponents, RsaKey};

/// Run a blocking native call on the worker pool.
///
/// The returned future is the operation's deferred result; it completes when
/// the worker finishes. Cancellation is not supported once the call is issued.
pub(crate) async fn offload<T, F>(op: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(op).await {
        Ok(result) => result,
        Err(err) => Err(Error::Native(format!("worker task failed: {err}"))),
    }
}

/// An opaque native key handle. Codecs match on the family they expect and
/// treat a mismatch as malformed input.
pub enum NativeKey {
    Aes(AesKey),
    Hmac(HmacKey),
    Pbkdf2(Pbkdf2Key),
    Rsa(RsaKey),
    Ec(EcKey),
}

impl NativeKey {
    pub(crate) fn as_aes(&self) -> Result<&AesKey> {
        match self {
            Self::Aes(key) => Ok(key),
            _ => Err(Error::data("key handle does not hold AES material")),
        }
    }

    pub(crate) fn as_hmac(&self) -> Result<&HmacKey> {
        match self {
            Self::Hmac(key) => Ok(key),
            _ => Err(Error::data("key handle does not hold HMAC material")),
        }
    }

    pub(crate) fn as_pbkdf2(&self) -> Result<&Pbkdf2Key> {
        match self {
            Self::Pbkdf2(key) => Ok(key),
            _ => Err(Error::data("key handle does not hold PBKDF2 material")),
        }
    }

    pub(crate) fn as_rsa(&self) -> Result<&RsaKey> {
        match self {
            Self::Rsa(key) => Ok(key),
            _ => Err(Error::data("key handle does not hold an RSA key")),
        }
    }

    pub(crate) fn as_ec(&self) -> Result<&EcKey> {
        match self {
            Self::Ec(key) => Ok(key),
            _ => Err(Error::data("key handle does not hold an EC key")),
        }
    }
}

impl fmt::Debug for NativeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print key material.
        let family = match self {
            Self::Aes(_) => "Aes",
            Self::Hmac(_) => "Hmac",
            Self::Pbkdf2(_) => "Pbkdf2",
            Self::Rsa(_) => "Rsa",
            Self::Ec(_) => "Ec",
        };
        f.debug_tuple("NativeKey").field(&family).finish()
    }
}

/// One-shot digest over the fixed hash catalog.
pub fn digest(kind: HashKind, data: &[u8]) -> Vec<u8> {
    match kind {
        HashKind::Sha1 => Sha1::digest(data).to_vec(),
        HashKind::Sha224 => Sha224::digest(data).to_vec(),
        HashKind::Sha256 => Sha256::digest(data).to_vec(),
        HashKind::Sha384 => Sha384::digest(data).to_vec(),
        HashKind::Sha512 => Sha512::digest(data).to_vec(),
    }
}

/// Fill a buffer from the operating system's CSPRNG.
pub fn random_bytes(buffer: &mut [u8]) {
    OsRng.fill_bytes(buffer);
}

/// A freshly drawn random byte vector.
pub fn random_vec(len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    random_bytes(&mut out);
    out
}
