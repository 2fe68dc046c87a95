//! The top-level facade: transform dispatch, optional key storage, and the
//! quota-bounded random-value request.

use std::path::Path;

use crate::error::{Error, Result};
use crate::native;
use crate::storage::KeyStorage;
use crate::subtle::SubtleCrypto;

/// Upper bound, in bytes, of a single random-value request.
const MAX_RANDOM_BYTES: usize = 65536;

/// Entry point bundling the dispatcher with an optional key store.
pub struct WebCrypto {
    pub subtle: SubtleCrypto,
    pub key_storage: Option<KeyStorage>,
}

impl WebCrypto {
    /// A facade without persistent storage.
    pub fn new() -> Self {
        Self {
            subtle: SubtleCrypto::new(),
            key_storage: None,
        }
    }

    /// A facade whose key storage lives under `directory`.
    pub fn with_storage<P: AsRef<Path>>(directory: P) -> Result<Self> {
        Ok(Self {
            subtle: SubtleCrypto::new(),
            key_storage: Some(KeyStorage::new(directory)?),
        })
    }

    /// Fill `buffer` from a cryptographically secure entropy source.
    ///
    /// Requests beyond 65536 bytes fail with the quota error (code 22)
    /// before the RNG is touched.
    pub fn get_random_values(&self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() > MAX_RANDOM_BYTES {
            return Err(Error::QuotaExceeded(buffer.len()));
        }
        native::random_bytes(buffer);
        Ok(())
    }
}

impl Default for WebCrypto {
    fn default() -> Self {
        Self::new()
    }
}
