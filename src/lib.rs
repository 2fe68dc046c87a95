//! # WebCrypto-Kit: An Algorithm-Agnostic Cryptography Facade
//!
//! `webcrypto-kit` offers WebCrypto-style key lifecycle operations (generate,
//! import, export, derive) and transforms (encrypt, decrypt, sign, verify,
//! wrap, unwrap) over a fixed catalog of algorithm families: AES block modes,
//! the RSA schemes (PKCS#1 v1.5, PSS, OAEP), elliptic curves (ECDSA/ECDH),
//! HMAC and PBKDF2.
//!
//! The heart of the crate is the dispatch engine in [`subtle`]: it normalizes
//! algorithm descriptors, resolves each operation to a family codec, and owns
//! every key-material format conversion (raw bytes, JWK records, PKCS#8/SPKI).
//! The cryptographic math itself lives behind the opaque engine seam in
//! [`native`]. Persistent key storage over a directory of JSON records is in
//! [`storage`].
//!
//! ## Core Concepts
//!
//! - **[`WebCrypto`]**: the entry point, bundling the dispatcher, optional
//!   key storage and the random-value source.
//! - **[`SubtleCrypto`]**: the operations facade; every call returns a
//!   deferred result and never blocks the calling task.
//! - **[`CryptoKey`]**: an immutable, cheaply clonable key handle safe to
//!   share across concurrent operations.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use webcrypto_kit::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> webcrypto_kit::Result<()> {
//!     let crypto = WebCrypto::new();
//!
//!     let key = crypto
//!         .subtle
//!         .generate_key(
//!             &Algorithm::new("AES-GCM").with_length(256),
//!             true,
//!             &[KeyUsage::Encrypt, KeyUsage::Decrypt],
//!         )
//!         .await?
//!         .into_single()?;
//!
//!     let mut iv = [0u8; 12];
//!     crypto.get_random_values(&mut iv)?;
//!
//!     let params = Algorithm::new("AES-GCM").with_iv(iv.to_vec());
//!     let ciphertext = crypto.subtle.encrypt(&params, &key, b"hello").await?;
//!     let plaintext = crypto.subtle.decrypt(&params, &key, &ciphertext).await?;
//!     assert_eq!(plaintext, b"hello");
//!     Ok(())
//! }
//! ```

pub mod algorithm;
pub mod crypto;
pub mod error;
pub mod jwk;
pub mod key;
pub mod native;
pub mod storage;
pub mod subtle;
pub mod webcrypto;

pub use algorithm::{Algorithm, HashKind};
pub use error::{Error, Result};
pub use jwk::JsonWebKey;
pub use key::{
    CryptoKey, ExportedKey, GeneratedKey, KeyData, KeyFormat, KeyKind, KeyPair, KeyUsage,
};
pub use storage::KeyStorage;
pub use subtle::SubtleCrypto;
pub use webcrypto::WebCrypto;

// --- Prelude ---
// A collection of the most commonly used types.
pub mod prelude {
    pub use crate::algorithm::{Algorithm, HashKind};
    pub use crate::error::{Error, Result};
    pub use crate::jwk::JsonWebKey;
    pub use crate::key::{
        CryptoKey, ExportedKey, GeneratedKey, KeyData, KeyFormat, KeyKind, KeyPair, KeyUsage,
    };
    pub use crate::storage::KeyStorage;
    pub use crate::subtle::SubtleCrypto;
    pub use crate::webcrypto::WebCrypto;
}

/// The version of the `webcrypto-kit` crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
