//! Defines the custom error type for the `webcrypto-kit` crate.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the `webcrypto-kit` crate.
///
/// Operations fail into one of a small number of classes: an algorithm (or
/// derivation target) outside the supported catalog, an invalid caller-supplied
/// configuration, a failure reported by the native primitive engine, or
/// malformed input data. Native failures carry the engine's message verbatim.
#[derive(Debug, Error)]
pub enum Error {
    #[error("algorithm not supported: {0}")]
    NotSupported(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("native engine failure: {0}")]
    Native(String),

    #[error("malformed data: {0}")]
    Data(String),

    #[error(
        "requested {0} random bytes, which exceeds the number of bytes of entropy available via this API (65536)"
    )]
    QuotaExceeded(usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn not_supported(name: impl AsRef<str>) -> Self {
        Self::NotSupported(name.as_ref().to_string())
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub(crate) fn native(err: impl std::fmt::Display) -> Self {
        Self::Native(err.to_string())
    }

    pub(crate) fn data(msg: impl Into<String>) -> Self {
        Self::Data(msg.into())
    }

    /// Numeric code carried by DOM-style errors. Only the entropy quota
    /// error has one (22, `QUOTA_EXCEEDED_ERR`).
    pub fn code(&self) -> Option<u32> {
        match self {
            Self::QuotaExceeded(_) => Some(22),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Data(format!("JSON error: {err}"))
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Self::Data(format!("base64 decoding failed: {err}"))
    }
}
