//! JSON Web Key structured records and byte-format helpers.
//!
//! A [`JsonWebKey`] is the canonical interchange form for key material: it is
//! what `export_key` produces for the `jwk` format, what `import_key` accepts,
//! and the basis of the persisted storage record. Byte-valued fields are
//! base64url without padding.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::key::KeyUsage;

/// Encode bytes as unpadded base64url, the JWK field convention.
pub fn b64url_encode(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

/// Decode an unpadded base64url JWK field.
pub fn b64url_decode(text: &str) -> Result<Vec<u8>> {
    Ok(URL_SAFE_NO_PAD.decode(text)?)
}

/// Left-pad a big-endian integer encoding with zero bytes to a fixed width.
///
/// Inputs already at (or beyond) the requested width are returned unchanged;
/// the engine may hand back variable-width encodings and external formats
/// require curve- or modulus-specific fixed widths.
pub(crate) fn left_pad(bytes: &[u8], width: usize) -> Vec<u8> {
    if bytes.len() >= width {
        return bytes.to_vec();
    }
    let mut out = vec![0u8; width - bytes.len()];
    out.extend_from_slice(bytes);
    out
}

/// JWK-style structured key record.
///
/// `kty` selects the shape: `oct` uses `k`; `RSA` uses `n`/`e` plus the CRT
/// fields for private keys; `EC` uses `crv`/`x`/`y` plus `d` for private keys.
/// `alg`, `key_ops` and `ext` are annotations set on export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JsonWebKey {
    pub kty: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_ops: Option<Vec<KeyUsage>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<bool>,

    // oct
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k: Option<String>,

    // RSA
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dq: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qi: Option<String>,

    // EC
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
}

impl JsonWebKey {
    /// A secret-key record holding raw bytes in `k`.
    pub fn oct(secret: &[u8]) -> Self {
        Self {
            kty: "oct".to_string(),
            k: Some(b64url_encode(secret)),
            ..Default::default()
        }
    }

    fn field(&self, name: &str) -> Option<&str> {
        match name {
            "k" => self.k.as_deref(),
            "n" => self.n.as_deref(),
            "e" => self.e.as_deref(),
            "d" => self.d.as_deref(),
            "p" => self.p.as_deref(),
            "q" => self.q.as_deref(),
            "dp" => self.dp.as_deref(),
            "dq" => self.dq.as_deref(),
            "qi" => self.qi.as_deref(),
            "x" => self.x.as_deref(),
            "y" => self.y.as_deref(),
            _ => None,
        }
    }

    /// Decode a required byte-valued field.
    pub(crate) fn require(&self, name: &str) -> Result<Vec<u8>> {
        let value = self
            .field(name)
            .ok_or_else(|| Error::data(format!("JWK is missing the '{name}' field")))?;
        b64url_decode(value)
    }

    /// Decode an optional byte-valued field.
    pub(crate) fn optional(&self, name: &str) -> Result<Option<Vec<u8>>> {
        match self.field(name) {
            Some(value) => Ok(Some(b64url_decode(value)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64url_roundtrip_is_unpadded() {
        let data = [0u8, 1, 2, 253, 254, 255];
        let text = b64url_encode(&data);
        assert!(!text.contains('='));
        assert_eq!(b64url_decode(&text).unwrap(), data);
    }

    #[test]
    fn left_pad_widens_short_encodings_only() {
        assert_eq!(left_pad(&[0xAB], 3), vec![0, 0, 0xAB]);
        assert_eq!(left_pad(&[1, 2, 3], 3), vec![1, 2, 3]);
        assert_eq!(left_pad(&[1, 2, 3, 4], 3), vec![1, 2, 3, 4]);
    }

    #[test]
    fn oct_record_holds_the_secret() {
        let jwk = JsonWebKey::oct(&[1, 2, 3, 4]);
        assert_eq!(jwk.kty, "oct");
        assert_eq!(jwk.require("k").unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn missing_required_field_is_a_data_error() {
        let jwk = JsonWebKey::oct(&[1]);
        assert!(matches!(jwk.require("n"), Err(Error::Data(_))));
        assert!(jwk.optional("x").unwrap().is_none());
    }

    #[test]
    fn annotations_are_omitted_when_unset() {
        let json = serde_json::to_value(JsonWebKey::oct(&[9])).unwrap();
        assert!(json.get("alg").is_none());
        assert!(json.get("key_ops").is_none());
        assert_eq!(json["kty"], "oct");
    }
}
