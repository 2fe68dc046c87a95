//! Directory-backed key persistence.
//!
//! One JSON file per key name (suffix `.json`), mirrored by an in-memory
//! index owned by the storage instance. The directory is fully rescanned on
//! construction and on [`KeyStorage::clear`]; files that fail to parse or
//! lack required fields are skipped, never fatal. There is no write locking:
//! concurrent writers to the same name race and the filesystem's last write
//! wins.

use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use dashmap::DashMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::algorithm::Algorithm;
use crate::crypto::ec::{curve_from_label, curve_label};
use crate::error::{Error, Result};
use crate::key::{CryptoKey, KeyKind, KeyUsage};
use crate::native::{EcComponents, EcKey, NativeKey, RsaComponents, RsaKey};

const JSON_FILE_EXT: &str = ".json";

/// Fields that are never base64-transformed when a record moves to or from
/// disk; everything else string-valued in `keyJwk` is treated as bytes.
const RESERVED_FIELDS: [&str; 6] = ["kty", "usage", "alg", "crv", "ext", "name"];

/// A persisted key record: the structured key material plus the handle
/// metadata needed to rebuild a [`CryptoKey`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredKey {
    pub algorithm: Algorithm,
    pub usages: Vec<KeyUsage>,
    #[serde(rename = "type")]
    pub kind: KeyKind,
    #[serde(rename = "keyJwk")]
    pub key_jwk: Map<String, Value>,
    pub name: String,
    pub extractable: bool,
    #[serde(skip)]
    pub(crate) file: Option<PathBuf>,
}

/// Persists and retrieves key records by name under one directory.
pub struct KeyStorage {
    directory: PathBuf,
    keys: DashMap<String, StoredKey>,
}

impl KeyStorage {
    /// Open (creating if needed) a storage directory and index every
    /// readable record in it.
    pub fn new<P: AsRef<Path>>(directory: P) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        std::fs::create_dir_all(&directory)?;
        let storage = Self {
            directory,
            keys: DashMap::new(),
        };
        storage.read_directory()?;
        Ok(storage)
    }

    /// Number of indexed records.
    pub fn length(&self) -> usize {
        self.keys.len()
    }

    /// Drop the index and every file in the directory.
    pub fn clear(&self) -> Result<()> {
        self.keys.clear();
        for entry in std::fs::read_dir(&self.directory)? {
            let path = entry?.path();
            if path.is_file() {
                std::fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    /// Rebuild a key handle from the record stored under `name`, or `None`
    /// when no such record is indexed.
    pub fn get_item(&self, name: &str) -> Result<Option<CryptoKey>> {
        let record = match self.keys.get(name) {
            Some(entry) => entry.value().clone(),
            None => return Ok(None),
        };
        let fields = decode_byte_fields(&record.key_jwk);
        let native = match record.kind {
            KeyKind::Public | KeyKind::Private => {
                import_asymmetric(&record.key_jwk, &fields, record.kind == KeyKind::Private)?
            }
            KeyKind::Secret => {
                return Err(Error::config("secret key storage is not implemented"));
            }
        };
        Ok(Some(CryptoKey::new(
            native,
            record.algorithm.clone(),
            record.kind,
            record.extractable,
            record.usages.clone(),
        )))
    }

    /// Persist `key` under `name`, replacing any previous record.
    pub fn set_item(&self, name: &str, key: &CryptoKey) -> Result<()> {
        let key_jwk = match key.kind {
            KeyKind::Public => export_components(key, false)?,
            KeyKind::Private => export_components(key, true)?,
            KeyKind::Secret => {
                return Err(Error::config("secret key storage is not implemented"));
            }
        };
        let record = StoredKey {
            algorithm: key.algorithm.clone(),
            usages: key.usages.clone(),
            kind: key.kind,
            key_jwk,
            name: name.to_string(),
            extractable: key.extractable,
            file: None,
        };
        self.save_file(&record)?;
        self.keys.insert(name.to_string(), record);
        Ok(())
    }

    /// Remove the record and its file, if either exists.
    pub fn remove_item(&self, name: &str) -> Result<()> {
        if let Some((_, record)) = self.keys.remove(name) {
            let file = record
                .file
                .unwrap_or_else(|| self.record_path(&record.name));
            if file.exists() {
                std::fs::remove_file(file)?;
            }
        }
        Ok(())
    }

    fn record_path(&self, name: &str) -> PathBuf {
        self.directory.join(format!("{name}{JSON_FILE_EXT}"))
    }

    fn save_file(&self, record: &StoredKey) -> Result<()> {
        let json = serde_json::to_string(record)?;
        std::fs::write(self.record_path(&record.name), json)?;
        Ok(())
    }

    /// Parse one record file; anything unreadable or incomplete yields `None`.
    fn read_file(path: &Path) -> Option<StoredKey> {
        let text = std::fs::read_to_string(path).ok()?;
        let mut record: StoredKey = serde_json::from_str(&text).ok()?;
        record.file = Some(path.to_path_buf());
        Some(record)
    }

    fn read_directory(&self) -> Result<()> {
        self.keys.clear();
        for entry in std::fs::read_dir(&self.directory)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            match Self::read_file(&path) {
                Some(record) => {
                    self.keys.insert(record.name.clone(), record);
                }
                None => warn!("skipping unreadable key record {}", path.display()),
            }
        }
        debug!(
            "indexed {} key records under {}",
            self.keys.len(),
            self.directory.display()
        );
        Ok(())
    }
}

fn encode_bytes(value: &[u8]) -> Value {
    Value::String(STANDARD.encode(value))
}

/// Decode every non-reserved string field as base64 bytes; fields that fail
/// to decode are simply left out, matching the tolerant read path.
fn decode_byte_fields(map: &Map<String, Value>) -> Map<String, Value> {
    let mut decoded = Map::new();
    for (field, value) in map {
        if RESERVED_FIELDS.contains(&field.as_str()) {
            continue;
        }
        if let Value::String(text) = value {
            if let Ok(bytes) = STANDARD.decode(text) {
                decoded.insert(field.clone(), encode_raw(bytes));
            }
        }
    }
    decoded
}

// Decoded bytes ride through the JSON value type as arrays.
fn encode_raw(bytes: Vec<u8>) -> Value {
    Value::Array(bytes.into_iter().map(|b| Value::Number(b.into())).collect())
}

fn raw_field(map: &Map<String, Value>, field: &str) -> Option<Vec<u8>> {
    match map.get(field)? {
        Value::Array(items) => items
            .iter()
            .map(|v| v.as_u64().and_then(|n| u8::try_from(n).ok()))
            .collect(),
        _ => None,
    }
}

fn require_raw(map: &Map<String, Value>, field: &str) -> Result<Vec<u8>> {
    raw_field(map, field)
        .ok_or_else(|| Error::data(format!("stored record is missing the '{field}' field")))
}

/// Build the `keyJwk` map for a record from the native key's components.
fn export_components(key: &CryptoKey, include_private: bool) -> Result<Map<String, Value>> {
    let mut map = Map::new();
    match key.native() {
        NativeKey::Rsa(rsa) => {
            let components = rsa.components(include_private)?;
            map.insert("kty".to_string(), Value::String("RSA".to_string()));
            map.insert("n".to_string(), encode_bytes(&components.n));
            map.insert("e".to_string(), encode_bytes(&components.e));
            if let (Some(d), Some(p), Some(q), Some(dp), Some(dq), Some(qi)) = (
                &components.d,
                &components.p,
                &components.q,
                &components.dp,
                &components.dq,
                &components.qi,
            ) {
                map.insert("d".to_string(), encode_bytes(d));
                map.insert("p".to_string(), encode_bytes(p));
                map.insert("q".to_string(), encode_bytes(q));
                map.insert("dp".to_string(), encode_bytes(dp));
                map.insert("dq".to_string(), encode_bytes(dq));
                map.insert("qi".to_string(), encode_bytes(qi));
            }
        }
        NativeKey::Ec(ec) => {
            let components = ec.components(include_private)?;
            map.insert("kty".to_string(), Value::String("EC".to_string()));
            map.insert(
                "crv".to_string(),
                Value::String(curve_label(components.curve).to_string()),
            );
            map.insert("x".to_string(), encode_bytes(&components.x));
            map.insert("y".to_string(), encode_bytes(&components.y));
            if let Some(d) = &components.d {
                map.insert("d".to_string(), encode_bytes(d));
            }
        }
        _ => {
            return Err(Error::config("secret key storage is not implemented"));
        }
    }
    Ok(map)
}

/// Rebuild a native key from a decoded record map.
fn import_asymmetric(
    record: &Map<String, Value>,
    fields: &Map<String, Value>,
    private: bool,
) -> Result<NativeKey> {
    let kty = record
        .get("kty")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::data("stored record is missing the 'kty' field"))?;
    match kty {
        "RSA" => {
            let mut components = RsaComponents {
                n: require_raw(fields, "n")?,
                e: require_raw(fields, "e")?,
                ..Default::default()
            };
            if private {
                components.d = Some(require_raw(fields, "d")?);
                components.p = Some(require_raw(fields, "p")?);
                components.q = Some(require_raw(fields, "q")?);
                components.dp = raw_field(fields, "dp");
                components.dq = raw_field(fields, "dq");
                components.qi = raw_field(fields, "qi");
            }
            Ok(NativeKey::Rsa(RsaKey::from_components(&components)?))
        }
        "EC" => {
            let label = record
                .get("crv")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::data("stored record is missing the 'crv' field"))?;
            let components = EcComponents {
                curve: curve_from_label(label)?,
                x: require_raw(fields, "x")?,
                y: require_raw(fields, "y")?,
                d: if private {
                    Some(require_raw(fields, "d")?)
                } else {
                    None
                },
            };
            Ok(NativeKey::Ec(EcKey::from_components(&components)?))
        }
        other => Err(Error::data(format!("unknown stored key type '{other}'"))),
    }
}
