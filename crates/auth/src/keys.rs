//! Signing key material indexed by key id (kid).
//!
//! The authority only ever sees the [`KeyResolver`] trait. [`KeyStore`] is the
//! in-memory implementation, filled from a directory of PEM files or from a
//! JSON document (e.g. a secret injected through the environment).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use jsonwebtoken::{DecodingKey, EncodingKey};
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePublicKey, LineEnding};
use serde::Deserialize;
use thiserror::Error;

/// PEM files larger than this are refused.
const MAX_PEM_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("kid lookup failed: {0}")]
    NotFound(String),

    #[error("invalid key for kid {kid}: {reason}")]
    InvalidKey { kid: String, reason: String },

    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("key file {0} exceeds 1MiB")]
    TooLarge(PathBuf),

    #[error("unable to parse key document: {0}")]
    Document(String),
}

/// Looks up private (signing) and public (verification) keys by kid.
///
/// Resolution must be side-effect free: resolving the same kid twice yields the
/// same key until the material is rotated out of band.
pub trait KeyResolver: Send + Sync {
    fn private_key(&self, kid: &str) -> Result<PrivateKey, KeyError>;
    fn public_key(&self, kid: &str) -> Result<PublicKey, KeyError>;
}

/// PEM-encoded RSA private key.
#[derive(Clone)]
pub struct PrivateKey {
    pem: String,
}

impl PrivateKey {
    pub fn encoding_key(&self) -> Result<EncodingKey, jsonwebtoken::errors::Error> {
        EncodingKey::from_rsa_pem(self.pem.as_bytes())
    }
}

impl core::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

/// PEM-encoded RSA public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    pem: String,
}

impl PublicKey {
    pub fn decoding_key(&self) -> Result<DecodingKey, jsonwebtoken::errors::Error> {
        DecodingKey::from_rsa_pem(self.pem.as_bytes())
    }

    pub fn as_pem(&self) -> &str {
        &self.pem
    }
}

/// A validated private/public key pair.
#[derive(Debug, Clone)]
pub struct KeyPair {
    private: PrivateKey,
    public: PublicKey,
}

impl KeyPair {
    /// Validate both halves up front so a bad key fails at load time, not on
    /// the first request that needs it.
    pub fn from_pem(
        kid: &str,
        private_pem: impl Into<String>,
        public_pem: impl Into<String>,
    ) -> Result<Self, KeyError> {
        let private = PrivateKey {
            pem: private_pem.into(),
        };
        let public = PublicKey {
            pem: public_pem.into(),
        };

        private.encoding_key().map_err(|e| KeyError::InvalidKey {
            kid: kid.to_string(),
            reason: format!("private: {e}"),
        })?;
        public.decoding_key().map_err(|e| KeyError::InvalidKey {
            kid: kid.to_string(),
            reason: format!("public: {e}"),
        })?;

        Ok(Self { private, public })
    }

    /// Build a pair from the private half alone, deriving the public key.
    /// PKCS#1 (`RSA PRIVATE KEY`) and PKCS#8 (`PRIVATE KEY`) are accepted.
    pub fn from_private_pem(kid: &str, private_pem: impl Into<String>) -> Result<Self, KeyError> {
        let private_pem = private_pem.into();
        let public_pem = derive_public_pem(kid, &private_pem)?;
        Self::from_pem(kid, private_pem, public_pem)
    }
}

/// `{"key": <kid>, "pem": <private pem>}`, optionally with a `public_pem`
/// that replaces the derived public key.
#[derive(Deserialize)]
struct KeyDocument {
    #[serde(alias = "kid")]
    key: String,
    #[serde(alias = "private_pem")]
    pem: String,
    #[serde(default)]
    public_pem: Option<String>,
}

/// In-memory key store. Safe for concurrent reads while keys are rotated.
#[derive(Debug, Default)]
pub struct KeyStore {
    keys: RwLock<HashMap<String, KeyPair>>,
    active: RwLock<Option<String>>,
}

impl KeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, kid: impl Into<String>, pair: KeyPair) {
        let mut keys = self.keys.write().unwrap_or_else(|e| e.into_inner());
        keys.insert(kid.into(), pair);
    }

    /// Retire a key. Tokens signed with it stop verifying immediately.
    pub fn remove(&self, kid: &str) -> bool {
        let removed = {
            let mut keys = self.keys.write().unwrap_or_else(|e| e.into_inner());
            keys.remove(kid).is_some()
        };

        let mut active = self.active.write().unwrap_or_else(|e| e.into_inner());
        if active.as_deref() == Some(kid) {
            *active = None;
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.keys.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, kid: &str) -> bool {
        self.keys
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(kid)
    }

    /// Designate the kid new tokens are signed with.
    pub fn set_active(&self, kid: &str) -> Result<(), KeyError> {
        if !self.contains(kid) {
            return Err(KeyError::NotFound(kid.to_string()));
        }
        *self.active.write().unwrap_or_else(|e| e.into_inner()) = Some(kid.to_string());
        Ok(())
    }

    pub fn active_kid(&self) -> Option<String> {
        self.active.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Load a `{"key", "pem"}` document. An empty document is a no-op.
    /// Returns the number of keys held afterwards.
    pub fn load_json(&self, document: &str) -> Result<usize, KeyError> {
        if document.trim().is_empty() {
            return Ok(self.len());
        }

        let doc: KeyDocument =
            serde_json::from_str(document).map_err(|e| KeyError::Document(e.to_string()))?;
        let pair = match doc.public_pem {
            Some(public_pem) => KeyPair::from_pem(&doc.key, doc.pem, public_pem)?,
            None => KeyPair::from_private_pem(&doc.key, doc.pem)?,
        };

        tracing::debug!(kid = %doc.key, "loaded signing key from document");
        self.insert(doc.key, pair);
        Ok(self.len())
    }

    /// Load every `<kid>.pem` private key in `dir`. The public key is derived
    /// unless a `<kid>.pub.pem` sits next to it. Returns the number of keys
    /// held afterwards.
    pub fn load_dir(&self, dir: impl AsRef<Path>) -> Result<usize, KeyError> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|source| KeyError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        for entry in entries {
            let entry = entry.map_err(|source| KeyError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if path.is_dir() {
                continue;
            }

            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.ends_with(".pub.pem") {
                continue;
            }
            let Some(kid) = name.strip_suffix(".pem") else {
                continue;
            };

            let private_pem = read_pem(&path)?;
            let public_path = dir.join(format!("{kid}.pub.pem"));
            let pair = if public_path.is_file() {
                KeyPair::from_pem(kid, private_pem, read_pem(&public_path)?)?
            } else {
                KeyPair::from_private_pem(kid, private_pem)?
            };

            tracing::debug!(kid, "loaded signing key");
            self.insert(kid, pair);
        }

        Ok(self.len())
    }
}

impl KeyResolver for KeyStore {
    fn private_key(&self, kid: &str) -> Result<PrivateKey, KeyError> {
        let keys = self.keys.read().unwrap_or_else(|e| e.into_inner());
        keys.get(kid)
            .map(|pair| pair.private.clone())
            .ok_or_else(|| KeyError::NotFound(kid.to_string()))
    }

    fn public_key(&self, kid: &str) -> Result<PublicKey, KeyError> {
        let keys = self.keys.read().unwrap_or_else(|e| e.into_inner());
        keys.get(kid)
            .map(|pair| pair.public.clone())
            .ok_or_else(|| KeyError::NotFound(kid.to_string()))
    }
}

fn derive_public_pem(kid: &str, private_pem: &str) -> Result<String, KeyError> {
    let invalid = |reason: String| KeyError::InvalidKey {
        kid: kid.to_string(),
        reason,
    };

    let private = RsaPrivateKey::from_pkcs1_pem(private_pem)
        .or_else(|_| RsaPrivateKey::from_pkcs8_pem(private_pem))
        .map_err(|e| invalid(format!("private: {e}")))?;

    private
        .to_public_key()
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| invalid(format!("public: {e}")))
}

fn read_pem(path: &Path) -> Result<String, KeyError> {
    let meta = std::fs::metadata(path).map_err(|source| KeyError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if meta.len() > MAX_PEM_BYTES {
        return Err(KeyError::TooLarge(path.to_path_buf()));
    }
    std::fs::read_to_string(path).map_err(|source| KeyError::Io {
        path: path.to_path_buf(),
        source,
    })
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    /// Sign with the private half and verify with the public half.
    fn assert_pair_matches(store: &KeyStore, kid: &str) {
        use jsonwebtoken::{Algorithm, Header, Validation, decode, encode};

        let claims = serde_json::json!({"sub": "alice", "exp": 4_102_444_800u64});
        let encoding = store.private_key(kid).unwrap().encoding_key().unwrap();
        let token = encode(&Header::new(Algorithm::RS256), &claims, &encoding).unwrap();

        let decoding = store.public_key(kid).unwrap().decoding_key().unwrap();
        let validation = Validation::new(Algorithm::RS256);
        let back = decode::<serde_json::Value>(&token, &decoding, &validation).unwrap();
        assert_eq!(back.claims["sub"], "alice");
    }

    #[test]
    fn loads_every_key_from_a_directory() {
        let store = KeyStore::new();
        let n = store.load_dir(keys_dir()).unwrap();
        assert_eq!(n, 3);
        for kid in [KID, NEXT_KID, ROGUE_KID] {
            assert_pair_matches(&store, kid);
        }
    }

    #[test]
    fn public_key_file_overrides_derivation() {
        let store = KeyStore::new();
        store.load_dir(keys_dir()).unwrap();

        assert_eq!(store.public_key(KID).unwrap().as_pem(), pem(&format!("{KID}.pub.pem")));
        let derived = store.public_key(NEXT_KID).unwrap();
        assert!(derived.as_pem().starts_with("-----BEGIN PUBLIC KEY-----"));
    }

    #[test]
    fn private_only_directory_derives_public_keys() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(format!("{KID}.pem")), pem(&format!("{KID}.pem"))).unwrap();
        std::fs::write(dir.path().join("README.txt"), "not a key").unwrap();

        let store = KeyStore::new();
        assert_eq!(store.load_dir(dir.path()).unwrap(), 1);
        assert_pair_matches(&store, KID);
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = KeyStore::new().load_dir(dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, KeyError::Io { .. }));
    }

    #[test]
    fn unknown_kid_is_not_found() {
        let store = store_with(&[KID]);
        assert!(matches!(store.public_key("nope"), Err(KeyError::NotFound(k)) if k == "nope"));
        assert!(matches!(store.private_key("nope"), Err(KeyError::NotFound(_))));
    }

    #[test]
    fn loads_key_pem_document() {
        let store = KeyStore::new();
        assert_eq!(store.load_json("").unwrap(), 0);

        let doc = serde_json::json!({"key": KID, "pem": pem(&format!("{KID}.pem"))});
        assert_eq!(store.load_json(&doc.to_string()).unwrap(), 1);
        assert_pair_matches(&store, KID);
    }

    #[test]
    fn document_accepts_pkcs8_and_an_explicit_public_key() {
        use rsa::pkcs8::EncodePrivateKey;

        let private = RsaPrivateKey::from_pkcs1_pem(&pem(&format!("{NEXT_KID}.pem"))).unwrap();
        let pkcs8 = private.to_pkcs8_pem(LineEnding::LF).unwrap();

        let store = KeyStore::new();
        let doc = serde_json::json!({"key": NEXT_KID, "pem": pkcs8.as_str()});
        store.load_json(&doc.to_string()).unwrap();
        assert_pair_matches(&store, NEXT_KID);

        let doc = serde_json::json!({
            "kid": KID,
            "private_pem": pem(&format!("{KID}.pem")),
            "public_pem": pem(&format!("{KID}.pub.pem")),
        });
        assert_eq!(store.load_json(&doc.to_string()).unwrap(), 2);
        assert_eq!(store.public_key(KID).unwrap().as_pem(), pem(&format!("{KID}.pub.pem")));
    }

    #[test]
    fn malformed_document_is_rejected() {
        let err = KeyStore::new().load_json(r#"{"pem": "x"}"#).unwrap_err();
        assert!(matches!(err, KeyError::Document(_)));

        let err = KeyStore::new().load_json(r#"{"key": "k", "pem": "not a pem"}"#).unwrap_err();
        assert!(matches!(err, KeyError::InvalidKey { ref kid, .. } if kid == "k"));
    }

    #[test]
    fn rejects_garbage_pem_at_load_time() {
        let public = pem(&format!("{KID}.pub.pem"));
        let err = KeyPair::from_pem("bad", "not a pem", public).unwrap_err();
        assert!(matches!(err, KeyError::InvalidKey { ref kid, .. } if kid == "bad"));
    }

    #[test]
    fn active_kid_follows_rotation() {
        let store = store_with(&[KID, NEXT_KID]);
        assert!(store.active_kid().is_none());
        assert!(matches!(store.set_active("missing"), Err(KeyError::NotFound(_))));

        store.set_active(KID).unwrap();
        assert_eq!(store.active_kid().as_deref(), Some(KID));

        store.set_active(NEXT_KID).unwrap();
        assert!(store.remove(KID));
        assert_eq!(store.active_kid().as_deref(), Some(NEXT_KID));

        assert!(store.remove(NEXT_KID));
        assert!(store.active_kid().is_none());
        assert!(store.is_empty());
    }
}
