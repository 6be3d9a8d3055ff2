//! Field-level encryption and searchable hashing.
//!
//! [`CryptoService`] holds one AES-256-GCM key derived from the configured
//! secret. It is constructed once by the composition root and cloned into
//! every component that needs it; clones share the same key.
//!
//! Ciphertext is `base64(nonce || ciphertext || tag)` with a fresh random
//! nonce per call, so two encryptions of the same plaintext differ. The
//! search hash is an unkeyed SHA-256 hex digest: deterministic, usable for
//! exact-match lookups, and guessable for low-entropy inputs such as a RUT
//! if the hash column leaks.

use std::fmt;
use std::sync::Arc;

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::NatalError;

const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encryption secret is empty")]
    EmptySecret,

    #[error("AES-GCM encrypt: {0}")]
    Encrypt(String),
}

impl From<CryptoError> for NatalError {
    fn from(err: CryptoError) -> Self {
        NatalError::Crypto(err.to_string())
    }
}

/// Symmetric encryption plus deterministic hashing for sensitive strings.
#[derive(Clone)]
pub struct CryptoService {
    cipher: Arc<Aes256Gcm>,
}

impl CryptoService {
    /// Derive the AES-256 key as SHA-256 of `secret`.
    pub fn from_secret(secret: &[u8]) -> Result<Self, CryptoError> {
        if secret.is_empty() {
            return Err(CryptoError::EmptySecret);
        }
        let mut key = Zeroizing::new([0u8; 32]);
        key.copy_from_slice(&Sha256::digest(secret));
        Ok(Self::from_key(&key))
    }

    pub fn from_key(key: &[u8; 32]) -> Self {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
        Self {
            cipher: Arc::new(cipher),
        }
    }

    /// Encrypt `plaintext`. Empty input yields `Ok(None)`: nothing is
    /// stored for a value that was never set.
    pub fn encrypt(&self, plaintext: &str) -> Result<Option<String>, CryptoError> {
        if plaintext.is_empty() {
            return Ok(None);
        }

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| CryptoError::Encrypt(e.to_string()))?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend_from_slice(&ciphertext);
        Ok(Some(STANDARD.encode(combined)))
    }

    /// Decrypt a value produced by [`encrypt`](Self::encrypt).
    ///
    /// Any failure (bad base64, truncated input, wrong key, tampered tag,
    /// non-UTF-8 output) yields `None`; one bad row must not break a list.
    pub fn decrypt(&self, encoded: &str) -> Option<String> {
        if encoded.is_empty() {
            return None;
        }

        let combined = match STANDARD.decode(encoded) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(error = %e, "ciphertext is not valid base64");
                return None;
            }
        };

        if combined.len() <= NONCE_LEN {
            debug!(len = combined.len(), "ciphertext too short");
            return None;
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let plaintext = match self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        {
            Ok(bytes) => bytes,
            Err(_) => {
                debug!("ciphertext failed authentication");
                return None;
            }
        };

        String::from_utf8(plaintext).ok()
    }

    /// Lowercase hex SHA-256 of `plaintext`, or `None` for empty input.
    pub fn hash(&self, plaintext: &str) -> Option<String> {
        search_hash(plaintext)
    }
}

impl fmt::Debug for CryptoService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoService").finish_non_exhaustive()
    }
}

fn search_hash(plaintext: &str) -> Option<String> {
    if plaintext.is_empty() {
        return None;
    }
    Some(hex::encode(Sha256::digest(plaintext.as_bytes())))
}

/// Storage pair for one sensitive attribute: `<field>_encrypted` and
/// `<field>_hash`.
///
/// [`seal`](Self::seal) is the only way to produce a populated value, so
/// the ciphertext and hash are always written together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedField {
    ciphertext: Option<String>,
    hash: Option<String>,
}

impl SealedField {
    /// A field that was never set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Encrypt and hash `plaintext` in one step. `None` or `""` clears
    /// both columns.
    pub fn seal(crypto: &CryptoService, plaintext: Option<&str>) -> Result<Self, CryptoError> {
        let Some(value) = plaintext.filter(|v| !v.is_empty()) else {
            return Ok(Self::empty());
        };
        Ok(Self {
            ciphertext: crypto.encrypt(value)?,
            hash: crypto.hash(value),
        })
    }

    /// Rebuild from persisted columns.
    pub fn from_stored(ciphertext: Option<String>, hash: Option<String>) -> Self {
        Self { ciphertext, hash }
    }

    /// Decrypted value, or `None` if never set or undecryptable.
    pub fn open(&self, crypto: &CryptoService) -> Option<String> {
        self.ciphertext.as_deref().and_then(|c| crypto.decrypt(c))
    }

    pub fn ciphertext(&self) -> Option<&str> {
        self.ciphertext.as_deref()
    }

    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    pub fn is_set(&self) -> bool {
        self.ciphertext.is_some()
    }

    /// Whether this field holds `plaintext`, compared by hash.
    pub fn matches(&self, plaintext: &str) -> bool {
        match (&self.hash, search_hash(plaintext)) {
            (Some(stored), Some(candidate)) => *stored == candidate,
            _ => false,
        }
    }

    pub fn into_parts(self) -> (Option<String>, Option<String>) {
        (self.ciphertext, self.hash)
    }
}

/// Hash a search term for an equality lookup against a `<field>_hash`
/// column. Exact match only; substring search would need every row
/// decrypted.
pub fn lookup_hash(crypto: &CryptoService, term: &str) -> Option<String> {
    crypto.hash(term)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn service() -> CryptoService {
        CryptoService::from_secret(b"unit-test-secret-0123456789").unwrap()
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let crypto = service();
        let encrypted = crypto.encrypt("12.345.678-9").unwrap().unwrap();
        assert_eq!(crypto.decrypt(&encrypted).as_deref(), Some("12.345.678-9"));
    }

    #[test]
    fn empty_plaintext_is_not_encrypted() {
        let crypto = service();
        assert_eq!(crypto.encrypt("").unwrap(), None);
        assert_eq!(crypto.hash(""), None);
    }

    #[test]
    fn ciphertext_differs_from_plaintext_and_between_calls() {
        let crypto = service();
        let a = crypto.encrypt("María José").unwrap().unwrap();
        let b = crypto.encrypt("María José").unwrap().unwrap();
        assert_ne!(a, "María José");
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_yields_none() {
        let encrypted = service().encrypt("secret").unwrap().unwrap();
        let other = CryptoService::from_secret(b"a-completely-different-secret").unwrap();
        assert_eq!(other.decrypt(&encrypted), None);
    }

    #[test]
    fn corrupted_ciphertext_yields_none() {
        let crypto = service();
        assert_eq!(crypto.decrypt("not base64 at all!"), None);
        assert_eq!(crypto.decrypt(&STANDARD.encode([1u8; 8])), None);

        let encrypted = crypto.encrypt("secret").unwrap().unwrap();
        let mut bytes = STANDARD.decode(&encrypted).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        assert_eq!(crypto.decrypt(&STANDARD.encode(bytes)), None);
    }

    #[test]
    fn hash_is_sha256_hex() {
        let crypto = service();
        let h = crypto.hash("abc").unwrap();
        assert_eq!(
            h,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn hash_does_not_depend_on_key() {
        let other = CryptoService::from_key(&[7u8; 32]);
        assert_eq!(service().hash("12.345.678-9"), other.hash("12.345.678-9"));
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert!(matches!(
            CryptoService::from_secret(b""),
            Err(CryptoError::EmptySecret)
        ));
    }

    #[test]
    fn sealed_field_writes_both_columns() {
        let crypto = service();
        let field = SealedField::seal(&crypto, Some("+56 9 1234 5678")).unwrap();
        assert!(field.is_set());
        assert_eq!(field.hash(), crypto.hash("+56 9 1234 5678").as_deref());
        assert_eq!(field.open(&crypto).as_deref(), Some("+56 9 1234 5678"));
        assert!(field.matches("+56 9 1234 5678"));
        assert!(!field.matches("+56 9 0000 0000"));
    }

    #[test]
    fn sealed_field_empty_input_clears_both() {
        let crypto = service();
        for input in [None, Some("")] {
            let field = SealedField::seal(&crypto, input).unwrap();
            assert_eq!(field, SealedField::empty());
            assert_eq!(field.open(&crypto), None);
        }
    }

    #[test]
    fn debug_does_not_expose_key() {
        let rendered = format!("{:?}", service());
        assert_eq!(rendered, "CryptoService { .. }");
    }

    proptest! {
        #[test]
        fn roundtrip_any_nonempty(s in ".{1,64}") {
            let crypto = service();
            let encrypted = crypto.encrypt(&s).unwrap().unwrap();
            prop_assert_ne!(&encrypted, &s);
            prop_assert_eq!(crypto.decrypt(&encrypted), Some(s));
        }

        #[test]
        fn hash_equal_iff_input_equal(a in ".{1,32}", b in ".{1,32}") {
            let crypto = service();
            prop_assert_eq!(crypto.hash(&a) == crypto.hash(&b), a == b);
        }
    }
}
