use std::fmt;

use sha2::{Digest, Sha256};

/// Bytes of the SHA-256 digest kept in a fingerprint.
const CONTENT_HASH_LEN: usize = 8;

/// Content-derived key for a (text, source language, target language) triple.
///
/// Text is trimmed before hashing, so segments differing only in surrounding
/// whitespace share a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    content_hash: [u8; CONTENT_HASH_LEN],
    source_lang: String,
    target_lang: String,
}

impl Fingerprint {
    pub fn new(text: &str, source_lang: &str, target_lang: &str) -> Self {
        let digest = Sha256::digest(text.trim().as_bytes());
        let mut content_hash = [0u8; CONTENT_HASH_LEN];
        content_hash.copy_from_slice(&digest[..CONTENT_HASH_LEN]);

        Self {
            content_hash,
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
        }
    }

    pub fn content_hash(&self) -> &[u8] {
        &self.content_hash
    }

    pub fn source_lang(&self) -> &str {
        &self.source_lang
    }

    pub fn target_lang(&self) -> &str {
        &self.target_lang
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.content_hash {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, "[{}->{}]", self.source_lang, self.target_lang)
    }
}
