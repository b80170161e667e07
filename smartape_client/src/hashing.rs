//! Certification document hashing

use crate::error::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Algorithm name stored alongside the digest
pub const HASH_ALGORITHM: &str = "SHA-256";

/// What bytes of the document are digested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashMode {
    /// Decode as UTF-8 (lossy, leading BOM dropped) and hash the re-encoded
    /// text. Certificates already on the ledger were hashed this way.
    #[default]
    Text,
    /// Hash the raw file bytes
    Binary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentHash {
    /// Lowercase hex digest
    pub hex: String,
    pub algorithm: String,
}

pub fn hash_document_bytes(bytes: &[u8], mode: HashMode) -> DocumentHash {
    let digest = match mode {
        HashMode::Binary => Sha256::digest(bytes),
        HashMode::Text => {
            let text = String::from_utf8_lossy(bytes);
            let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
            Sha256::digest(text.as_bytes())
        }
    };
    DocumentHash {
        hex: hex::encode(digest),
        algorithm: HASH_ALGORITHM.to_string(),
    }
}

pub async fn hash_document_file(path: &Path, mode: HashMode) -> Result<DocumentHash> {
    let bytes = tokio::fs::read(path).await?;
    log::debug!("hashing {} ({} bytes, {:?} mode)", path.display(), bytes.len(), mode);
    Ok(hash_document_bytes(&bytes, mode))
}
