//! Content digests used to decide whether a file changed

use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncReadExt;

use crate::error::{Result, SyncError};

/// Hash algorithms supported for content comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// SHA-256 hash
    #[default]
    Sha256,
    /// Blake3 hash (faster)
    Blake3,
}

/// Computes hex digests of byte content
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentHasher {
    algorithm: HashAlgorithm,
}

impl ContentHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Digest an in-memory buffer
    pub fn digest(&self, content: &[u8]) -> String {
        match self.algorithm {
            HashAlgorithm::Sha256 => format!("{:x}", Sha256::digest(content)),
            HashAlgorithm::Blake3 => blake3::hash(content).to_hex().to_string(),
        }
    }

    /// Digest a file, or `None` when it does not exist
    pub async fn digest_file(&self, path: &Path) -> Result<Option<String>> {
        let mut file = match fs::File::open(path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SyncError::hash_error(path, format!("Failed to open file: {}", e)));
            }
        };

        let mut buffer = vec![0; 8192];
        let mut sha = Sha256::new();
        let mut blake = blake3::Hasher::new();

        loop {
            let bytes_read = file.read(&mut buffer).await.map_err(|e| {
                SyncError::hash_error(path, format!("Failed to read file: {}", e))
            })?;

            if bytes_read == 0 {
                break;
            }

            match self.algorithm {
                HashAlgorithm::Sha256 => sha.update(&buffer[..bytes_read]),
                HashAlgorithm::Blake3 => {
                    blake.update(&buffer[..bytes_read]);
                }
            }
        }

        Ok(Some(match self.algorithm {
            HashAlgorithm::Sha256 => format!("{:x}", sha.finalize()),
            HashAlgorithm::Blake3 => blake.finalize().to_hex().to_string(),
        }))
    }
}
