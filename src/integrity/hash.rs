//! SHA-256 content hashing
//!
//! Files are read in fixed-size chunks so memory use stays bounded
//! regardless of file size.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use super::errors::{IntegrityError, IntegrityResult};

/// Computes the SHA-256 digest of a byte slice as lowercase hex.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Computes the SHA-256 digest of a file as 64 lowercase hex characters.
///
/// # Errors
///
/// Returns `IntegrityError::Io` if the file cannot be opened or read.
pub fn calculate_hash(path: &Path) -> IntegrityResult<String> {
    let file = File::open(path).map_err(|e| IntegrityError::io(path, e))?;

    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .map_err(|e| IntegrityError::io(path, e))?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
