//! Content digests for shadow files and saved models.

use std::fs::File;
use std::io;
use std::path::Path;

use blake3::Hasher;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub fn to_hex(&self) -> String {
        // blake3 hex(32b) is 64 hex chars
        let mut s = String::with_capacity(64);
        for b in &self.0 {
            use std::fmt::Write as _;
            let _ = write!(&mut s, "{:02x}", b);
        }
        s
    }
}

impl std::fmt::Display for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

pub fn hash_bytes(bytes: &[u8]) -> Hash256 {
    let mut h = Hasher::new();
    h.update(bytes);
    Hash256(h.finalize().into())
}

/// Stream a file through blake3; returns `(length, digest)`.
pub fn hash_file(path: &Path) -> Result<(u64, Hash256)> {
    let mut f = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut h = Hasher::new();
    let len = io::copy(&mut f, &mut h).map_err(|e| Error::io(path, e))?;
    Ok((len, Hash256(h.finalize().into())))
}
