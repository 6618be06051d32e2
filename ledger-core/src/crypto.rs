//! Digest function and canonical preimage encoding
//!
//! This module provides:
//! - SHA-256 hashing rendered as lowercase hex
//! - A canonical, ordered field encoding used for every hashed record
//! - The leading-zero difficulty predicate used by proof of work

use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

/// Length of a rendered digest (2 hex chars per SHA-256 byte)
pub const DIGEST_HEX_LEN: usize = 64;

/// Hash arbitrary bytes using SHA-256 and render as lowercase hex
pub fn hash_hex(data: &[u8]) -> String {
    hex::encode(hash_bytes(data))
}

/// Hash arbitrary bytes using SHA-256
pub fn hash_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Check that the first `difficulty` characters of a hex digest are `'0'`
///
/// A difficulty of zero always holds. A difficulty longer than the digest
/// never does.
pub fn meets_difficulty(digest: &str, difficulty: u32) -> bool {
    let difficulty = difficulty as usize;
    digest.len() >= difficulty && digest.bytes().take(difficulty).all(|b| b == b'0')
}

/// First `len` characters of a digest, for log lines and summaries
pub fn short(digest: &str, len: usize) -> &str {
    match digest.char_indices().nth(len) {
        Some((end, _)) => &digest[..end],
        None => digest,
    }
}

/// Canonical preimage builder
///
/// Fields are written in call order with a fixed encoding: integers are
/// big-endian, strings are length-prefixed UTF-8, optional strings carry a
/// presence marker and decimals are written as their normalized string form.
#[derive(Debug, Clone, Default)]
pub struct Preimage {
    buffer: Vec<u8>,
}

impl Preimage {
    /// Create an empty preimage
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Write u64 (big-endian)
    pub fn write_u64(&mut self, n: u64) -> &mut Self {
        self.buffer.extend_from_slice(&n.to_be_bytes());
        self
    }

    /// Write string (length-prefixed)
    pub fn write_str(&mut self, s: &str) -> &mut Self {
        self.write_u64(s.len() as u64);
        self.buffer.extend_from_slice(s.as_bytes());
        self
    }

    /// Write optional string
    pub fn write_optional_str(&mut self, opt: Option<&str>) -> &mut Self {
        match opt {
            Some(s) => {
                self.buffer.push(1);
                self.write_str(s)
            }
            None => {
                self.buffer.push(0);
                self
            }
        }
    }

    /// Write decimal
    ///
    /// Trailing zeros are stripped so `10` and `10.00` encode identically.
    pub fn write_decimal(&mut self, d: &Decimal) -> &mut Self {
        self.write_str(&d.normalize().to_string())
    }

    /// Encoded bytes so far
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Finalize and return bytes
    pub fn finalize(self) -> Vec<u8> {
        self.buffer
    }

    /// Hex digest of the encoded bytes
    pub fn digest(&self) -> String {
        hash_hex(&self.buffer)
    }
}
