//! Content hashing for emitted assets and scoped class names.

use sha2::{Digest, Sha256};

/// Number of hex characters kept from the asset digest.
pub const DEFAULT_HASH_SIZE: usize = 8;

/// Full hex SHA-256 digest of `source`.
pub fn sha256_hex(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Content hash of compiled CSS. Depends on the bytes only, never on paths.
pub fn source_hash(source: &str) -> String {
    let mut digest = sha256_hex(source);
    digest.truncate(DEFAULT_HASH_SIZE);
    digest
}

/// djb2-xor hash over UTF-16 code units, walked back to front.
///
/// Matches the `string-hash` npm package so default scoped names line up
/// with what `postcss-modules` produces for the same input.
pub fn string_hash(input: &str) -> u32 {
    let units: Vec<u16> = input.encode_utf16().collect();
    units
        .iter()
        .rev()
        .fold(5381u32, |hash, &unit| hash.wrapping_mul(33) ^ unit as u32)
}

/// Lowercase base-36 rendering, as `Number.prototype.toString(36)` does.
pub fn to_base36(mut value: u32) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
