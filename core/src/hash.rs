use sha1::{Digest, Sha1};

/// Bucket a token starts probing from: the leading 8 bytes of its SHA-1
/// digest, reduced modulo the table size.
pub fn primary_hash(token: &str, table_size: u64) -> u64 {
    let digest = Sha1::digest(token.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head) % table_size
}

/// Order-sensitive polynomial hash over the token's chars, last to first.
/// Stored next to the entry to tell apart tokens sharing a bucket chain.
pub fn secondary_hash(token: &str) -> i32 {
    token
        .chars()
        .rev()
        .fold(0i32, |h, c| h.wrapping_mul(31).wrapping_add(c as i32))
}
