//! K-sortable prefixed ID generation.
//!
//! IDs have the shape `<prefix>_<24 base36 chars>`: the first nine
//! characters encode the Unix millisecond timestamp (zero-padded, so
//! lexicographic order matches creation order within a single writer),
//! the remaining fifteen are random.

use std::sync::atomic::{AtomicU64, Ordering};

use num_bigint::BigUint;
use num_traits::Zero;
use sha2::{Digest, Sha256};

/// Base36 alphabet (0-9, a-z).
const BASE36_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Characters after the prefix and underscore.
const TAIL_LENGTH: usize = 24;

/// Leading characters of the tail that encode the millisecond timestamp.
/// Nine base36 digits hold timestamps until far past the year 5000.
const TIME_LENGTH: usize = 9;

/// Fallback entropy counter, only consulted when the OS RNG fails.
static FALLBACK_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Converts a byte slice to a base36 string of the specified length.
///
/// Pads with leading zeros and keeps the least significant digits when
/// the input encodes to more than `length` characters.
pub fn encode_base36(data: &[u8], length: usize) -> String {
    let mut num = BigUint::from_bytes_be(data);
    let base = BigUint::from(36u32);
    let zero = BigUint::zero();

    // Build the string in reverse.
    let mut chars: Vec<u8> = Vec::with_capacity(length);
    while num > zero {
        let rem = &num % &base;
        num /= &base;
        // rem is guaranteed to be < 36, so fits in a u8 index.
        let idx = rem.to_u32_digits();
        let i = if idx.is_empty() { 0 } else { idx[0] as usize };
        chars.push(BASE36_ALPHABET[i]);
    }

    chars.reverse();

    let mut s = String::from_utf8(chars).unwrap_or_default();

    if s.len() < length {
        let padding = "0".repeat(length - s.len());
        s = padding + &s;
    }
    if s.len() > length {
        s = s[s.len() - length..].to_owned();
    }

    s
}

/// Encodes an unsigned integer as zero-padded base36 of fixed width.
fn encode_base36_u64(mut n: u64, width: usize) -> String {
    let mut chars = vec![b'0'; width];
    let mut i = width;
    while n > 0 && i > 0 {
        i -= 1;
        chars[i] = BASE36_ALPHABET[(n % 36) as usize];
        n /= 36;
    }
    String::from_utf8(chars).unwrap_or_default()
}

/// Fills `buf` with random bytes, degrading to hashed time + counter
/// entropy when the OS RNG is unavailable.
fn random_bytes(buf: &mut [u8]) {
    if getrandom::getrandom(buf).is_ok() {
        return;
    }
    let seed = format!(
        "{}|{}",
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0),
        FALLBACK_COUNTER.fetch_add(1, Ordering::Relaxed)
    );
    let digest = Sha256::digest(seed.as_bytes());
    let n = buf.len().min(digest.len());
    buf[..n].copy_from_slice(&digest[..n]);
}

/// Generates a fresh id for the given entity prefix.
pub fn new_id(prefix: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
    let time_part = encode_base36_u64(millis, TIME_LENGTH);

    // 80 bits of entropy, truncated to the remaining 15 base36 chars.
    let mut entropy = [0u8; 10];
    random_bytes(&mut entropy);
    let random_part = encode_base36(&entropy, TAIL_LENGTH - TIME_LENGTH);

    format!("{prefix}_{time_part}{random_part}")
}

// One factory per entity prefix.

pub fn collection_id() -> String {
    new_id("col")
}

pub fn document_id() -> String {
    new_id("doc")
}

pub fn schema_id() -> String {
    new_id("sch")
}

pub fn schema_element_id() -> String {
    new_id("sel")
}

/// Id for a row in a dynamic index table.
pub fn index_value_id() -> String {
    new_id("val")
}

pub fn label_id() -> String {
    new_id("lbl")
}

pub fn tag_id() -> String {
    new_id("tag")
}

/// Id for an index-table mapping row.
pub fn index_mapping_id() -> String {
    new_id("itm")
}

pub fn field_constraint_id() -> String {
    new_id("fco")
}

pub fn indexed_field_id() -> String {
    new_id("ixf")
}

pub fn lock_id() -> String {
    new_id("lock")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_base36_basic() {
        // 0 bytes -> all zeros
        let result = encode_base36(&[], 4);
        assert_eq!(result, "0000");
    }

    #[test]
    fn encode_base36_length() {
        let data = [0xFF, 0xFF];
        let result = encode_base36(&data, 4);
        assert_eq!(result.len(), 4);
    }

    #[test]
    fn encode_base36_u64_padded() {
        assert_eq!(encode_base36_u64(0, 9), "000000000");
        assert_eq!(encode_base36_u64(35, 9), "00000000z");
        assert_eq!(encode_base36_u64(36, 9), "000000010");
    }

    #[test]
    fn id_format() {
        let id = document_id();
        assert!(id.starts_with("doc_"));
        assert_eq!(id.len(), "doc_".len() + 24);
        assert!(
            id["doc_".len()..]
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        );
    }

    #[test]
    fn ids_are_unique() {
        let a = collection_id();
        let b = collection_id();
        assert_ne!(a, b);
    }

    #[test]
    fn ids_sort_chronologically() {
        let earlier = new_id("doc");
        std::thread::sleep(std::time::Duration::from_millis(5));
        let later = new_id("doc");
        assert!(earlier < later);
    }

    #[test]
    fn all_prefixes() {
        for (id, prefix) in [
            (collection_id(), "col_"),
            (document_id(), "doc_"),
            (schema_id(), "sch_"),
            (schema_element_id(), "sel_"),
            (index_value_id(), "val_"),
            (label_id(), "lbl_"),
            (tag_id(), "tag_"),
            (index_mapping_id(), "itm_"),
            (field_constraint_id(), "fco_"),
            (indexed_field_id(), "ixf_"),
            (lock_id(), "lock_"),
        ] {
            assert!(id.starts_with(prefix), "{id} should start with {prefix}");
        }
    }
}
