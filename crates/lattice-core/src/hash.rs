//! Content and key hashing.
//!
//! SHA-256 fingerprints document bodies and schema shapes; MD5 maps
//! flattened keys to dynamic index-table names.

use sha2::{Digest, Sha256};

/// Prefix shared by every dynamic index table.
pub const INDEX_TABLE_PREFIX: &str = "index_";

/// Lowercase hex SHA-256 of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Derives the dynamic table name for a flattened key:
/// `index_` + lowercase hex MD5 of the key.
pub fn index_table_name(key: &str) -> String {
    format!("{INDEX_TABLE_PREFIX}{:x}", md5::compute(key.as_bytes()))
}

/// Returns `true` if `name` has the exact shape produced by
/// [`index_table_name`]. Dynamic table names are interpolated into DDL,
/// so anything else must be rejected before it reaches SQL.
pub fn is_index_table_name(name: &str) -> bool {
    name.strip_prefix(INDEX_TABLE_PREFIX)
        .map(|hex| hex.len() == 32 && hex.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()))
        .unwrap_or(false)
}
