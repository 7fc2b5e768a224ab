//! crates/readwithme_core/src/cache_key.rs
//!
//! Stable cache identifiers for anonymous queries.
//!
//! The key is a 32-bit rolling hash (`h = h * 31 + unit`, wrapping) over the
//! UTF-16 code units of `"{query_type}:{query_value}"` lower-cased, rendered in
//! base 36 with a `cache_` prefix. It depends on nothing but its input, so keys
//! survive restarts and match those computed by earlier clients. Distinct
//! queries can collide; a collision serves the wrong cached answer and is an
//! accepted risk for recommendation text.

use crate::domain::QueryType;

const KEY_PREFIX: &str = "cache_";

/// Derives the cache key for a query. Case-insensitive on `query_value`.
pub fn derive_key(query_type: QueryType, query_value: &str) -> String {
    let normalized = format!("{}:{}", query_type.as_str(), query_value).to_lowercase();

    let hash = normalized.encode_utf16().fold(0i32, |hash, unit| {
        (hash << 5).wrapping_sub(hash).wrapping_add(i32::from(unit))
    });

    format!("{}{}", KEY_PREFIX, to_base36(i64::from(hash).unsigned_abs()))
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
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
