//! Session identifier generation.

use uuid::Uuid;

/// Prefix shared by every generated session id.
pub const SESSION_ID_PREFIX: &str = "rsession-";

/// Generate a new session id.
///
/// The id is usable as a cache key and as a cookie value as-is: it only
/// contains ASCII letters, digits and `-`.
pub fn generate_id() -> String {
    format!("{}{}", SESSION_ID_PREFIX, Uuid::new_v4().simple())
}

/// Whether `id` can travel in a cookie and serve as a cache key.
///
/// Accepts non-empty printable ASCII without whitespace, `;`, `,`, `"` or
/// `\`. Every generated id passes.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_graphic() && !matches!(b, b';' | b',' | b'"' | b'\\'))
}
