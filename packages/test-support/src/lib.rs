//! Helpers for bootstrap tests: collision-free names and logging setup.
//!
//! Integration tests against a live server share it with other runs, so every
//! user and database they create is named through `unique_str` / `unique_db`.

pub mod logging;

use ulid::Ulid;

/// `{prefix}-{ulid}`
///
/// ```
/// use test_support::unique_str;
///
/// let a = unique_str("user");
/// let b = unique_str("user");
/// assert_ne!(a, b);
/// assert!(a.starts_with("user-"));
/// ```
pub fn unique_str(prefix: &str) -> String {
    format!("{}-{}", prefix, Ulid::new())
}

/// Database name safe for MongoDB: `{prefix}_{ulid}` in lowercase, no dashes,
/// well under the 64-byte limit.
pub fn unique_db(prefix: &str) -> String {
    format!("{}_{}", prefix, Ulid::new().to_string().to_lowercase())
}
