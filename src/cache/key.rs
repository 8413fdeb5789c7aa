//! Cache Key Module
//!
//! Normalizes composite cache keys to a single storage string and derives the
//! companion key under which the write timestamp is stored.

use std::fmt;

// == Public Constants ==
/// Suffix appended to a normalized key to address its timestamp slot.
pub const TIME_KEY_SUFFIX: &str = "_time";

/// Separator used when joining list keys.
pub const KEY_SEPARATOR: &str = "-";

// == Key Part ==
/// One element of a composite key.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyPart {
    Str(String),
    Int(i64),
    /// Formatted the way JavaScript's `String(number)` does: `2.0` is "2",
    /// `1e21` is "1e+21".
    Float(f64),
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Str(s) => f.write_str(s),
            KeyPart::Int(n) => write!(f, "{}", n),
            KeyPart::Float(n) => f.write_str(&format_number(*n)),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        // Covers -0 too
        return "0".to_string();
    }

    let abs = n.abs();
    if (1e-6..1e21).contains(&abs) {
        return format!("{}", n);
    }

    // Exponent form always carries a sign in JavaScript
    let exp = format!("{:e}", n);
    match exp.split_once('e') {
        Some((mantissa, power)) if !power.starts_with('-') => format!("{}e+{}", mantissa, power),
        _ => exp,
    }
}

impl From<&str> for KeyPart {
    fn from(s: &str) -> Self {
        KeyPart::Str(s.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(s: String) -> Self {
        KeyPart::Str(s)
    }
}

impl From<i64> for KeyPart {
    fn from(n: i64) -> Self {
        KeyPart::Int(n)
    }
}

impl From<i32> for KeyPart {
    fn from(n: i32) -> Self {
        KeyPart::Int(n as i64)
    }
}

impl From<u32> for KeyPart {
    fn from(n: u32) -> Self {
        KeyPart::Int(n as i64)
    }
}

impl From<f64> for KeyPart {
    fn from(n: f64) -> Self {
        KeyPart::Float(n)
    }
}

// == Cache Key ==
/// A caller-supplied cache key: a string, a number, or an ordered list of both.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheKey {
    Single(KeyPart),
    List(Vec<KeyPart>),
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&get_cache_key(self))
    }
}

impl From<KeyPart> for CacheKey {
    fn from(part: KeyPart) -> Self {
        CacheKey::Single(part)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        CacheKey::Single(s.into())
    }
}

impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        CacheKey::Single(s.into())
    }
}

impl From<&String> for CacheKey {
    fn from(s: &String) -> Self {
        CacheKey::Single(s.as_str().into())
    }
}

impl From<i64> for CacheKey {
    fn from(n: i64) -> Self {
        CacheKey::Single(n.into())
    }
}

impl From<i32> for CacheKey {
    fn from(n: i32) -> Self {
        CacheKey::Single(n.into())
    }
}

impl From<u32> for CacheKey {
    fn from(n: u32) -> Self {
        CacheKey::Single(n.into())
    }
}

impl From<f64> for CacheKey {
    fn from(n: f64) -> Self {
        CacheKey::Single(n.into())
    }
}

impl From<Vec<KeyPart>> for CacheKey {
    fn from(parts: Vec<KeyPart>) -> Self {
        CacheKey::List(parts)
    }
}

impl From<&[KeyPart]> for CacheKey {
    fn from(parts: &[KeyPart]) -> Self {
        CacheKey::List(parts.to_vec())
    }
}

/// Builds a list key from heterogeneous parts.
///
/// ```
/// use mini_swr::cache_key;
/// let key = cache_key!["user", 123, "profile"];
/// assert_eq!(key.to_string(), "user-123-profile");
/// ```
#[macro_export]
macro_rules! cache_key {
    ($($part:expr),* $(,)?) => {
        $crate::cache::CacheKey::List(vec![$($crate::cache::KeyPart::from($part)),*])
    };
}

// == Normalization ==
/// Normalizes a key to the string used for storage access.
pub fn get_cache_key(key: &CacheKey) -> String {
    match key {
        CacheKey::Single(part) => part.to_string(),
        CacheKey::List(parts) => parts
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(KEY_SEPARATOR),
    }
}

/// Derives the storage key holding the write timestamp of `key`.
pub fn create_time_cache_key(key: &str) -> String {
    format!("{}{}", key, TIME_KEY_SUFFIX)
}
