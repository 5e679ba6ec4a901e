//! Merkle paths.
//!
//! A path is `[store_key, escaped(key)]`. Keys are percent-escaped the way a
//! URL path segment is, so arbitrary bytes survive the round trip through a
//! string path.

use crate::{ProofError, Result};

/// Percent-escape `bytes` as a URL path segment.
pub fn path_escape(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        if is_unescaped(b) {
            out.push(char::from(b));
        } else {
            out.push('%');
            out.push_str(&format!("{b:02X}"));
        }
    }
    out
}

fn is_unescaped(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(b, b'-' | b'_' | b'.' | b'~' | b'$' | b'&' | b'+' | b':' | b'=' | b'@')
}

/// Reverse [`path_escape`].
///
/// # Errors
///
/// Returns [`ProofError::ProofConversion`] for a malformed escape.
pub fn path_unescape(segment: &str) -> Result<Vec<u8>> {
    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .and_then(|h| std::str::from_utf8(h).ok())
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| ProofError::ProofConversion(format!("invalid escape in path segment {segment:?}")))?;
            out.push(hex);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Ok(out)
}

/// Ordered path segments, outermost store first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerklePath {
    segments: Vec<String>,
}

impl MerklePath {
    /// Path to `key` inside the module store `store_key`.
    pub fn new(store_key: &str, key: &[u8]) -> Self {
        Self {
            segments: vec![store_key.to_string(), path_escape(key)],
        }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Raw bytes of segment `i`.
    ///
    /// # Errors
    ///
    /// Returns [`ProofError::ProofConversion`] if `i` is out of range or the
    /// segment is malformed.
    pub fn key(&self, i: usize) -> Result<Vec<u8>> {
        let segment = self
            .segments
            .get(i)
            .ok_or_else(|| ProofError::ProofConversion(format!("path has no segment {i}")))?;
        path_unescape(segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_reserved() {
        assert_eq!(path_escape(b"gamm/pool/1"), "gamm%2Fpool%2F1");
        assert_eq!(path_escape(b"a:b=c@d$e&f+g"), "a:b=c@d$e&f+g");
        assert_eq!(path_escape(&[0x02, 0xff, b' ']), "%02%FF%20");
        assert_eq!(path_escape(b"x;y,z?"), "x%3By%2Cz%3F");
    }

    #[test]
    fn test_escape_round_trips_binary_keys() {
        let key: Vec<u8> = (0u8..=255).collect();
        assert_eq!(path_unescape(&path_escape(&key)).expect("unescape"), key);
    }

    #[test]
    fn test_unescape_rejects_truncated() {
        assert!(path_unescape("abc%4").is_err());
        assert!(path_unescape("%zz").is_err());
    }

    #[test]
    fn test_path_keys() {
        let path = MerklePath::new("bank", &[0x02, 0x14]);
        assert_eq!(path.len(), 2);
        assert_eq!(path.key(0).expect("store"), b"bank".to_vec());
        assert_eq!(path.key(1).expect("key"), vec![0x02, 0x14]);
        assert!(path.key(2).is_err());
    }
}
