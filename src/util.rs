//! Shared helpers for request handling.

use axum::http::HeaderMap;
use subtle::ConstantTimeEq;

/// Number of leading key characters safe to log.
const KEY_PREFIX_LEN: usize = 8;

/// Extract a Bearer token from the Authorization header.
///
/// Returns the token string without the "Bearer " prefix, or None if
/// the header is missing, malformed, or empty after the prefix.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

/// Constant-time membership check of `token` in `keys`.
pub fn key_matches(keys: &[String], token: &str) -> bool {
    let provided = token.as_bytes();
    keys.iter().fold(false, |found, key| {
        let key = key.as_bytes();
        let eq = key.len() == provided.len() && bool::from(key.ct_eq(provided));
        found | eq
    })
}

/// Loggable prefix of an API key.
pub fn key_prefix(token: &str) -> String {
    token.chars().take(KEY_PREFIX_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert("Authorization", HeaderValue::from_static("Bearer  tk_live_1 "));
        assert_eq!(extract_bearer_token(&headers), Some("tk_live_1"));

        headers.insert("Authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert("Authorization", HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[test]
    fn test_key_matches() {
        let keys = vec!["alpha".to_string(), "bravo".to_string()];
        assert!(key_matches(&keys, "bravo"));
        assert!(!key_matches(&keys, "brav"));
        assert!(!key_matches(&keys, "charlie"));
        assert!(!key_matches(&[], "alpha"));
    }

    #[test]
    fn test_key_prefix() {
        assert_eq!(key_prefix("tk_live_abcdef"), "tk_live_");
        assert_eq!(key_prefix("abc"), "abc");
    }
}
