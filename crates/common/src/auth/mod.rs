//! Access-token authentication
//!
//! The gateway protects /api routes with a single opaque access token,
//! presented either as `Authorization: Bearer <token>` or in a dedicated
//! header. Comparison goes through SHA-256 digests so token bytes never
//! feed a variable-time string compare directly.

use axum::http::HeaderMap;
use sha2::{Digest, Sha256};

/// Hex SHA-256 digest of a token
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Check a presented token against the configured one
pub fn validate_token(expected: &str, provided: &str) -> bool {
    hash_token(expected) == hash_token(provided)
}

/// Pull the access token out of the request headers.
///
/// `Authorization: Bearer` wins over the dedicated header when both are
/// present.
pub fn extract_token(headers: &HeaderMap, token_header: &str) -> Option<String> {
    if let Some(value) = headers.get("authorization") {
        if let Ok(value) = value.to_str() {
            if let Some(token) = value.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }

    headers
        .get(token_header)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_validate_token() {
        assert!(validate_token("secret-token", "secret-token"));
        assert!(!validate_token("secret-token", "wrong"));
        assert!(!validate_token("secret-token", ""));
    }

    #[test]
    fn test_extract_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc123"));
        assert_eq!(
            extract_token(&headers, "X-Access-Token"),
            Some("abc123".to_string())
        );
    }

    #[test]
    fn test_extract_custom_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-access-token", HeaderValue::from_static("abc123"));
        assert_eq!(
            extract_token(&headers, "x-access-token"),
            Some("abc123".to_string())
        );
    }

    #[test]
    fn test_bearer_takes_precedence() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer from-auth"));
        headers.insert("x-access-token", HeaderValue::from_static("from-header"));
        assert_eq!(
            extract_token(&headers, "x-access-token"),
            Some("from-auth".to_string())
        );
    }

    #[test]
    fn test_missing_token() {
        let headers = HeaderMap::new();
        assert_eq!(extract_token(&headers, "X-Access-Token"), None);
    }
}
