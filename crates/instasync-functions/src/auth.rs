//! Bearer-token check for the callable sync entry point.

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;

use instasync_core::SyncError;

/// Token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Accept the request only when it carries `expected`. With no token
/// configured every caller is rejected.
pub fn authorize(expected: Option<&str>, headers: &HeaderMap) -> Result<(), SyncError> {
    let Some(expected) = expected else {
        return Err(SyncError::Unauthenticated("callable sync is not configured".into()));
    };
    match bearer_token(headers) {
        Some(token) if constant_time_eq(token.as_bytes(), expected.as_bytes()) => Ok(()),
        Some(_) => Err(SyncError::Unauthenticated("invalid token".into())),
        None => Err(SyncError::Unauthenticated("missing bearer token".into())),
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(auth: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_str(auth).unwrap());
        h
    }

    #[test]
    fn accepts_matching_token() {
        assert!(authorize(Some("s3cret"), &headers("Bearer s3cret")).is_ok());
    }

    #[test]
    fn rejects_wrong_missing_or_unconfigured() {
        assert!(authorize(Some("s3cret"), &headers("Bearer nope")).is_err());
        assert!(authorize(Some("s3cret"), &headers("Basic s3cret")).is_err());
        assert!(authorize(Some("s3cret"), &HeaderMap::new()).is_err());
        assert!(authorize(None, &headers("Bearer s3cret")).is_err());
    }
}
