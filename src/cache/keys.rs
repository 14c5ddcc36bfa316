//! Cache key construction.

use std::fmt;

use axum::http::Method;
use sha2::{Digest, Sha256};
use url::Url;

/// Type tag of merged override files.
pub const MERGED_PREFIX: &str = "merged";

/// A request fingerprint prefixed with the payload type it stores.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key of a merged file served for `method` from the outbound URL `target`
    /// (destination plus path and query).
    pub fn merged(method: &Method, target: &Url, file_id: &str) -> Self {
        Self::fingerprint(MERGED_PREFIX, &[method.as_str(), target.as_str(), file_id])
    }

    fn fingerprint(prefix: &str, parts: &[&str]) -> Self {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        Self(format!("{prefix}:{}", hex::encode(hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merged_key_is_stable_and_distinct() {
        let target = Url::parse("https://upstream.example/cloudstorage/system/abc?x=1").unwrap();
        let a = CacheKey::merged(&Method::GET, &target, "abc");
        let b = CacheKey::merged(&Method::GET, &target, "abc");
        let c = CacheKey::merged(&Method::HEAD, &target, "abc");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.as_str().starts_with("merged:"));
        assert_eq!(a.as_str().len(), "merged:".len() + 64);

        let other_query = Url::parse("https://upstream.example/cloudstorage/system/abc?x=2").unwrap();
        assert_ne!(a, CacheKey::merged(&Method::GET, &other_query, "abc"));
    }
}
