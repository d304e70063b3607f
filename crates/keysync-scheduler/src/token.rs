//! Token generation and persistence.

use std::path::Path;

use rand::Rng;
use sha2::{Digest, Sha256};

use crate::SchedulerError;

/// Default seed prefix for [`HashTokenSource`].
pub const DEFAULT_SEED_PREFIX: &str = "keysync";

/// Upper bound (inclusive) of the random number mixed into each token.
const MAX_SEED_NUMBER: u32 = 1_000_000;

/// Produces the token written at the start of each iteration.
pub trait TokenSource: Send + Sync {
    fn generate(&self) -> String;
}

/// Hex-encoded SHA-256 of a prefix followed by a random number.
#[derive(Debug, Clone)]
pub struct HashTokenSource {
    prefix: String,
}

impl Default for HashTokenSource {
    fn default() -> Self {
        Self::new(DEFAULT_SEED_PREFIX)
    }
}

impl HashTokenSource {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Token for a given seed number. Deterministic.
    pub fn token_for(&self, n: u32) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.prefix.as_bytes());
        hasher.update(n.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl TokenSource for HashTokenSource {
    fn generate(&self) -> String {
        let n = rand::thread_rng().gen_range(0..=MAX_SEED_NUMBER);
        self.token_for(n)
    }
}

/// Overwrite `path` with exactly `token`.
pub async fn write_token(path: &Path, token: &str) -> Result<(), SchedulerError> {
    tokio::fs::write(path, token)
        .await
        .map_err(|source| SchedulerError::TokenWrite {
            path: path.display().to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_lowercase_hex_sha256() {
        let token = HashTokenSource::default().generate();
        assert_eq!(token.len(), 64);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
        );
    }

    #[test]
    fn test_token_for_is_deterministic() {
        let source = HashTokenSource::new("seed");
        assert_eq!(source.token_for(7), source.token_for(7));
        assert_ne!(source.token_for(7), source.token_for(8));
        assert_ne!(source.token_for(7), HashTokenSource::new("other").token_for(7));
    }

    #[test]
    fn test_token_for_known_digest() {
        // sha256("123")
        assert_eq!(
            HashTokenSource::new("").token_for(123),
            "a665a45920422f9d417e4867efdc4fb8a04a1f3fff1fa07e998e86f7f7a27ae3"
        );
    }

    #[tokio::test]
    async fn test_write_token_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key.txt");

        write_token(&path, "first-token-that-is-longer").await.unwrap();
        write_token(&path, "second").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
    }

    #[tokio::test]
    async fn test_write_token_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("key.txt");

        let err = write_token(&path, "token").await.unwrap_err();
        assert!(matches!(err, SchedulerError::TokenWrite { .. }));
    }
}
