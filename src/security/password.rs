//! Password hash verification collaborator (§6.1).
//!
//! OPER passwords are stored as bcrypt hashes in the operator blocks of the
//! configuration (§6.4); this is the one piece of cryptographic verification
//! the core calls out to rather than implementing inline.

use async_trait::async_trait;

/// Takes `(hash, plaintext)` and returns whether they match (§6.1).
#[async_trait]
pub trait PasswordVerifier: Send + Sync {
    async fn verify(&self, hash: &str, plaintext: &str) -> bool;
}

/// Default verifier, backed by the `bcrypt` crate. Hashing is CPU-bound, so
/// verification runs on the blocking thread pool rather than the async
/// reactor.
pub struct BcryptVerifier;

#[async_trait]
impl PasswordVerifier for BcryptVerifier {
    async fn verify(&self, hash: &str, plaintext: &str) -> bool {
        let hash = hash.to_string();
        let plaintext = plaintext.to_string();
        tokio::task::spawn_blocking(move || bcrypt::verify(plaintext, &hash).unwrap_or(false))
            .await
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn verifies_matching_password() {
        let hash = bcrypt::hash("sekrit", bcrypt::DEFAULT_COST).unwrap();
        assert!(BcryptVerifier.verify(&hash, "sekrit").await);
        assert!(!BcryptVerifier.verify(&hash, "wrong").await);
    }
}
