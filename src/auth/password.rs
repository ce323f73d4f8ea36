use crate::errors::Result;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

/// One-way password hashing. Digests are opaque to the account service; the
/// plaintext never leaves this boundary.
pub trait Hasher: Send + Sync {
    fn hash(&self, plain: &str) -> Result<String>;
    fn verify(&self, plain: &str, digest: &str) -> Result<bool>;
}

/// Argon2id hasher producing PHC-format digest strings.
#[derive(Debug, Clone, Default)]
pub struct Argon2Hasher;

impl Hasher for Argon2Hasher {
    fn hash(&self, plain: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                anyhow::anyhow!(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    fn verify(&self, plain: &str, digest: &str) -> Result<bool> {
        let parsed = PasswordHash::new(digest).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            anyhow::anyhow!(e.to_string())
        })?;
        Ok(Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let hasher = Argon2Hasher;
        let password = "Secur3P@ssw0rd!";
        let hash = hasher.hash(password).expect("hashing should succeed");
        assert!(hasher.verify(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hasher = Argon2Hasher;
        let password = "correct-horse-battery-staple";
        let hash = hasher.hash(password).expect("hashing should succeed");
        assert!(!hasher
            .verify("wrong-password", &hash)
            .expect("verify should not error"));
    }

    #[test]
    fn verify_errors_on_malformed_digest() {
        let err = Argon2Hasher
            .verify("anything", "not-a-valid-hash")
            .unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn same_password_hashes_differently() {
        let hasher = Argon2Hasher;
        let a = hasher.hash("password").expect("hash a");
        let b = hasher.hash("password").expect("hash b");
        assert_ne!(a, b);
    }
}
