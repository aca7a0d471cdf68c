use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use uuid::Uuid;

use super::domain::CredentialHash;

/// Opaque credential-hashing capability used during user creation and login.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<CredentialHash, CredentialError>;
    fn verify(&self, password: &str, hash: &CredentialHash) -> Result<bool, CredentialError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("credential hashing failed: {0}")]
    Hashing(String),
    #[error("stored credential is malformed: {0}")]
    Malformed(String),
}

/// Argon2id with the crate's default cost parameters, encoded as a PHC string.
#[derive(Debug, Default, Clone, Copy)]
pub struct Argon2Hasher;

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<CredentialHash, CredentialError> {
        let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
            .map_err(|err| CredentialError::Hashing(err.to_string()))?;
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|err| CredentialError::Hashing(err.to_string()))?;
        Ok(CredentialHash::new(hash.to_string()))
    }

    fn verify(&self, password: &str, hash: &CredentialHash) -> Result<bool, CredentialError> {
        let parsed = PasswordHash::new(hash.as_str())
            .map_err(|err| CredentialError::Malformed(err.to_string()))?;
        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(err) => Err(CredentialError::Hashing(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_only_the_original_password() {
        let hasher = Argon2Hasher;
        let hash = hasher.hash("correct horse").expect("hash succeeds");

        assert!(hash.as_str().starts_with("$argon2"));
        assert!(hasher.verify("correct horse", &hash).expect("verify runs"));
        assert!(!hasher.verify("battery staple", &hash).expect("verify runs"));
    }

    #[test]
    fn salts_each_hash() {
        let hasher = Argon2Hasher;
        let first = hasher.hash("secret").expect("hash succeeds");
        let second = hasher.hash("secret").expect("hash succeeds");
        assert_ne!(first, second);
    }

    #[test]
    fn malformed_hashes_are_reported() {
        let hasher = Argon2Hasher;
        let result = hasher.verify("secret", &CredentialHash::new("not-a-phc-string"));
        assert!(matches!(result, Err(CredentialError::Malformed(_))));
    }
}
