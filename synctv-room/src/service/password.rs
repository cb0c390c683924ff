use argon2::{
    password_hash::{PasswordHash, PasswordVerifier},
    Argon2,
};
use tokio::task;

use crate::{Error, Result};

/// Hash a password with bcrypt at `cost`
///
/// Room and room-user passwords are checked on every join, so the cost comes
/// from `RoomConfig` rather than a fixed account-password profile. Runs on a
/// blocking thread.
pub async fn hash_password(password: &str, cost: u32) -> Result<String> {
    let password = password.to_string();

    task::spawn_blocking(move || {
        bcrypt::hash(password, cost)
            .map_err(|e| Error::Internal(format!("Failed to hash password: {e}")))
    })
    .await
    .map_err(|e| Error::Internal(format!("Password hashing task failed: {e}")))?
}

/// Verify a password against a stored hash
///
/// Accepts bcrypt (`$2a$`, `$2b$`, `$2x$`, `$2y$`) and argon2 PHC strings. A
/// mismatch is `Ok(false)`; only malformed hashes and task failures are
/// errors.
pub async fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let password = password.to_string();
    let hash = hash.to_string();

    task::spawn_blocking(move || {
        if hash.starts_with("$2") {
            bcrypt::verify(&password, &hash)
                .map_err(|e| Error::Internal(format!("Invalid bcrypt hash: {e}")))
        } else if hash.starts_with("$argon2") {
            verify_argon2(&password, &hash)
        } else {
            Err(Error::Internal("Unsupported password hash format".to_string()))
        }
    })
    .await
    .map_err(|e| Error::Internal(format!("Password verification task failed: {e}")))?
}

fn verify_argon2(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| Error::Internal(format!("Invalid password hash format: {e}")))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(Error::Internal(format!("Password verification failed: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::password_hash::{rand_core::OsRng, PasswordHasher, SaltString};

    const COST: u32 = 4;

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hash = hash_password("room-secret", COST).await.unwrap();

        assert!(hash.starts_with("$2b$04$"));
        assert!(verify_password("room-secret", &hash).await.unwrap());
        assert!(!verify_password("wrong", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_hash_uniqueness() {
        let hash1 = hash_password("same", COST).await.unwrap();
        let hash2 = hash_password("same", COST).await.unwrap();

        assert_ne!(hash1, hash2);
        assert!(verify_password("same", &hash2).await.unwrap());
    }

    #[tokio::test]
    async fn test_stored_2a_hash_verifies() {
        let stored = bcrypt::hash_with_result("legacy", COST)
            .unwrap()
            .format_for_version(bcrypt::Version::TwoA);
        assert!(stored.starts_with("$2a$"));

        assert!(verify_password("legacy", &stored).await.unwrap());
        assert!(!verify_password("other", &stored).await.unwrap());
    }

    #[tokio::test]
    async fn test_argon2_hash_verifies() {
        let salt = SaltString::generate(&mut OsRng);
        let stored = Argon2::default()
            .hash_password(b"core-secret", &salt)
            .unwrap()
            .to_string();

        assert!(verify_password("core-secret", &stored).await.unwrap());
        assert!(!verify_password("wrong", &stored).await.unwrap());
    }

    #[tokio::test]
    async fn test_malformed_hash_is_error() {
        assert!(matches!(
            verify_password("x", "not-a-hash").await,
            Err(Error::Internal(_))
        ));
        assert!(matches!(
            verify_password("x", "$2b$04$short").await,
            Err(Error::Internal(_))
        ));
    }
}
