use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use tokio::sync::OnceCell;

use crate::error::AppError;

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Password hashing error: {e}")))?;
    Ok(hash.to_string())
}

/// Recomputes the digest with the stored salt and parameters; the final
/// comparison is constant-time.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Invalid password hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub fn validate_password(password: &str, min_length: usize) -> Result<(), AppError> {
    if password.chars().count() < min_length {
        return Err(AppError::WeakPassword { min_length });
    }
    Ok(())
}

pub async fn hash_in_background(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(format!("Hashing task failed: {e}")))?
}

pub async fn verify_in_background(password: String, hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("Verification task failed: {e}")))?
}

/// Burns one verification's worth of work when there is no stored digest to
/// check against, so a missing account costs the same as a wrong password.
pub async fn verify_against_dummy(password: String) {
    static DUMMY_HASH: OnceCell<Option<String>> = OnceCell::const_new();

    let dummy = DUMMY_HASH
        .get_or_init(|| async {
            hash_in_background("apseline-dummy-password".to_string())
                .await
                .ok()
        })
        .await;
    let Some(dummy) = dummy.clone() else {
        return;
    };
    let _ = verify_in_background(password, dummy).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "current_thread")]
    async fn dummy_verification_runs_off_the_executor() {
        // A single-threaded runtime still answers while the digest is built.
        let ticker = tokio::spawn(async { tokio::task::yield_now().await });
        verify_against_dummy("whatever".to_string()).await;
        verify_against_dummy("again".to_string()).await;
        ticker.await.unwrap();
    }

    #[test]
    fn hash_verifies_only_its_own_password() {
        let hash = hash_password("hunter22").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("hunter22", &hash).unwrap());
        assert!(!verify_password("hunter23", &hash).unwrap());
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let a = hash_password("hunter22").unwrap();
        let b = hash_password("hunter22").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_digest_is_an_internal_error() {
        let err = verify_password("hunter22", "not-a-phc-string").unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[test]
    fn min_length_counts_characters() {
        assert!(validate_password("abcdef", 6).is_ok());
        assert!(validate_password("äöüäöü", 6).is_ok());
        assert!(matches!(
            validate_password("ab", 6),
            Err(AppError::WeakPassword { min_length: 6 })
        ));
    }
}
