/// Password storage
///
/// Passwords are stored as Argon2id PHC strings
/// (`$argon2id$v=19$m=..,t=..,p=..$salt$hash`). The cost parameters are part
/// of the string, so hashes made under older settings keep verifying after
/// `PASSWORD_MEMORY_KIB` and friends are raised.
///
/// Both operations are deliberately slow. Request handlers use the `_async`
/// variants, which move the work onto tokio's blocking pool.
///
/// ```
/// use taskdeck_shared::auth::password::{hash_password, verify_password, PasswordParams};
///
/// # fn example() -> Result<(), taskdeck_shared::auth::password::PasswordError> {
/// let hash = hash_password("hunter42", &PasswordParams::default())?;
/// assert!(verify_password("hunter42", &hash)?);
/// assert!(!verify_password("hunter43", &hash)?);
/// # Ok(())
/// # }
/// ```

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Could not hash password: {0}")]
    HashError(String),

    #[error("Could not verify password: {0}")]
    VerifyError(String),

    /// Stored value is not a PHC string
    #[error("Malformed password hash: {0}")]
    InvalidHash(String),

    #[error("Password worker failed: {0}")]
    Worker(String),
}

/// Argon2id cost settings used for new hashes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordParams {
    /// 64 MiB, 3 passes, 4 lanes
    fn default() -> Self {
        Self {
            memory_kib: 64 * 1024,
            iterations: 3,
            parallelism: 4,
        }
    }
}

impl PasswordParams {
    fn hasher(&self) -> Result<Argon2<'static>, PasswordError> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, Some(32))
            .map_err(|e| PasswordError::HashError(format!("bad cost settings: {e}")))?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Salts and hashes `password`, returning the PHC string to store
pub fn hash_password(password: &str, params: &PasswordParams) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    params
        .hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::HashError(e.to_string()))
}

/// `Ok(false)` on a mismatch; errors are reserved for unusable hashes
pub fn verify_password(password: &str, stored: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(stored).map_err(|e| PasswordError::InvalidHash(e.to_string()))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(e.to_string())),
    }
}

pub async fn hash_password_async(
    password: String,
    params: PasswordParams,
) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash_password(&password, &params))
        .await
        .map_err(|e| PasswordError::Worker(e.to_string()))?
}

pub async fn verify_password_async(password: String, stored: String) -> Result<bool, PasswordError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .map_err(|e| PasswordError::Worker(e.to_string()))?
}

/// Registration and password-change rule: six characters with a digit
///
/// ```
/// use taskdeck_shared::auth::password::validate_password_strength;
///
/// assert!(validate_password_strength("secret1").is_ok());
/// assert!(validate_password_strength("abc1").is_err());
/// assert!(validate_password_strength("no-digits").is_err());
/// ```
pub fn validate_password_strength(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        ));
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one number".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> PasswordParams {
        PasswordParams {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn test_default_cost_is_encoded() {
        let hash = hash_password("secret1", &PasswordParams::default()).unwrap();

        assert!(hash.starts_with("$argon2id$v=19$"));
        assert!(hash.contains("m=65536,t=3,p=4"));
    }

    #[test]
    fn test_each_hash_gets_its_own_salt() {
        let first = hash_password("secret1", &cheap()).unwrap();
        let second = hash_password("secret1", &cheap()).unwrap();

        assert_ne!(first, second);
        assert!(verify_password("secret1", &first).unwrap());
        assert!(verify_password("secret1", &second).unwrap());
    }

    #[test]
    fn test_mismatch_is_false_not_error() {
        let hash = hash_password("secret1", &cheap()).unwrap();

        assert!(!verify_password("secret2", &hash).unwrap());
        assert!(!verify_password("", &hash).unwrap());
    }

    #[test]
    fn test_hash_made_with_other_cost_still_verifies() {
        let hash = hash_password("secret1", &cheap()).unwrap();
        assert!(hash.contains("m=1024,t=1,p=1"));
        assert!(verify_password("secret1", &hash).unwrap());
    }

    #[test]
    fn test_unparseable_stored_hash() {
        assert!(matches!(
            verify_password("secret1", "plaintext"),
            Err(PasswordError::InvalidHash(_))
        ));
    }

    #[test]
    fn test_rejects_impossible_cost() {
        let params = PasswordParams {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        };
        assert!(matches!(
            hash_password("secret1", &params),
            Err(PasswordError::HashError(_))
        ));
    }

    #[test]
    fn test_non_ascii_passwords() {
        let password = "pässwörd-密码-9";
        let hash = hash_password(password, &cheap()).unwrap();
        assert!(verify_password(password, &hash).unwrap());
    }

    #[tokio::test]
    async fn test_blocking_pool_variants() {
        let hash = hash_password_async("secret1".to_string(), cheap())
            .await
            .unwrap();

        assert!(verify_password_async("secret1".to_string(), hash.clone())
            .await
            .unwrap());
        assert!(!verify_password_async("secret9".to_string(), hash)
            .await
            .unwrap());
    }

    #[test]
    fn test_strength_rules() {
        assert!(validate_password_strength("secret1").is_ok());
        assert!(validate_password_strength("123456").is_ok());

        assert_eq!(
            validate_password_strength("ab1").unwrap_err(),
            "Password must be at least 6 characters long"
        );
        assert_eq!(
            validate_password_strength("abcdefgh").unwrap_err(),
            "Password must contain at least one number"
        );
    }
}
