/// Authentication and authorization utilities
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and strength rules
/// - [`jwt`]: access/refresh token generation and validation
/// - [`session`]: the credential and session manager built on the two above
/// - [`principal`]: the authenticated caller handed to handlers
/// - [`authorization`]: role gates and task ownership checks
///
/// # Security Features
///
/// - **Password Hashing**: Argon2id with 64 MB memory, 3 iterations, on the blocking pool
/// - **JWT Tokens**: HS256, separate secrets for access and refresh tokens
/// - **Refresh Tokens**: single use, stored only as a SHA-256 digest
///
/// # Example
///
/// ```no_run
/// use taskdeck_shared::auth::password::{hash_password, verify_password, PasswordParams};
/// use taskdeck_shared::auth::jwt::TokenConfig;
/// use taskdeck_shared::models::user::Role;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("user_password1", &PasswordParams::default())?;
/// assert!(verify_password("user_password1", &hash)?);
///
/// let tokens = TokenConfig::new(
///     "access-secret-key-at-least-32-bytes-long",
///     "refresh-secret-key-at-least-32-bytes-long",
/// );
/// let pair = tokens.issue_pair(Uuid::new_v4(), Role::User)?;
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod password;
pub mod principal;
pub mod session;
