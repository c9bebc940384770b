/// Credential and session manager
///
/// Owns the whole token lifecycle: registration, login, access token
/// verification, refresh token rotation, logout, the per-request guard, and
/// password changes.
///
/// # Session model
///
/// ```text
/// NoSession --register/login--> Active --refresh--> Active
///                                  |
///                                  +--logout / change password--> NoSession
/// ```
///
/// Each user has at most one live refresh token. Only its SHA-256 digest is
/// stored. Refreshing swaps the digest with a compare-and-swap, so a refresh
/// token can be used exactly once; replaying it (or racing a second request
/// with it) fails with [`AuthError::RefreshRejected`].
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskdeck_shared::auth::jwt::TokenConfig;
/// use taskdeck_shared::auth::password::PasswordParams;
/// use taskdeck_shared::auth::session::{Registration, SessionManager};
/// use taskdeck_shared::store::memory::MemoryStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let sessions = SessionManager::new(
///     Arc::new(MemoryStore::new()),
///     TokenConfig::new(
///         "access-secret-key-at-least-32-bytes-long",
///         "refresh-secret-key-at-least-32-bytes-long",
///     ),
///     PasswordParams::default(),
/// );
///
/// let session = sessions
///     .register(Registration {
///         name: "Ada".to_string(),
///         email: "ada@example.com".to_string(),
///         password: "secret1".to_string(),
///         role: None,
///     })
///     .await?;
///
/// let pair = sessions.refresh(&session.refresh_token).await?;
/// assert_ne!(pair.refresh_token, session.refresh_token);
/// # Ok(())
/// # }
/// ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::jwt::{Claims, JwtError, TokenConfig, TokenPair};
use super::password::{hash_password_async, verify_password_async, PasswordError, PasswordParams};
use super::principal::Principal;
use crate::models::user::{normalize_email, NewUser, Role, User, UserChanges, UserProfile};
use crate::store::{DynStore, StoreError};

/// Error type for session operations
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Unknown email or wrong password
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Correct password on a deactivated account
    #[error("Account has been deactivated. Please contact support.")]
    AccountDeactivated,

    /// Registration or profile update with an email already in use
    #[error("Email is already registered")]
    EmailTaken,

    /// No bearer token on a protected request
    #[error("Access denied. No token provided. Please log in.")]
    MissingToken,

    /// Access token signature was valid but `exp` has passed
    #[error("Session expired. Please refresh your token.")]
    TokenExpired,

    /// Access token could not be verified
    #[error("Invalid token. Please log in again.")]
    InvalidToken,

    /// Token verified but the session behind it is gone
    ///
    /// Covers deleted or deactivated users and tokens issued before the last
    /// password change.
    #[error("Session is no longer valid. Please log in again.")]
    SessionInvalid,

    /// Refresh token failed verification or was already used
    #[error("Invalid or expired refresh token")]
    RefreshRejected,

    /// Current password did not match on a password change
    #[error("Current password is incorrect")]
    WrongPassword,

    #[error("User not found")]
    UserNotFound,

    #[error(transparent)]
    Password(#[from] PasswordError),

    /// Signing a new token failed
    #[error("Failed to issue token: {0}")]
    TokenIssue(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { ref field, .. } if field == "email" => AuthError::EmailTaken,
            other => AuthError::Store(other),
        }
    }
}

/// Input for [`SessionManager::register`]
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,

    /// Self-selected and unrestricted, `admin` included; defaults to `user`
    pub role: Option<Role>,
}

/// Result of a successful register, login or password change
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub user: UserProfile,
    pub access_token: String,
    pub refresh_token: String,
}

/// SHA-256 hex digest of a refresh token, as stored
pub fn fingerprint(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// Extracts the token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let value = header?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Credential and session manager
#[derive(Clone)]
pub struct SessionManager {
    store: DynStore,
    tokens: TokenConfig,
    password_params: PasswordParams,
}

impl SessionManager {
    pub fn new(store: DynStore, tokens: TokenConfig, password_params: PasswordParams) -> Self {
        Self {
            store,
            tokens,
            password_params,
        }
    }

    pub fn tokens(&self) -> &TokenConfig {
        &self.tokens
    }

    /// Signs a pair that postdates the user's last password change
    fn issue(&self, user: &User) -> Result<TokenPair, AuthError> {
        let pair = match user.password_changed_at {
            Some(changed_at) => self.tokens.issue_pair_after(user.id, user.role, changed_at),
            None => self.tokens.issue_pair(user.id, user.role),
        };
        pair.map_err(|e| AuthError::TokenIssue(e.to_string()))
    }

    /// Creates an account and opens its first session
    ///
    /// # Errors
    ///
    /// - `EmailTaken` if any user, active or not, already has the email
    pub async fn register(&self, registration: Registration) -> Result<AuthSession, AuthError> {
        let email = normalize_email(&registration.email);

        if self.store.find_user_by_email(&email, true).await?.is_some() {
            debug!(email = %email, "Registration rejected: email taken");
            return Err(AuthError::EmailTaken);
        }

        let password_hash =
            hash_password_async(registration.password, self.password_params).await?;

        // A concurrent registration can still win the race; the unique index
        // turns that into EmailTaken via From<StoreError>.
        let user = self
            .store
            .create_user(NewUser {
                name: registration.name.trim().to_string(),
                email,
                password_hash,
                role: registration.role.unwrap_or_default(),
            })
            .await?;

        let pair = self.issue(&user)?;
        let user = self
            .store
            .record_login(user.id, &fingerprint(&pair.refresh_token))
            .await?
            .ok_or(AuthError::UserNotFound)?;

        info!(user_id = %user.id, role = %user.role, "User registered");

        Ok(AuthSession {
            user: user.profile(),
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        })
    }

    /// Verifies credentials and opens a new session
    ///
    /// Any previous refresh token stops working.
    ///
    /// # Errors
    ///
    /// - `InvalidCredentials` for an unknown email or a wrong password
    /// - `AccountDeactivated` for a correct password on a deactivated account
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let email = normalize_email(email);

        let Some(user) = self.store.find_user_by_email(&email, true).await? else {
            debug!(reason = "unknown_email", "Login failed");
            return Err(AuthError::InvalidCredentials);
        };

        let matches =
            verify_password_async(password.to_string(), user.password_hash.clone()).await?;
        if !matches {
            debug!(user_id = %user.id, reason = "wrong_password", "Login failed");
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active {
            warn!(user_id = %user.id, reason = "deactivated", "Login failed");
            return Err(AuthError::AccountDeactivated);
        }

        let pair = self.issue(&user)?;
        let user = self
            .store
            .record_login(user.id, &fingerprint(&pair.refresh_token))
            .await?
            .ok_or(AuthError::UserNotFound)?;

        info!(user_id = %user.id, "User logged in");

        Ok(AuthSession {
            user: user.profile(),
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        })
    }

    /// Verifies an access token's signature, type and expiry
    pub fn verify_access(&self, token: &str) -> Result<Claims, AuthError> {
        self.tokens.verify_access(token).map_err(|e| match e {
            JwtError::Expired => {
                debug!(reason = "expired", "Access token rejected");
                AuthError::TokenExpired
            }
            other => {
                debug!(reason = "invalid_signature", error = %other, "Access token rejected");
                AuthError::InvalidToken
            }
        })
    }

    /// Exchanges a refresh token for a new pair
    ///
    /// The presented token is consumed. Every failure maps to
    /// `RefreshRejected`; the precise reason is only logged.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = match self.tokens.verify_refresh(refresh_token) {
            Ok(claims) => claims,
            Err(e) => {
                let reason = match e {
                    JwtError::Expired => "expired",
                    _ => "invalid_signature",
                };
                debug!(reason, error = %e, "Refresh rejected");
                return Err(AuthError::RefreshRejected);
            }
        };

        let Some(user) = self.store.find_user_by_id(claims.sub, false).await? else {
            warn!(user_id = %claims.sub, reason = "inactive_or_missing", "Refresh rejected");
            return Err(AuthError::RefreshRejected);
        };

        let pair = self.issue(&user)?;
        let swapped = self
            .store
            .rotate_refresh_token(
                user.id,
                &fingerprint(refresh_token),
                &fingerprint(&pair.refresh_token),
            )
            .await?;

        if !swapped {
            warn!(user_id = %user.id, reason = "revoked_or_stale", "Refresh rejected");
            return Err(AuthError::RefreshRejected);
        }

        debug!(user_id = %user.id, "Refresh token rotated");
        Ok(pair)
    }

    /// Drops the user's refresh token
    ///
    /// Access tokens already issued stay valid until they expire.
    pub async fn logout(&self, user_id: Uuid) -> Result<(), AuthError> {
        if !self.store.clear_refresh_token(user_id).await? {
            return Err(AuthError::UserNotFound);
        }
        info!(user_id = %user_id, "User logged out");
        Ok(())
    }

    /// The per-request guard
    ///
    /// Takes the raw `Authorization` header value. Re-fetches the user on
    /// every call so deactivation and password changes take effect
    /// immediately.
    pub async fn authenticate_request(&self, header: Option<&str>) -> Result<Principal, AuthError> {
        let token = bearer_token(header).ok_or(AuthError::MissingToken)?;
        let claims = self.verify_access(token)?;

        let user = match self.store.find_user_by_id(claims.sub, true).await? {
            Some(user) if user.is_active => user,
            Some(_) => {
                debug!(user_id = %claims.sub, reason = "deactivated", "Request rejected");
                return Err(AuthError::SessionInvalid);
            }
            None => {
                debug!(user_id = %claims.sub, reason = "user_missing", "Request rejected");
                return Err(AuthError::SessionInvalid);
            }
        };

        if user.password_changed_since(claims.iat_ms) {
            debug!(user_id = %user.id, reason = "password_changed", "Request rejected");
            return Err(AuthError::SessionInvalid);
        }

        Ok(Principal::from(&user))
    }

    /// Replaces the password and starts a fresh session
    ///
    /// Every access token issued up to the change fails the guard from then
    /// on. The new pair is stamped strictly after the change so it passes.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<AuthSession, AuthError> {
        let user = self
            .store
            .find_user_by_id(user_id, false)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let matches =
            verify_password_async(current_password.to_string(), user.password_hash.clone())
                .await?;
        if !matches {
            debug!(user_id = %user.id, reason = "wrong_password", "Password change rejected");
            return Err(AuthError::WrongPassword);
        }

        let password_hash =
            hash_password_async(new_password.to_string(), self.password_params).await?;
        let changed_at = Utc::now();

        let pair = self
            .tokens
            .issue_pair_after(user.id, user.role, changed_at)
            .map_err(|e| AuthError::TokenIssue(e.to_string()))?;
        let user = self
            .store
            .update_password(
                user.id,
                &password_hash,
                changed_at,
                &fingerprint(&pair.refresh_token),
            )
            .await?
            .ok_or(AuthError::UserNotFound)?;

        info!(user_id = %user.id, "Password changed");

        Ok(AuthSession {
            user: user.profile(),
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        })
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<UserProfile, AuthError> {
        self.store
            .find_user_by_id(user_id, false)
            .await?
            .map(|user| user.profile())
            .ok_or(AuthError::UserNotFound)
    }

    /// Updates name and/or email
    ///
    /// A new email is normalized and hits the same uniqueness rule as
    /// registration.
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        changes: UserChanges,
    ) -> Result<UserProfile, AuthError> {
        let changes = UserChanges {
            name: changes.name.map(|name| name.trim().to_string()),
            email: changes.email.as_deref().map(normalize_email),
        };

        if changes.is_empty() {
            return self.profile(user_id).await;
        }

        let user = self
            .store
            .update_user(user_id, changes)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        debug!(user_id = %user.id, "Profile updated");
        Ok(user.profile())
    }
}
