/// Signed session tokens
///
/// A session is a pair of HS256 JWTs. The access token names the user and
/// their role and accompanies every request; the refresh token names only the
/// user and is traded in at `/auth/refresh-token` for a new pair. The two
/// kinds use separate secrets, and each carries a `token_type` claim, so one
/// can never stand in for the other. A random `jti` keeps tokens issued
/// within the same second distinct.
///
/// ```
/// use taskdeck_shared::auth::jwt::TokenConfig;
/// use taskdeck_shared::models::user::Role;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), taskdeck_shared::auth::jwt::JwtError> {
/// let tokens = TokenConfig::new(
///     "access-secret-key-at-least-32-bytes-long",
///     "refresh-secret-key-at-least-32-bytes-long",
/// );
///
/// let owner = Uuid::new_v4();
/// let pair = tokens.issue_pair(owner, Role::User)?;
/// assert_eq!(tokens.verify_access(&pair.access_token)?.sub, owner);
/// assert!(tokens.verify_refresh(&pair.access_token).is_err());
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::Role;

/// `iss` claim on every TaskDeck token
pub const ISSUER: &str = "taskdeck-api";

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Could not sign token: {0}")]
    CreateError(String),

    #[error("Token rejected: {0}")]
    ValidationError(String),

    #[error("Token has expired")]
    Expired,

    /// Well-formed and correctly signed, but the other kind
    #[error("Expected {expected} token, got {actual} token")]
    WrongType {
        expected: &'static str,
        actual: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    /// 15 minutes for access, 7 days for refresh
    pub fn default_ttl(self) -> Duration {
        match self {
            TokenType::Access => Duration::minutes(15),
            TokenType::Refresh => Duration::days(7),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

/// Token payload
///
/// `role` is only present on access tokens; a refresh re-reads the role from
/// the store so promotions take effect on the next pair. `iat_ms` is the issue
/// time in milliseconds, which the request guard compares against the last
/// password change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iss: String,
    pub iat: i64,
    pub iat_ms: i64,
    pub nbf: i64,
    pub exp: i64,
    pub jti: Uuid,
    pub token_type: TokenType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl Claims {
    fn issued_now(sub: Uuid, token_type: TokenType, role: Option<Role>, ttl: Duration) -> Self {
        let now = Utc::now();
        let seconds = now.timestamp();
        Self {
            sub,
            iss: ISSUER.to_string(),
            iat: seconds,
            iat_ms: now.timestamp_millis(),
            nbf: seconds,
            exp: seconds + ttl.num_seconds(),
            jti: Uuid::new_v4(),
            token_type,
            role,
        }
    }

    pub fn access(user_id: Uuid, role: Role, ttl: Duration) -> Self {
        Self::issued_now(user_id, TokenType::Access, Some(role), ttl)
    }

    pub fn refresh(user_id: Uuid, ttl: Duration) -> Self {
        Self::issued_now(user_id, TokenType::Refresh, None, ttl)
    }
}

/// Signs `claims` with HS256
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| JwtError::CreateError(e.to_string()))
}

/// Checks signature, issuer, `exp`/`nbf` (no leeway) and token kind
fn verify_token(token: &str, secret: &str, expected: TokenType) -> Result<Claims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_nbf = true;
    validation.leeway = 0;

    let claims = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            _ => JwtError::ValidationError(e.to_string()),
        })?
        .claims;

    if claims.token_type != expected {
        return Err(JwtError::WrongType {
            expected: expected.as_str(),
            actual: claims.token_type.as_str(),
        });
    }

    Ok(claims)
}

/// Access and refresh token handed to the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Secrets and lifetimes for issuing sessions
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl TokenConfig {
    pub fn new(access_secret: impl Into<String>, refresh_secret: impl Into<String>) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            access_ttl: TokenType::Access.default_ttl(),
            refresh_ttl: TokenType::Refresh.default_ttl(),
        }
    }

    pub fn with_ttls(mut self, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        self.access_ttl = access_ttl;
        self.refresh_ttl = refresh_ttl;
        self
    }

    pub fn issue_pair(&self, user_id: Uuid, role: Role) -> Result<TokenPair, JwtError> {
        let access = Claims::access(user_id, role, self.access_ttl);
        let refresh = Claims::refresh(user_id, self.refresh_ttl);
        self.sign_pair(&access, &refresh)
    }

    /// Issues a pair whose `iat_ms` is strictly later than `after`
    ///
    /// Used right after a password change, so the new pair clears the guard
    /// even when it is minted within the same millisecond.
    pub fn issue_pair_after(
        &self,
        user_id: Uuid,
        role: Role,
        after: DateTime<Utc>,
    ) -> Result<TokenPair, JwtError> {
        let floor = after.timestamp_millis() + 1;

        let mut access = Claims::access(user_id, role, self.access_ttl);
        access.iat_ms = access.iat_ms.max(floor);
        let mut refresh = Claims::refresh(user_id, self.refresh_ttl);
        refresh.iat_ms = refresh.iat_ms.max(floor);

        self.sign_pair(&access, &refresh)
    }

    fn sign_pair(&self, access: &Claims, refresh: &Claims) -> Result<TokenPair, JwtError> {
        Ok(TokenPair {
            access_token: create_token(access, &self.access_secret)?,
            refresh_token: create_token(refresh, &self.refresh_secret)?,
        })
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, JwtError> {
        verify_token(token, &self.access_secret, TokenType::Access)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims, JwtError> {
        verify_token(token, &self.refresh_secret, TokenType::Refresh)
    }
}
