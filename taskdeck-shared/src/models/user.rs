/// User model
///
/// Users own tasks and hold the credentials used by the session manager.
/// The full [`User`] record is never serialized; everything that leaves the
/// service goes through [`UserProfile`].
///
/// # Schema
///
/// ```sql
/// CREATE TYPE user_role AS ENUM ('user', 'admin', 'manager');
///
/// CREATE TABLE users (
///     id UUID PRIMARY KEY,
///     name VARCHAR(50) NOT NULL,
///     email VARCHAR(255) NOT NULL,          -- unique, stored lowercase
///     password_hash VARCHAR(255) NOT NULL,  -- Argon2id PHC string
///     role user_role NOT NULL DEFAULT 'user',
///     is_active BOOLEAN NOT NULL DEFAULT TRUE,
///     refresh_token_hash VARCHAR(64),       -- SHA-256 of the live refresh token
///     last_login_at TIMESTAMPTZ,
///     password_changed_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```
/// use taskdeck_shared::models::user::{normalize_email, Role};
///
/// assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
/// assert_eq!("manager".parse::<Role>().unwrap(), Role::Manager);
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// User role
///
/// Closed set of roles. Only [`Role::Admin`] unlocks the administrative views.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular account, sees only its own tasks
    #[default]
    User,

    /// Full access to every task and user
    Admin,

    /// Team lead; currently the same permissions as `User`
    Manager,
}

impl Role {
    /// Gets role as string
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Manager => "manager",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// User record as stored
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    /// Unique user ID (UUID v4)
    pub id: Uuid,

    /// Display name (2-50 characters)
    pub name: String,

    /// Email address, always lowercase
    pub email: String,

    /// Argon2id password hash
    pub password_hash: String,

    pub role: Role,

    /// Deactivated users cannot log in or refresh
    pub is_active: bool,

    /// SHA-256 hex digest of the current refresh token
    ///
    /// `None` means there is no live session.
    pub refresh_token_hash: Option<String>,

    pub last_login_at: Option<DateTime<Utc>>,

    /// When the password was last changed
    ///
    /// Access tokens issued at or before this instant (millisecond
    /// precision) are rejected.
    pub password_changed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Builds the client-facing projection of this user
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            is_active: self.is_active,
            last_login_at: self.last_login_at,
            created_at: self.created_at,
        }
    }

    /// Checks whether the password changed at or after a token's `iat_ms`
    pub fn password_changed_since(&self, issued_at_ms: i64) -> bool {
        self.password_changed_at
            .map(|changed_at| changed_at.timestamp_millis() >= issued_at_ms)
            .unwrap_or(false)
    }
}

/// Sanitized user view
///
/// Never carries the password hash or the refresh token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a new user
///
/// The email must already be normalized and the password already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Profile fields a user may change about themselves
///
/// Only `Some` fields are written.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl UserChanges {
    /// Returns true when nothing would be updated
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none()
    }
}

/// Filter for the administrative user listing
#[derive(Debug, Clone)]
pub struct UserQuery {
    /// Restrict to a single role
    pub role: Option<Role>,

    /// Include deactivated accounts (excluded unless asked for)
    pub include_inactive: bool,

    /// 1-based page number
    pub page: u32,

    /// Page size
    pub limit: u32,
}

impl Default for UserQuery {
    fn default() -> Self {
        Self {
            role: None,
            include_inactive: false,
            page: 1,
            limit: 10,
        }
    }
}

/// Trims and lowercases an email address
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
