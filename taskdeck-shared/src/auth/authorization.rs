/// Authorization helpers and permission checks
///
/// Two rules cover every protected operation:
///
/// 1. **Role gates**: administrative views require one of a set of roles
/// 2. **Ownership**: a task may be read or changed by its owner or an admin
///
/// Both are pure functions over a [`Principal`]; nothing here touches the
/// store.
///
/// # Example
///
/// ```
/// use taskdeck_shared::auth::authorization::{authorize, can_modify_task};
/// use taskdeck_shared::auth::principal::Principal;
/// use taskdeck_shared::models::user::Role;
/// use uuid::Uuid;
///
/// let admin = Principal {
///     id: Uuid::new_v4(),
///     name: "Root".to_string(),
///     email: "root@example.com".to_string(),
///     role: Role::Admin,
/// };
///
/// assert!(authorize(&admin, &[Role::Admin]).is_ok());
/// assert!(can_modify_task(&admin, Uuid::new_v4()));
/// ```

use uuid::Uuid;

use super::principal::Principal;
use crate::models::user::Role;

/// Error type for authorization checks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    /// Caller's role is not in the allowed set
    #[error("Insufficient permissions: requires {}, has {actual}", format_roles(.required))]
    InsufficientRole { required: Vec<Role>, actual: Role },

    /// Caller neither owns the task nor is an admin
    #[error("Access denied: not your task")]
    NotOwner,
}

fn format_roles(roles: &[Role]) -> String {
    roles
        .iter()
        .map(Role::as_str)
        .collect::<Vec<_>>()
        .join(" or ")
}

/// Requires the principal to hold one of `required`
///
/// An empty `required` set admits any authenticated caller.
pub fn authorize(principal: &Principal, required: &[Role]) -> Result<(), AuthzError> {
    if required.is_empty() || required.contains(&principal.role) {
        return Ok(());
    }

    Err(AuthzError::InsufficientRole {
        required: required.to_vec(),
        actual: principal.role,
    })
}

/// Owner or admin
pub fn can_modify_task(principal: &Principal, owner_id: Uuid) -> bool {
    principal.id == owner_id || principal.is_admin()
}

/// [`can_modify_task`] as a `Result`
pub fn require_task_access(principal: &Principal, owner_id: Uuid) -> Result<(), AuthzError> {
    if can_modify_task(principal, owner_id) {
        Ok(())
    } else {
        Err(AuthzError::NotOwner)
    }
}
