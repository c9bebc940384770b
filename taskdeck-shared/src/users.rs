/// User administration and progress views
///
/// Admin-only listing and deactivation of accounts, plus the two progress
/// views: a caller's own completion figure and the ranked report across all
/// users.

use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::authorization::{authorize, AuthzError};
use crate::auth::principal::Principal;
use crate::models::{
    page::{clamp_paging, Page},
    user::{Role, UserProfile, UserQuery},
};
use crate::progress::{compute_progress, ProgressScope, UserProgress};
use crate::store::{DynStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("User not found")]
    NotFound,

    #[error(transparent)]
    Forbidden(#[from] AuthzError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Listing parameters for the admin user list
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListQuery {
    pub role: Option<Role>,
    #[serde(default)]
    pub include_inactive: bool,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Clone)]
pub struct UserService {
    store: DynStore,
}

impl UserService {
    pub fn new(store: DynStore) -> Self {
        Self { store }
    }

    pub async fn list(
        &self,
        principal: &Principal,
        query: UserListQuery,
    ) -> Result<Page<UserProfile>, UserError> {
        authorize(principal, &[Role::Admin])?;

        let (page, limit) = clamp_paging(query.page, query.limit);
        let users = self
            .store
            .list_users(&UserQuery {
                role: query.role,
                include_inactive: query.include_inactive,
                page,
                limit,
            })
            .await?;

        Ok(users.map(|user| user.profile()))
    }

    /// Deactivates an account and revokes its refresh token
    ///
    /// The user's outstanding access tokens fail the request guard from the
    /// next request on.
    pub async fn deactivate(
        &self,
        principal: &Principal,
        user_id: Uuid,
    ) -> Result<UserProfile, UserError> {
        authorize(principal, &[Role::Admin])?;

        let user = self
            .store
            .deactivate_user(user_id)
            .await?
            .ok_or(UserError::NotFound)?;

        warn!(user_id = %user.id, deactivated_by = %principal.id, "User deactivated");
        Ok(user.profile())
    }

    /// The caller's own completion figure
    pub async fn my_progress(&self, principal: &Principal) -> Result<UserProgress, UserError> {
        compute_progress(self.store.as_ref(), ProgressScope::SingleUser(principal.id))
            .await?
            .into_iter()
            .next()
            .ok_or(UserError::NotFound)
    }

    /// Ranked completion report across users (admin only)
    pub async fn all_progress(
        &self,
        principal: &Principal,
        include_inactive: bool,
    ) -> Result<Vec<UserProgress>, UserError> {
        authorize(principal, &[Role::Admin])?;

        let progress =
            compute_progress(self.store.as_ref(), ProgressScope::AllUsers { include_inactive })
                .await?;

        info!(users = progress.len(), "Progress report generated");
        Ok(progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task::{Task, TaskPriority, TaskStatus};
    use crate::models::user::NewUser;
    use crate::store::memory::MemoryStore;
    use crate::store::{TaskStore, UserStore};
    use chrono::Utc;
    use std::sync::Arc;

    async fn principal(store: &MemoryStore, name: &str, role: Role) -> Principal {
        let user = store
            .create_user(NewUser {
                name: name.to_string(),
                email: format!("{}@example.com", name.to_lowercase()),
                password_hash: "hash".to_string(),
                role,
            })
            .await
            .unwrap();
        Principal::from(&user)
    }

    async fn add_task(store: &MemoryStore, owner: Uuid, status: TaskStatus) {
        let now = Utc::now();
        store
            .insert_task(Task {
                id: Uuid::new_v4(),
                title: "Some task".to_string(),
                description: String::new(),
                status,
                priority: TaskPriority::Medium,
                due_date: None,
                tags: vec![],
                owner_id: owner,
                assigned_to: None,
                completed_at: (status == TaskStatus::Done).then_some(now),
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_list_requires_admin() {
        let store = Arc::new(MemoryStore::new());
        let service = UserService::new(store.clone());
        let ada = principal(&store, "Ada", Role::User).await;
        let root = principal(&store, "Root", Role::Admin).await;

        assert!(matches!(
            service.list(&ada, UserListQuery::default()).await,
            Err(UserError::Forbidden(_))
        ));

        let page = service.list(&root, UserListQuery::default()).await.unwrap();
        assert_eq!(page.total, 2);

        let query = UserListQuery {
            role: Some(Role::Admin),
            ..Default::default()
        };
        let admins = service.list(&root, query).await.unwrap();
        assert_eq!(admins.items.len(), 1);
        assert_eq!(admins.items[0].id, root.id);
    }

    #[tokio::test]
    async fn test_deactivate_hides_user_from_listing() {
        let store = Arc::new(MemoryStore::new());
        let service = UserService::new(store.clone());
        let ada = principal(&store, "Ada", Role::User).await;
        let root = principal(&store, "Root", Role::Admin).await;

        let profile = service.deactivate(&root, ada.id).await.unwrap();
        assert!(!profile.is_active);

        let page = service.list(&root, UserListQuery::default()).await.unwrap();
        assert_eq!(page.total, 1);

        let query = UserListQuery {
            include_inactive: true,
            ..Default::default()
        };
        let page = service.list(&root, query).await.unwrap();
        assert_eq!(page.total, 2);

        assert!(matches!(
            service.deactivate(&root, Uuid::new_v4()).await,
            Err(UserError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_progress_views() {
        let store = Arc::new(MemoryStore::new());
        let service = UserService::new(store.clone());
        let zed = principal(&store, "Zed", Role::User).await;
        let amy = principal(&store, "Amy", Role::User).await;
        let root = principal(&store, "Root", Role::Admin).await;

        for status in [TaskStatus::Done, TaskStatus::Done, TaskStatus::Done, TaskStatus::Todo] {
            add_task(&store, zed.id, status).await;
        }
        add_task(&store, amy.id, TaskStatus::Done).await;
        add_task(&store, amy.id, TaskStatus::Review).await;

        let mine = service.my_progress(&zed).await.unwrap();
        assert_eq!(mine.progress, 75);
        assert_eq!(mine.total_tasks, 4);

        let empty = service.my_progress(&root).await.unwrap();
        assert_eq!(empty.progress, 0);

        assert!(service.all_progress(&zed, false).await.is_err());

        let report = service.all_progress(&root, false).await.unwrap();
        let names: Vec<&str> = report.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Zed", "Amy", "Root"]);
    }
}
