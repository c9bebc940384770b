/// Integration tests for the credential and session manager
///
/// Runs against the in-memory store with cheap Argon2 parameters.

use std::sync::Arc;

use chrono::Duration;
use futures::future::join_all;
use taskdeck_shared::auth::jwt::{create_token, Claims, TokenConfig};
use taskdeck_shared::auth::password::PasswordParams;
use taskdeck_shared::auth::session::{AuthError, Registration, SessionManager};
use taskdeck_shared::models::user::{Role, UserChanges};
use taskdeck_shared::store::memory::MemoryStore;
use taskdeck_shared::store::UserStore;

const ACCESS_SECRET: &str = "session-test-access-secret-0123456789";
const REFRESH_SECRET: &str = "session-test-refresh-secret-0123456789";

fn setup() -> (Arc<MemoryStore>, SessionManager) {
    let store = Arc::new(MemoryStore::new());
    let sessions = SessionManager::new(
        store.clone(),
        TokenConfig::new(ACCESS_SECRET, REFRESH_SECRET),
        PasswordParams {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        },
    );
    (store, sessions)
}

fn registration(name: &str, email: &str) -> Registration {
    Registration {
        name: name.to_string(),
        email: email.to_string(),
        password: "secret1".to_string(),
        role: None,
    }
}

fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

#[tokio::test]
async fn test_register_issues_session() {
    let (store, sessions) = setup();

    let session = sessions
        .register(registration("Ada", "  Ada@Example.com "))
        .await
        .unwrap();

    assert_eq!(session.user.email, "ada@example.com");
    assert_eq!(session.user.role, Role::User);
    assert!(session.user.last_login_at.is_some());

    let stored = store
        .find_user_by_email("ada@example.com", true)
        .await
        .unwrap()
        .unwrap();
    assert_ne!(stored.password_hash, "secret1");
    assert_ne!(stored.refresh_token_hash.as_deref(), Some(session.refresh_token.as_str()));

    let json = serde_json::to_value(&session).unwrap();
    assert!(json["accessToken"].is_string());
    assert!(json["user"].get("passwordHash").is_none());
}

#[tokio::test]
async fn test_register_duplicate_email_case_insensitive() {
    let (_, sessions) = setup();
    sessions
        .register(registration("Ada", "ada@example.com"))
        .await
        .unwrap();

    let err = sessions
        .register(registration("Imposter", "ADA@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::EmailTaken));
}

#[tokio::test]
async fn test_register_conflicts_with_deactivated_account() {
    let (store, sessions) = setup();
    let session = sessions
        .register(registration("Ada", "ada@example.com"))
        .await
        .unwrap();
    store.deactivate_user(session.user.id).await.unwrap();

    let err = sessions
        .register(registration("Ada again", "ada@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::EmailTaken));
}

#[tokio::test]
async fn test_login_failures_share_one_message() {
    let (_, sessions) = setup();
    sessions
        .register(registration("Ada", "ada@example.com"))
        .await
        .unwrap();

    let unknown = sessions
        .login("nobody@example.com", "secret1")
        .await
        .unwrap_err();
    let wrong = sessions
        .login("ada@example.com", "wrong-password1")
        .await
        .unwrap_err();

    assert!(matches!(unknown, AuthError::InvalidCredentials));
    assert!(matches!(wrong, AuthError::InvalidCredentials));
    assert_eq!(unknown.to_string(), wrong.to_string());
    assert_eq!(unknown.to_string(), "Invalid email or password");
}

#[tokio::test]
async fn test_login_deactivated_account_is_forbidden() {
    let (store, sessions) = setup();
    let session = sessions
        .register(registration("Ada", "ada@example.com"))
        .await
        .unwrap();
    store.deactivate_user(session.user.id).await.unwrap();

    let err = sessions.login("ada@example.com", "secret1").await.unwrap_err();
    assert!(matches!(err, AuthError::AccountDeactivated));

    // Wrong password on a deactivated account still looks like bad credentials
    let err = sessions.login("ada@example.com", "nope12").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
}

#[tokio::test]
async fn test_login_replaces_previous_refresh_token() {
    let (_, sessions) = setup();
    let first = sessions
        .register(registration("Ada", "ada@example.com"))
        .await
        .unwrap();
    let second = sessions.login("ada@example.com", "secret1").await.unwrap();

    assert!(matches!(
        sessions.refresh(&first.refresh_token).await,
        Err(AuthError::RefreshRejected)
    ));
    assert!(sessions.refresh(&second.refresh_token).await.is_ok());
}

#[tokio::test]
async fn test_refresh_rotates_and_rejects_reuse() {
    let (_, sessions) = setup();
    let session = sessions
        .register(registration("Ada", "ada@example.com"))
        .await
        .unwrap();

    let pair = sessions.refresh(&session.refresh_token).await.unwrap();
    assert_ne!(pair.refresh_token, session.refresh_token);

    // The consumed token is dead; the new one works once
    assert!(matches!(
        sessions.refresh(&session.refresh_token).await,
        Err(AuthError::RefreshRejected)
    ));
    let next = sessions.refresh(&pair.refresh_token).await.unwrap();

    let principal = sessions
        .authenticate_request(Some(&bearer(&next.access_token)))
        .await
        .unwrap();
    assert_eq!(principal.id, session.user.id);
}

#[tokio::test]
async fn test_concurrent_refresh_has_single_winner() {
    let (_, sessions) = setup();
    let session = sessions
        .register(registration("Ada", "ada@example.com"))
        .await
        .unwrap();

    let attempts = (0..8).map(|_| sessions.refresh(&session.refresh_token));
    let results = join_all(attempts).await;

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, AuthError::RefreshRejected)));
}

#[tokio::test]
async fn test_refresh_rejects_access_token_and_garbage() {
    let (_, sessions) = setup();
    let session = sessions
        .register(registration("Ada", "ada@example.com"))
        .await
        .unwrap();

    assert!(matches!(
        sessions.refresh(&session.access_token).await,
        Err(AuthError::RefreshRejected)
    ));
    assert!(matches!(
        sessions.refresh("garbage").await,
        Err(AuthError::RefreshRejected)
    ));
}

#[tokio::test]
async fn test_logout_revokes_refresh_token() {
    let (_, sessions) = setup();
    let session = sessions
        .register(registration("Ada", "ada@example.com"))
        .await
        .unwrap();

    sessions.logout(session.user.id).await.unwrap();

    assert!(matches!(
        sessions.refresh(&session.refresh_token).await,
        Err(AuthError::RefreshRejected)
    ));
}

#[tokio::test]
async fn test_deactivated_user_cannot_refresh_or_authenticate() {
    let (store, sessions) = setup();
    let session = sessions
        .register(registration("Ada", "ada@example.com"))
        .await
        .unwrap();
    store.deactivate_user(session.user.id).await.unwrap();

    assert!(matches!(
        sessions.refresh(&session.refresh_token).await,
        Err(AuthError::RefreshRejected)
    ));
    assert!(matches!(
        sessions
            .authenticate_request(Some(&bearer(&session.access_token)))
            .await,
        Err(AuthError::SessionInvalid)
    ));
}

#[tokio::test]
async fn test_verify_access_distinguishes_expired() {
    let (_, sessions) = setup();
    let session = sessions
        .register(registration("Ada", "ada@example.com"))
        .await
        .unwrap();

    let expired = Claims::access(session.user.id, Role::User, Duration::seconds(-60));
    let token = create_token(&expired, ACCESS_SECRET).unwrap();
    assert!(matches!(
        sessions.verify_access(&token),
        Err(AuthError::TokenExpired)
    ));

    let forged = create_token(
        &Claims::access(session.user.id, Role::Admin, Duration::minutes(5)),
        "some-other-secret-that-is-long-enough",
    )
    .unwrap();
    assert!(matches!(
        sessions.verify_access(&forged),
        Err(AuthError::InvalidToken)
    ));

    let claims = sessions.verify_access(&session.access_token).unwrap();
    assert_eq!(claims.role, Some(Role::User));
}

#[tokio::test]
async fn test_authenticate_request_header_handling() {
    let (_, sessions) = setup();
    let session = sessions
        .register(registration("Ada", "ada@example.com"))
        .await
        .unwrap();

    assert!(matches!(
        sessions.authenticate_request(None).await,
        Err(AuthError::MissingToken)
    ));
    assert!(matches!(
        sessions
            .authenticate_request(Some(&format!("Basic {}", session.access_token)))
            .await,
        Err(AuthError::MissingToken)
    ));

    let principal = sessions
        .authenticate_request(Some(&bearer(&session.access_token)))
        .await
        .unwrap();
    assert_eq!(principal.email, "ada@example.com");
    assert_eq!(principal.name, "Ada");
}

#[tokio::test]
async fn test_change_password_invalidates_older_tokens() {
    let (_, sessions) = setup();
    let session = sessions
        .register(registration("Ada", "ada@example.com"))
        .await
        .unwrap();

    let err = sessions
        .change_password(session.user.id, "wrong-password1", "newsecret2")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::WrongPassword));

    let fresh = sessions
        .change_password(session.user.id, "secret1", "newsecret2")
        .await
        .unwrap();

    assert!(matches!(
        sessions
            .authenticate_request(Some(&bearer(&session.access_token)))
            .await,
        Err(AuthError::SessionInvalid)
    ));
    assert!(matches!(
        sessions.refresh(&session.refresh_token).await,
        Err(AuthError::RefreshRejected)
    ));

    // The pair issued by the change itself keeps working
    assert!(sessions
        .authenticate_request(Some(&bearer(&fresh.access_token)))
        .await
        .is_ok());
    assert!(sessions.refresh(&fresh.refresh_token).await.is_ok());

    assert!(sessions.login("ada@example.com", "newsecret2").await.is_ok());
    assert!(matches!(
        sessions.login("ada@example.com", "secret1").await,
        Err(AuthError::InvalidCredentials)
    ));
}

#[tokio::test]
async fn test_update_profile() {
    let (_, sessions) = setup();
    let ada = sessions
        .register(registration("Ada", "ada@example.com"))
        .await
        .unwrap();
    sessions
        .register(registration("Bob", "bob@example.com"))
        .await
        .unwrap();

    let updated = sessions
        .update_profile(
            ada.user.id,
            UserChanges {
                name: Some("  Ada L. ".to_string()),
                email: Some("ADA.L@Example.com".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Ada L.");
    assert_eq!(updated.email, "ada.l@example.com");

    let err = sessions
        .update_profile(
            ada.user.id,
            UserChanges {
                name: None,
                email: Some("Bob@example.com".to_string()),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::EmailTaken));

    let unchanged = sessions
        .update_profile(ada.user.id, UserChanges::default())
        .await
        .unwrap();
    assert_eq!(unchanged, updated);
}

#[tokio::test]
async fn test_register_with_role() {
    let (_, sessions) = setup();
    let mut input = registration("Root", "root@example.com");
    input.role = Some(Role::Admin);

    let session = sessions.register(input).await.unwrap();
    let principal = sessions
        .authenticate_request(Some(&bearer(&session.access_token)))
        .await
        .unwrap();
    assert!(principal.is_admin());
}

#[tokio::test]
async fn test_tokens_from_the_same_instant_die_with_a_password_change() {
    let (_, sessions) = setup();

    for i in 0..5 {
        let email = format!("user{}@example.com", i);
        let registered = sessions
            .register(registration("Ada", &email))
            .await
            .unwrap();
        let logged_in = sessions.login(&email, "secret1").await.unwrap();

        let fresh = sessions
            .change_password(registered.user.id, "secret1", "newsecret2")
            .await
            .unwrap();

        for old in [&registered.access_token, &logged_in.access_token] {
            assert!(matches!(
                sessions.authenticate_request(Some(&bearer(old))).await,
                Err(AuthError::SessionInvalid)
            ));
        }
        assert!(sessions
            .authenticate_request(Some(&bearer(&fresh.access_token)))
            .await
            .is_ok());

        // A pair rotated straight after the change is also accepted
        let rotated = sessions.refresh(&fresh.refresh_token).await.unwrap();
        assert!(sessions
            .authenticate_request(Some(&bearer(&rotated.access_token)))
            .await
            .is_ok());
    }
}
