/// Integration tests for user administration and progress reporting

mod common;

use axum::http::StatusCode;
use common::{TestContext, TestUser};
use serde_json::{json, Value};

async fn add_tasks(ctx: &TestContext, user: &TestUser, statuses: &[&str]) {
    for (i, status) in statuses.iter().enumerate() {
        ctx.create_task(
            &user.access_token,
            json!({ "title": format!("Task number {}", i), "status": status }),
        )
        .await;
    }
}

fn names(report: &Value) -> Vec<String> {
    report["data"]["progress"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["name"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_my_progress() {
    let ctx = TestContext::new();
    let ada = ctx.register("Ada", "ada@example.com").await;

    let (status, json) = ctx.get("/api/v1/users/me/progress", &ada.access_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["progress"]["progress"], 0);
    assert_eq!(json["data"]["progress"]["totalTasks"], 0);

    add_tasks(&ctx, &ada, &["done", "done", "done", "todo"]).await;

    let (_, json) = ctx.get("/api/v1/users/me/progress", &ada.access_token).await;
    let progress = &json["data"]["progress"];
    assert_eq!(progress["userId"], ada.id.to_string());
    assert_eq!(progress["totalTasks"], 4);
    assert_eq!(progress["completedTasks"], 3);
    assert_eq!(progress["progress"], 75);
}

#[tokio::test]
async fn test_progress_rounds_to_whole_percent() {
    let ctx = TestContext::new();
    let ada = ctx.register("Ada", "ada@example.com").await;
    add_tasks(&ctx, &ada, &["done", "todo", "review"]).await;

    let (_, json) = ctx.get("/api/v1/users/me/progress", &ada.access_token).await;
    assert_eq!(json["data"]["progress"]["progress"], 33);
}

#[tokio::test]
async fn test_admin_progress_ranking() {
    let ctx = TestContext::new();
    let zed = ctx.register("Zed", "zed@example.com").await;
    let amy = ctx.register("Amy", "amy@example.com").await;
    let bea = ctx.register("Bea", "bea@example.com").await;
    let root = ctx.register_admin("Root", "root@example.com").await;

    // Zed and Amy tie at 50%; Bea leads at 100%; Root has no tasks
    add_tasks(&ctx, &zed, &["done", "todo"]).await;
    add_tasks(&ctx, &amy, &["done", "in-progress"]).await;
    add_tasks(&ctx, &bea, &["done"]).await;

    let (status, json) = ctx.get("/api/v1/admin/progress", &root.access_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "All users progress fetched successfully");
    assert_eq!(json["data"]["results"], 4);
    assert_eq!(names(&json), vec!["Bea", "Amy", "Zed", "Root"]);

    // Legacy path serves the same report
    let (status, legacy) = ctx
        .get("/api/v1/users/admin/progress", &root.access_token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(names(&legacy), names(&json));
}

#[tokio::test]
async fn test_admin_progress_excludes_deactivated_by_default() {
    let ctx = TestContext::new();
    let ada = ctx.register("Ada", "ada@example.com").await;
    let root = ctx.register_admin("Root", "root@example.com").await;
    add_tasks(&ctx, &ada, &["done"]).await;

    let (status, _) = ctx
        .patch(
            &format!("/api/v1/users/{}/deactivate", ada.id),
            &root.access_token,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = ctx.get("/api/v1/admin/progress", &root.access_token).await;
    assert_eq!(names(&json), vec!["Root"]);

    let (_, json) = ctx
        .get("/api/v1/admin/progress?includeInactive=true", &root.access_token)
        .await;
    assert_eq!(names(&json), vec!["Ada", "Root"]);
}

#[tokio::test]
async fn test_admin_routes_reject_regular_users() {
    let ctx = TestContext::new();
    let ada = ctx.register("Ada", "ada@example.com").await;
    let bob = ctx.register("Bob", "bob@example.com").await;

    let (status, json) = ctx.get("/api/v1/admin/progress", &ada.access_token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["success"], false);

    let (status, _) = ctx.get("/api/v1/users", &ada.access_token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx
        .patch(
            &format!("/api/v1/users/{}/deactivate", bob.id),
            &ada.access_token,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_user_listing() {
    let ctx = TestContext::new();
    let root = ctx.register_admin("Root", "root@example.com").await;
    for name in ["Ada", "Bob", "Cy"] {
        ctx.register(name, &format!("{}@example.com", name.to_lowercase()))
            .await;
    }

    let (status, json) = ctx
        .get("/api/v1/users?limit=2", &root.access_token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Users fetched successfully");
    assert_eq!(json["data"].as_array().unwrap().len(), 2);
    assert_eq!(json["pagination"]["total"], 4);
    assert!(json["data"][0].get("passwordHash").is_none());

    let (_, json) = ctx
        .get("/api/v1/users?role=admin", &root.access_token)
        .await;
    assert_eq!(json["pagination"]["total"], 1);

    let (status, json) = ctx
        .patch("/api/v1/users/42/deactivate", &root.access_token, json!({}))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["errors"][0]["message"], "Invalid user ID format");

    let (status, _) = ctx
        .patch(
            &format!("/api/v1/users/{}/deactivate", uuid::Uuid::new_v4()),
            &root.access_token,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
