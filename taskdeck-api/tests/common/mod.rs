//! Common test utilities for integration tests
//!
//! Builds the full router over a fresh in-memory store with cheap Argon2
//! parameters, and wraps request/response plumbing.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::{json, Value};
use taskdeck_api::app::{build_router, AppState};
use taskdeck_api::config::{
    ApiConfig, Config, DatabaseConfig, Environment, JwtConfig, StorageBackend,
};
use taskdeck_shared::auth::password::PasswordParams;
use taskdeck_shared::store::memory::MemoryStore;
use tower::Service as _;
use uuid::Uuid;

pub const ACCESS_SECRET: &str = "integration-access-secret-0123456789abcdef";
pub const REFRESH_SECRET: &str = "integration-refresh-secret-0123456789abcdef";
pub const PASSWORD: &str = "secret1";

pub fn test_config() -> Config {
    Config {
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            environment: Environment::Development,
            cors_origins: vec!["http://localhost:3000".to_string()],
        },
        database: DatabaseConfig {
            backend: StorageBackend::Memory,
            url: String::new(),
            max_connections: 1,
            statement_timeout_secs: 45,
        },
        jwt: JwtConfig {
            secret: ACCESS_SECRET.to_string(),
            refresh_secret: REFRESH_SECRET.to_string(),
            expires_in_secs: 900,
            refresh_expires_in_secs: 604800,
        },
        password: PasswordParams {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        },
    }
}

/// A registered account and its current token pair
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub access_token: String,
    pub refresh_token: String,
}

impl TestUser {
    fn from_session(data: &Value) -> Self {
        Self {
            id: data["user"]["id"].as_str().unwrap().parse().unwrap(),
            email: data["user"]["email"].as_str().unwrap().to_string(),
            access_token: data["accessToken"].as_str().unwrap().to_string(),
            refresh_token: data["refreshToken"].as_str().unwrap().to_string(),
        }
    }
}

/// Test context containing the router and its backing store
pub struct TestContext {
    pub app: axum::Router,
    pub store: Arc<MemoryStore>,
}

impl TestContext {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(store.clone(), test_config());

        Self {
            app: build_router(state),
            store,
        }
    }

    /// Sends a request and returns the status and parsed JSON body
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }

        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.send_request(request).await
    }

    pub async fn send_request(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().call(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                panic!("Non-JSON body ({}): {}", status, String::from_utf8_lossy(&bytes))
            })
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::PATCH, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, Some(token), None).await
    }

    async fn register_with(&self, name: &str, email: &str, role: Option<&str>) -> TestUser {
        let mut body = json!({ "name": name, "email": email, "password": PASSWORD });
        if let Some(role) = role {
            body["role"] = json!(role);
        }

        let (status, json) = self.post("/api/v1/auth/register", None, body).await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", json);
        TestUser::from_session(&json["data"])
    }

    pub async fn register(&self, name: &str, email: &str) -> TestUser {
        self.register_with(name, email, None).await
    }

    pub async fn register_admin(&self, name: &str, email: &str) -> TestUser {
        self.register_with(name, email, Some("admin")).await
    }

    pub async fn login(&self, email: &str, password: &str) -> (StatusCode, Value) {
        self.post(
            "/api/v1/auth/login",
            None,
            json!({ "email": email, "password": password }),
        )
        .await
    }

    /// Creates a task and returns its JSON representation
    pub async fn create_task(&self, token: &str, body: Value) -> Value {
        let (status, json) = self.post("/api/v1/tasks", Some(token), body).await;
        assert_eq!(status, StatusCode::CREATED, "create task failed: {}", json);
        json["data"]["task"].clone()
    }
}
