//! Typed HTTP client for the TaskDeck API
//!
//! [`ApiClient`] keeps the current token pair, attaches the access token to
//! every authenticated request and renews the session transparently:
//!
//! 1. A request outside `/auth/` fails with 401.
//! 2. If another request already replaced the token it used, the request is
//!    replayed with the current token.
//! 3. Otherwise the client joins (or starts) the single in-flight refresh and
//!    replays the request once with the rotated token.
//! 4. If the refresh itself fails, the tokens are dropped and the caller gets
//!    [`ClientError::Unauthorized`].
//!
//! Refresh tokens are single use on the server, so step 3 must never rotate
//! the same token twice. Concurrent 401s therefore share one refresh through
//! [`SingleFlight`].
//!
//! # Example
//!
//! ```no_run
//! use taskdeck_client::{ApiClient, CreateTask};
//!
//! # async fn example() -> Result<(), taskdeck_client::ClientError> {
//! let client = ApiClient::new("http://localhost:5000");
//! client.login("ada@example.com", "secret1").await?;
//!
//! let task = client.create_task(&CreateTask::titled("Write report")).await?;
//! println!("created {}", task.task.id);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use taskdeck_shared::auth::jwt::TokenPair;
use taskdeck_shared::auth::session::AuthSession;
use taskdeck_shared::models::page::Page;
use taskdeck_shared::models::task::{TaskStats, TaskView};
use taskdeck_shared::models::user::UserProfile;
use taskdeck_shared::progress::UserProgress;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ClientError, ClientResult};
use crate::single_flight::SingleFlight;
use crate::types::{
    CreateTask, Credentials, Envelope, ErrorBody, RefreshBody, Registration, TaskListParams,
    TaskUpdate,
};

const API_PREFIX: &str = "/api/v1";
const SESSION_EXPIRED: &str = "Session expired. Please log in again.";

#[derive(Deserialize)]
struct UserData {
    user: UserProfile,
}

#[derive(Deserialize)]
struct TaskData {
    task: TaskView,
}

#[derive(Deserialize)]
struct StatsData {
    stats: TaskStats,
}

#[derive(Deserialize)]
struct ProgressData {
    progress: UserProgress,
}

#[derive(Deserialize)]
struct ProgressReport {
    progress: Vec<UserProgress>,
}

struct Inner {
    http: reqwest::Client,
    base_url: String,
    tokens: RwLock<Option<TokenPair>>,

    /// Outcome is the new access token, `None` when the session is gone
    refresh: SingleFlight<Option<String>>,
}

/// TaskDeck API client
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

impl ApiClient {
    /// Creates a client for the server at `base_url` (e.g. `http://host:5000`)
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Creates a client reusing an existing [`reqwest::Client`]
    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            inner: Arc::new(Inner {
                http,
                base_url,
                tokens: RwLock::new(None),
                refresh: SingleFlight::new(),
            }),
        }
    }

    /// Current token pair, if a session is held
    pub async fn tokens(&self) -> Option<TokenPair> {
        self.inner.tokens.read().await.clone()
    }

    /// Adopts a previously stored token pair
    pub async fn set_tokens(&self, tokens: TokenPair) {
        *self.inner.tokens.write().await = Some(tokens);
    }

    /// Drops the local session without contacting the server
    pub async fn clear_tokens(&self) {
        *self.inner.tokens.write().await = None;
    }

    pub async fn is_authenticated(&self) -> bool {
        self.inner.tokens.read().await.is_some()
    }

    // ---- auth ----

    pub async fn register(&self, name: &str, email: &str, password: &str) -> ClientResult<AuthSession> {
        let body = Registration {
            name,
            email,
            password,
        };
        let session: AuthSession = self
            .public(Method::POST, "/auth/register", &body)
            .await?
            .data
            .ok_or(ClientError::MissingData)?;
        self.adopt(&session).await;
        Ok(session)
    }

    pub async fn login(&self, email: &str, password: &str) -> ClientResult<AuthSession> {
        let session: AuthSession = self
            .public(Method::POST, "/auth/login", &Credentials { email, password })
            .await?
            .data
            .ok_or(ClientError::MissingData)?;
        self.adopt(&session).await;
        Ok(session)
    }

    /// Revokes the refresh token on the server and forgets the session
    ///
    /// The local tokens are dropped even when the server call fails.
    pub async fn logout(&self) -> ClientResult<()> {
        let result: ClientResult<Envelope<serde_json::Value>> = self
            .authed(|http, url| http.post(url), "/auth/logout", None::<&()>)
            .await;
        self.clear_tokens().await;
        result.map(|_| ())
    }

    pub async fn me(&self) -> ClientResult<UserProfile> {
        let data: UserData = self.get("/auth/me").await?;
        Ok(data.user)
    }

    pub async fn change_password(&self, current: &str, new: &str) -> ClientResult<AuthSession> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Body<'a> {
            current_password: &'a str,
            new_password: &'a str,
        }

        let session: AuthSession = self
            .authed(
                |http, url| http.post(url),
                "/auth/change-password",
                Some(&Body {
                    current_password: current,
                    new_password: new,
                }),
            )
            .await?
            .data
            .ok_or(ClientError::MissingData)?;
        self.adopt(&session).await;
        Ok(session)
    }

    // ---- tasks ----

    pub async fn list_tasks(&self, params: &TaskListParams) -> ClientResult<Page<TaskView>> {
        let envelope: Envelope<Vec<TaskView>> = self
            .authed(|http, url| http.get(url).query(params), "/tasks", None::<&()>)
            .await?;

        let items = envelope.data.ok_or(ClientError::MissingData)?;
        let meta = envelope.pagination.ok_or(ClientError::MissingData)?;
        Ok(Page {
            items,
            total: meta.total,
            page: meta.page,
            limit: meta.limit,
        })
    }

    pub async fn create_task(&self, task: &CreateTask) -> ClientResult<TaskView> {
        let data: TaskData = self
            .authed(|http, url| http.post(url), "/tasks", Some(task))
            .await?
            .data
            .ok_or(ClientError::MissingData)?;
        Ok(data.task)
    }

    pub async fn get_task(&self, id: Uuid) -> ClientResult<TaskView> {
        let data: TaskData = self.get(&format!("/tasks/{}", id)).await?;
        Ok(data.task)
    }

    pub async fn update_task(&self, id: Uuid, changes: &TaskUpdate) -> ClientResult<TaskView> {
        let data: TaskData = self
            .authed(|http, url| http.patch(url), &format!("/tasks/{}", id), Some(changes))
            .await?
            .data
            .ok_or(ClientError::MissingData)?;
        Ok(data.task)
    }

    pub async fn delete_task(&self, id: Uuid) -> ClientResult<()> {
        let _: Envelope<serde_json::Value> = self
            .authed(|http, url| http.delete(url), &format!("/tasks/{}", id), None::<&()>)
            .await?;
        Ok(())
    }

    pub async fn task_stats(&self) -> ClientResult<TaskStats> {
        let data: StatsData = self.get("/tasks/stats").await?;
        Ok(data.stats)
    }

    // ---- progress ----

    pub async fn my_progress(&self) -> ClientResult<UserProgress> {
        let data: ProgressData = self.get("/users/me/progress").await?;
        Ok(data.progress)
    }

    /// Ranked progress of every user (admin only)
    pub async fn all_progress(&self, include_inactive: bool) -> ClientResult<Vec<UserProgress>> {
        let report: ProgressReport = self
            .authed(
                |http, url| http.get(url).query(&[("includeInactive", include_inactive)]),
                "/admin/progress",
                None::<&()>,
            )
            .await?
            .data
            .ok_or(ClientError::MissingData)?;
        Ok(report.progress)
    }

    // ---- transport ----

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.inner.base_url, API_PREFIX, path)
    }

    async fn adopt(&self, session: &AuthSession) {
        self.set_tokens(TokenPair {
            access_token: session.access_token.clone(),
            refresh_token: session.refresh_token.clone(),
        })
        .await;
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.authed(|http, url| http.get(url), path, None::<&()>)
            .await?
            .data
            .ok_or(ClientError::MissingData)
    }

    /// Unauthenticated request; a 401 here is final
    async fn public<B, T>(&self, method: Method, path: &str, body: &B) -> ClientResult<Envelope<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .inner
            .http
            .request(method, self.url(path))
            .json(body)
            .send()
            .await?;
        parse(response).await
    }

    /// Authenticated request with one refresh-and-replay on 401
    ///
    /// Session endpoints under `/auth/` report their 401 as-is.
    async fn authed<T, B>(
        &self,
        build: impl Fn(&reqwest::Client, String) -> RequestBuilder,
        path: &str,
        body: Option<&B>,
    ) -> ClientResult<Envelope<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let send = |token: String| {
            let mut request = build(&self.inner.http, self.url(path)).bearer_auth(token);
            if let Some(body) = body {
                request = request.json(body);
            }
            request.send()
        };

        let token = self.access_token().await?;
        let response = send(token.clone()).await?;
        if response.status() != StatusCode::UNAUTHORIZED || path.starts_with("/auth/") {
            return parse(response).await;
        }

        debug!(path, "Access token rejected; renewing session");
        let fresh = self
            .renew(token)
            .await
            .ok_or_else(|| ClientError::Unauthorized(SESSION_EXPIRED.to_string()))?;

        parse(send(fresh).await?).await
    }

    async fn access_token(&self) -> ClientResult<String> {
        self.inner
            .tokens
            .read()
            .await
            .as_ref()
            .map(|tokens| tokens.access_token.clone())
            .ok_or(ClientError::NotAuthenticated)
    }

    /// New access token after `stale` was rejected
    async fn renew(&self, stale: String) -> Option<String> {
        {
            let tokens = self.inner.tokens.read().await;
            match tokens.as_ref() {
                Some(current) if current.access_token != stale => {
                    return Some(current.access_token.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }

        let inner = self.inner.clone();
        self.inner
            .refresh
            .run(move || async move { inner.rotate(stale).await })
            .await
    }
}

impl Inner {
    /// Exchanges the held refresh token for a new pair
    async fn rotate(&self, stale: String) -> Option<String> {
        let refresh_token = {
            let tokens = self.tokens.read().await;
            match tokens.as_ref() {
                // Renewed between the 401 and this flight starting
                Some(current) if current.access_token != stale => {
                    return Some(current.access_token.clone());
                }
                Some(current) => current.refresh_token.clone(),
                None => return None,
            }
        };

        match self.exchange(&refresh_token).await {
            Ok(pair) => {
                let access = pair.access_token.clone();
                *self.tokens.write().await = Some(pair);
                debug!("Session renewed");
                Some(access)
            }
            Err(err) => {
                warn!(error = %err, "Token refresh failed; dropping session");
                *self.tokens.write().await = None;
                None
            }
        }
    }

    async fn exchange(&self, refresh_token: &str) -> ClientResult<TokenPair> {
        let response = self
            .http
            .post(format!("{}{}/auth/refresh-token", self.base_url, API_PREFIX))
            .json(&RefreshBody { refresh_token })
            .send()
            .await?;

        parse::<TokenPair>(response)
            .await?
            .data
            .ok_or(ClientError::MissingData)
    }
}

async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<Envelope<T>> {
    let status = response.status();
    let bytes = response.bytes().await?;

    if status.is_success() {
        return Ok(serde_json::from_slice(&bytes)?);
    }

    let body: ErrorBody = serde_json::from_slice(&bytes).unwrap_or_else(|_| ErrorBody {
        message: String::from_utf8_lossy(&bytes).into_owned(),
        errors: Vec::new(),
    });

    Err(if status == StatusCode::UNAUTHORIZED {
        ClientError::Unauthorized(body.message)
    } else {
        ClientError::Api {
            status: status.as_u16(),
            message: body.message,
            errors: body.errors,
        }
    })
}
