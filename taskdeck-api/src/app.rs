/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskdeck_api::{app::{build_router, AppState}, config::Config};
/// use taskdeck_shared::store::memory::MemoryStore;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let state = AppState::new(Arc::new(MemoryStore::new()), config);
/// let app = build_router(state);
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:5000").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, patch, post},
    Router,
};
use sqlx::PgPool;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{
    config::Config,
    middleware::{auth::require_auth, security::SecurityHeadersLayer},
    routes,
};
use taskdeck_shared::auth::jwt::TokenConfig;
use taskdeck_shared::auth::session::SessionManager;
use taskdeck_shared::store::DynStore;
use taskdeck_shared::tasks::TaskService;
use taskdeck_shared::users::UserService;

/// Largest accepted request body
pub const BODY_LIMIT_BYTES: usize = 10 * 1024;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor; every field
/// is a cheap handle.
#[derive(Clone)]
pub struct AppState {
    pub store: DynStore,
    pub sessions: SessionManager,
    pub tasks: TaskService,
    pub users: UserService,
    pub config: Arc<Config>,

    /// Postgres pool, when that backend is in use; reported by `/health`
    pub pool: Option<PgPool>,
}

impl AppState {
    pub fn new(store: DynStore, config: Config) -> Self {
        let tokens = TokenConfig::new(config.jwt.secret.clone(), config.jwt.refresh_secret.clone())
            .with_ttls(
                chrono::Duration::seconds(config.jwt.expires_in_secs),
                chrono::Duration::seconds(config.jwt.refresh_expires_in_secs),
            );

        Self {
            sessions: SessionManager::new(store.clone(), tokens, config.password),
            tasks: TaskService::new(store.clone()),
            users: UserService::new(store.clone()),
            store,
            config: Arc::new(config),
            pool: None,
        }
    }

    /// Attaches the Postgres pool for health reporting
    pub fn with_pool(mut self, pool: PgPool) -> Self {
        self.pool = Some(pool);
        self
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// ```text
/// /
/// └── /api/v1
///     ├── GET  /health
///     ├── /auth
///     │   ├── POST  /register, /login, /refresh-token     (public)
///     │   └── POST  /logout, /change-password, GET|PATCH /me
///     ├── /tasks
///     │   ├── GET|POST /, GET /stats, GET /admin/all
///     │   └── GET|PATCH|DELETE /:id
///     ├── /users
///     │   ├── GET /, PATCH /:id/deactivate
///     │   └── GET /me/progress, GET /admin/progress
///     └── /admin
///         └── GET /progress
/// ```
///
/// Everything except health, register, login and refresh passes the bearer
/// token guard. Unmatched paths get a 404 envelope.
pub fn build_router(state: AppState) -> Router {
    let guard = axum::middleware::from_fn_with_state(state.clone(), require_auth);

    let public_auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh-token", post(routes::auth::refresh_token));

    let session_routes = Router::new()
        .route("/logout", post(routes::auth::logout))
        .route(
            "/me",
            get(routes::auth::get_me).patch(routes::auth::update_me),
        )
        .route("/change-password", post(routes::auth::change_password))
        .route_layer(guard.clone());

    let task_routes = Router::new()
        .route(
            "/",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        )
        .route("/stats", get(routes::tasks::task_stats))
        .route("/admin/all", get(routes::tasks::list_all_tasks))
        .route(
            "/:id",
            get(routes::tasks::get_task)
                .patch(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route_layer(guard.clone());

    let user_routes = Router::new()
        .route("/", get(routes::users::list_users))
        .route("/:id/deactivate", patch(routes::users::deactivate_user))
        .route("/me/progress", get(routes::users::my_progress))
        .route("/admin/progress", get(routes::admin::all_progress))
        .route_layer(guard.clone());

    let admin_routes = Router::new()
        .route("/progress", get(routes::admin::all_progress))
        .route_layer(guard);

    let v1_routes = Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/auth", public_auth_routes.merge(session_routes))
        .nest("/tasks", task_routes)
        .nest("/users", user_routes)
        .nest("/admin", admin_routes);

    Router::new()
        .route("/", get(routes::health::root))
        .nest("/api/v1", v1_routes)
        .fallback(routes::not_found)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.api.is_production()))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.api.cors_origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}
