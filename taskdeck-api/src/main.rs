//! # TaskDeck API Server
//!
//! REST API for user accounts, task tracking and completion reporting.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://... JWT_SECRET=... JWT_REFRESH_SECRET=... \
//!     cargo run -p taskdeck-api
//! ```
//!
//! Set `STORAGE_BACKEND=memory` to run without PostgreSQL.

use std::sync::Arc;

use taskdeck_api::{
    app::{build_router, AppState},
    config::{Config, StorageBackend},
};
use taskdeck_shared::db::{
    migrations::run_migrations,
    pool::{close_pool, create_pool, DatabaseConfig},
};
use taskdeck_shared::store::{memory::MemoryStore, postgres::PgStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.api.is_production());

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        storage = %config.database.backend,
        "TaskDeck API server starting"
    );

    let (state, pool) = match config.database.backend {
        StorageBackend::Postgres => {
            let pool = create_pool(DatabaseConfig {
                url: config.database.url.clone(),
                max_connections: config.database.max_connections,
                statement_timeout_seconds: config.database.statement_timeout_secs,
                ..Default::default()
            })
            .await?;
            run_migrations(&pool).await?;

            let store = Arc::new(PgStore::new(pool.clone()));
            (AppState::new(store, config.clone()).with_pool(pool.clone()), Some(pool))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on restart");
            (AppState::new(Arc::new(MemoryStore::new()), config.clone()), None)
        }
    };

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    tracing::info!(address = %config.bind_address(), "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(pool) = pool {
        close_pool(pool).await;
    }

    tracing::info!("Server stopped");
    Ok(())
}

/// JSON lines in production, human-readable output otherwise
fn init_tracing(production: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "taskdeck_api=debug,taskdeck_shared=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(filter);
    if production {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections");
}
