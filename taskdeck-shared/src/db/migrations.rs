/// Schema migrations
///
/// The SQL under `taskdeck-shared/migrations/` is compiled into the binary as
/// reversible `up`/`down` pairs. The API applies whatever is pending before it
/// starts listening with the Postgres backend, so deployments only need an
/// empty database.

use sqlx::migrate::{MigrateDatabase, MigrateError, Migrator};
use sqlx::postgres::PgPool;
use sqlx::Postgres;
use tracing::{debug, error, info};

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Applied versus embedded schema versions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub applied_migrations: usize,
    pub known_migrations: usize,
    pub latest_version: Option<i64>,
    pub is_up_to_date: bool,
}

impl MigrationStatus {
    fn new(applied: usize, latest_version: Option<i64>) -> Self {
        let known = known_migrations();
        Self {
            applied_migrations: applied,
            known_migrations: known,
            latest_version,
            is_up_to_date: applied >= known,
        }
    }
}

fn forward_versions() -> impl Iterator<Item = i64> {
    MIGRATOR
        .iter()
        .filter(|migration| !migration.migration_type.is_down_migration())
        .map(|migration| migration.version)
}

/// Forward migrations compiled into this build
pub fn known_migrations() -> usize {
    forward_versions().count()
}

/// Brings the schema up to the latest embedded version
///
/// Fails if a migration errors or if an already-applied migration was edited
/// after the fact (checksum mismatch).
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    let before = get_migration_status(pool).await.ok();
    if let Some(status) = &before {
        debug!(
            applied = status.applied_migrations,
            known = status.known_migrations,
            "Schema state before migrating"
        );
    }

    MIGRATOR.run(pool).await.map_err(|e| {
        error!(error = %e, "Schema migration failed");
        e
    })?;

    info!(version = ?forward_versions().max(), "Schema is current");
    Ok(())
}

pub async fn get_migration_status(pool: &PgPool) -> Result<MigrationStatus, sqlx::Error> {
    let tracked: Option<String> =
        sqlx::query_scalar("SELECT to_regclass('public._sqlx_migrations')::text")
            .fetch_one(pool)
            .await?;

    if tracked.is_none() {
        return Ok(MigrationStatus::new(0, None));
    }

    let (count, latest_version): (i64, Option<i64>) = sqlx::query_as(
        "SELECT COUNT(*), MAX(version) FROM _sqlx_migrations WHERE success",
    )
    .fetch_one(pool)
    .await?;

    Ok(MigrationStatus::new(
        usize::try_from(count).unwrap_or(0),
        latest_version,
    ))
}

/// Creates the target database when missing (local setups and the
/// Postgres-backed test suite)
pub async fn ensure_database_exists(database_url: &str) -> Result<(), sqlx::Error> {
    if Postgres::database_exists(database_url).await? {
        return Ok(());
    }

    info!("Creating missing database");
    Postgres::create_database(database_url).await
}
