/// Configuration management for the API server
///
/// Configuration is read from environment variables (a `.env` file is loaded
/// first when present).
///
/// # Environment Variables
///
/// - `APP_ENV`: `development` (default) or `production`
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 5000)
/// - `ALLOWED_ORIGINS`: Comma separated CORS origins (default: http://localhost:3000)
/// - `STORAGE_BACKEND`: `postgres` (default) or `memory`
/// - `DATABASE_URL`: PostgreSQL connection string (required for `postgres`)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `DATABASE_STATEMENT_TIMEOUT_SECS`: Per-statement timeout (default: 45)
/// - `JWT_SECRET`: Access token signing secret (required, 32+ characters)
/// - `JWT_REFRESH_SECRET`: Refresh token signing secret (required, 32+ characters)
/// - `JWT_EXPIRES_IN_SECS`: Access token lifetime (default: 900)
/// - `JWT_REFRESH_EXPIRES_IN_SECS`: Refresh token lifetime (default: 604800)
/// - `ARGON2_MEMORY_KIB`, `ARGON2_ITERATIONS`, `ARGON2_PARALLELISM`: hashing cost
///
/// # Example
///
/// ```no_run
/// use taskdeck_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use std::env;
use std::fmt;
use std::str::FromStr;

use taskdeck_shared::auth::password::PasswordParams;

/// Minimum length of either signing secret
pub const MIN_SECRET_LEN: usize = 32;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,

    /// Argon2 cost parameters for new password hashes
    pub password: PasswordParams,
}

/// Deployment environment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => anyhow::bail!("Unknown APP_ENV: {}", other),
        }
    }
}

/// Where users and tasks are persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StorageBackend {
    #[default]
    Postgres,

    /// Process-local store, lost on restart
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => anyhow::bail!("Unknown STORAGE_BACKEND: {}", other),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::Postgres => f.write_str("postgres"),
            StorageBackend::Memory => f.write_str("memory"),
        }
    }
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub environment: Environment,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,
}

impl ApiConfig {
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub backend: StorageBackend,

    /// PostgreSQL connection URL, empty for the memory backend
    pub url: String,

    pub max_connections: u32,
    pub statement_timeout_secs: u64,
}

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret key for access tokens
    ///
    /// Generate with: `openssl rand -hex 32`
    pub secret: String,

    /// Secret key for refresh tokens, distinct from `secret`
    pub refresh_secret: String,

    pub expires_in_secs: i64,
    pub refresh_expires_in_secs: i64,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing, a value does not
    /// parse, or the signing secrets are too short or identical.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let environment = var("APP_ENV", "development").parse::<Environment>()?;
        let api_port = var("API_PORT", "5000")
            .parse::<u16>()
            .map_err(|e| anyhow::anyhow!("Invalid API_PORT: {}", e))?;

        let cors_origins = var("ALLOWED_ORIGINS", "http://localhost:3000")
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let backend = var("STORAGE_BACKEND", "postgres").parse::<StorageBackend>()?;
        let database_url = match (backend, lookup("DATABASE_URL")) {
            (StorageBackend::Postgres, None) => {
                anyhow::bail!("DATABASE_URL environment variable is required")
            }
            (_, url) => url.unwrap_or_default(),
        };

        let max_connections = var("DATABASE_MAX_CONNECTIONS", "10")
            .parse::<u32>()
            .map_err(|e| anyhow::anyhow!("Invalid DATABASE_MAX_CONNECTIONS: {}", e))?;
        let statement_timeout_secs = var("DATABASE_STATEMENT_TIMEOUT_SECS", "45")
            .parse::<u64>()
            .map_err(|e| anyhow::anyhow!("Invalid DATABASE_STATEMENT_TIMEOUT_SECS: {}", e))?;

        let jwt_secret = lookup("JWT_SECRET")
            .ok_or_else(|| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;
        let jwt_refresh_secret = lookup("JWT_REFRESH_SECRET")
            .ok_or_else(|| anyhow::anyhow!("JWT_REFRESH_SECRET environment variable is required"))?;

        if jwt_secret.len() < MIN_SECRET_LEN {
            anyhow::bail!("JWT_SECRET must be at least {} characters long", MIN_SECRET_LEN);
        }
        if jwt_refresh_secret.len() < MIN_SECRET_LEN {
            anyhow::bail!(
                "JWT_REFRESH_SECRET must be at least {} characters long",
                MIN_SECRET_LEN
            );
        }
        if jwt_secret == jwt_refresh_secret {
            anyhow::bail!("JWT_SECRET and JWT_REFRESH_SECRET must differ");
        }

        let expires_in_secs = var("JWT_EXPIRES_IN_SECS", "900")
            .parse::<i64>()
            .map_err(|e| anyhow::anyhow!("Invalid JWT_EXPIRES_IN_SECS: {}", e))?;
        let refresh_expires_in_secs = var("JWT_REFRESH_EXPIRES_IN_SECS", "604800")
            .parse::<i64>()
            .map_err(|e| anyhow::anyhow!("Invalid JWT_REFRESH_EXPIRES_IN_SECS: {}", e))?;
        if expires_in_secs <= 0 || refresh_expires_in_secs <= 0 {
            anyhow::bail!("Token lifetimes must be positive");
        }

        let defaults = PasswordParams::default();
        let password = PasswordParams {
            memory_kib: parse_or(&lookup, "ARGON2_MEMORY_KIB", defaults.memory_kib)?,
            iterations: parse_or(&lookup, "ARGON2_ITERATIONS", defaults.iterations)?,
            parallelism: parse_or(&lookup, "ARGON2_PARALLELISM", defaults.parallelism)?,
        };

        Ok(Self {
            api: ApiConfig {
                host: var("API_HOST", "0.0.0.0"),
                port: api_port,
                environment,
                cors_origins,
            },
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
                statement_timeout_secs,
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                refresh_secret: jwt_refresh_secret,
                expires_in_secs,
                refresh_expires_in_secs,
            },
            password,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

fn parse_or<F>(lookup: &F, key: &str, default: u32) -> anyhow::Result<u32>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .parse::<u32>()
            .map_err(|e| anyhow::anyhow!("Invalid {}: {}", key, e)),
        None => Ok(default),
    }
}
