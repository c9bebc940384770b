/// Middleware modules for the API server
///
/// - `auth`: bearer token guard for protected routes
/// - `security`: security response headers

pub mod auth;
pub mod security;
