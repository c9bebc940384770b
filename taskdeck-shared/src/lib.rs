//! # TaskDeck Shared Library
//!
//! Domain types, persistence and business logic used by the TaskDeck API
//! server and client.
//!
//! ## Module Organization
//!
//! - `models`: users, tasks and pagination types
//! - `store`: persistence traits with Postgres and in-memory implementations
//! - `db`: connection pool and embedded migrations
//! - `auth`: passwords, tokens, sessions and authorization checks
//! - `tasks`: ownership-checked task operations
//! - `users`: user administration and progress views
//! - `progress`: per-user completion aggregation

pub mod auth;
pub mod db;
pub mod models;
pub mod progress;
pub mod store;
pub mod tasks;
pub mod users;

/// Current version of the TaskDeck shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
