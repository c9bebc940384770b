//! TaskDeck API client
//!
//! Typed access to the TaskDeck REST API with a token cache and transparent,
//! coalesced session renewal. See [`ApiClient`].

pub mod client;
pub mod error;
pub mod single_flight;
pub mod types;

pub use client::ApiClient;
pub use error::{ClientError, ClientResult, FieldError};
pub use single_flight::SingleFlight;
pub use types::{CreateTask, TaskListParams, TaskUpdate};
