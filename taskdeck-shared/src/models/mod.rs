/// Domain models for TaskDeck
///
/// # Models
///
/// - `user`: accounts, roles and the sanitized [`user::UserProfile`]
/// - `task`: tasks, their status/priority enums, filters and stats
/// - `page`: offset pagination shared by every listing
///
/// Persistence lives in [`crate::store`]; these types carry no I/O.

pub mod page;
pub mod task;
pub mod user;
