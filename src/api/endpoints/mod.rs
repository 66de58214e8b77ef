//! API endpoint handlers.
//!
//! Handlers open their own connection, act as the session's `Actor`, and
//! delegate to the workflow modules.

pub mod appointments;
pub mod auth;
pub mod doctors;
pub mod health;
pub mod notifications;

use uuid::Uuid;

use crate::api::error::ApiError;

/// Parse a path segment as a UUID.
pub(crate) fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("invalid {what} id '{raw}'")))
}

/// Run password hashing and its DB work off the async workers.
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal(format!("blocking task failed: {e}")))?
}
