//! Notification Inbox: per-recipient listing and read state.

use rusqlite::Connection;
use uuid::Uuid;

use crate::db::repository;
use crate::error::WorkflowError;
use crate::models::{Actor, Notification, Role};

/// Most notifications returned by one listing.
pub const INBOX_LIMIT: usize = 50;

fn ensure_owner(reader: &Actor, recipient_id: &Uuid, role: Role) -> Result<(), WorkflowError> {
    if reader.is(recipient_id, role) {
        Ok(())
    } else {
        Err(WorkflowError::forbidden("inbox belongs to another user"))
    }
}

/// Newest first, at most [`INBOX_LIMIT`] entries.
pub fn list(
    conn: &Connection,
    reader: &Actor,
    recipient_id: &Uuid,
    role: Role,
) -> Result<Vec<Notification>, WorkflowError> {
    ensure_owner(reader, recipient_id, role)?;
    Ok(repository::list_notifications(conn, recipient_id, role, INBOX_LIMIT)?)
}

pub fn unread_count(
    conn: &Connection,
    reader: &Actor,
    recipient_id: &Uuid,
    role: Role,
) -> Result<i64, WorkflowError> {
    ensure_owner(reader, recipient_id, role)?;
    Ok(repository::count_unread_notifications(conn, recipient_id, role)?)
}

/// Mark one notification read. Marking an already-read one succeeds.
pub fn mark_read(conn: &Connection, reader: &Actor, id: &Uuid) -> Result<(), WorkflowError> {
    let notification = repository::get_notification(conn, id)?
        .ok_or_else(|| WorkflowError::not_found("Notification", id))?;
    ensure_owner(reader, &notification.recipient_id, notification.recipient_role)?;
    if !notification.is_read {
        repository::mark_notification_read(conn, id)?;
    }
    Ok(())
}

/// Mark the whole inbox read; returns how many changed.
pub fn mark_all_read(
    conn: &Connection,
    reader: &Actor,
    recipient_id: &Uuid,
    role: Role,
) -> Result<usize, WorkflowError> {
    ensure_owner(reader, recipient_id, role)?;
    let changed = repository::mark_all_notifications_read(conn, recipient_id, role)?;
    tracing::debug!(recipient_id = %recipient_id, role = %role, changed, "Inbox marked read");
    Ok(changed)
}
