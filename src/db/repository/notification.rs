use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::{parse_uuid, DatabaseError};
use crate::models::*;

pub fn insert_notification(conn: &Connection, n: &Notification) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO notifications
         (id, recipient_id, recipient_role, sender_id, sender_role, sender_name,
          appointment_id, type, title, message, appointment_date, appointment_time,
          is_read, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            n.id.to_string(),
            n.recipient_id.to_string(),
            n.recipient_role.as_str(),
            n.sender_id.to_string(),
            n.sender_role.as_str(),
            n.sender_name,
            n.appointment_id.map(|id| id.to_string()),
            n.notification_type.as_str(),
            n.title,
            n.message,
            n.appointment_date.to_string(),
            n.appointment_time,
            n.is_read as i32,
            n.created_at,
        ],
    )?;
    Ok(())
}

const NOTIFICATION_COLUMNS: &str =
    "id, recipient_id, recipient_role, sender_id, sender_role, sender_name,
     appointment_id, type, title, message, appointment_date, appointment_time,
     is_read, created_at";

type NotificationRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    String,
    String,
    String,
    String,
    String,
    bool,
    String,
);

fn map_notification(row: &rusqlite::Row<'_>) -> rusqlite::Result<NotificationRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
        row.get(11)?,
        row.get(12)?,
        row.get(13)?,
    ))
}

fn into_notification(row: NotificationRow) -> Result<Notification, DatabaseError> {
    let (
        id, recipient_id, recipient_role, sender_id, sender_role, sender_name,
        appointment_id, notification_type, title, message, appointment_date,
        appointment_time, is_read, created_at,
    ) = row;

    Ok(Notification {
        id: parse_uuid(&id)?,
        recipient_id: parse_uuid(&recipient_id)?,
        recipient_role: Role::from_str(&recipient_role)?,
        sender_id: parse_uuid(&sender_id)?,
        sender_role: Role::from_str(&sender_role)?,
        sender_name,
        appointment_id: appointment_id.map(|id| parse_uuid(&id)).transpose()?,
        notification_type: NotificationType::from_str(&notification_type)?,
        title,
        message,
        appointment_date: NaiveDate::parse_from_str(&appointment_date, "%Y-%m-%d")
            .map_err(|e| DatabaseError::ConstraintViolation(format!("notification date: {e}")))?,
        appointment_time,
        is_read,
        created_at,
    })
}

/// Newest-first inbox page for one recipient.
pub fn list_notifications(
    conn: &Connection,
    recipient_id: &Uuid,
    recipient_role: Role,
    limit: usize,
) -> Result<Vec<Notification>, DatabaseError> {
    let sql = format!(
        "SELECT {NOTIFICATION_COLUMNS} FROM notifications
         WHERE recipient_id = ?1 AND recipient_role = ?2
         ORDER BY created_at DESC, rowid DESC
         LIMIT ?3"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![recipient_id.to_string(), recipient_role.as_str(), limit as i64],
        map_notification,
    )?;

    let mut notifications = Vec::new();
    for row in rows {
        notifications.push(into_notification(row?)?);
    }
    Ok(notifications)
}

pub fn get_notification(conn: &Connection, id: &Uuid) -> Result<Option<Notification>, DatabaseError> {
    let sql = format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?1");
    conn.query_row(&sql, params![id.to_string()], map_notification)
        .optional()?
        .map(into_notification)
        .transpose()
}

/// Notifications attached to one appointment, oldest first.
pub fn list_notifications_for_appointment(
    conn: &Connection,
    appointment_id: &Uuid,
) -> Result<Vec<Notification>, DatabaseError> {
    let sql = format!(
        "SELECT {NOTIFICATION_COLUMNS} FROM notifications
         WHERE appointment_id = ?1 ORDER BY created_at ASC, rowid ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![appointment_id.to_string()], map_notification)?;

    let mut notifications = Vec::new();
    for row in rows {
        notifications.push(into_notification(row?)?);
    }
    Ok(notifications)
}

pub fn mark_notification_read(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE id = ?1",
        params![id.to_string()],
    )?;
    Ok(())
}

/// Returns how many notifications flipped from unread to read.
pub fn mark_all_notifications_read(
    conn: &Connection,
    recipient_id: &Uuid,
    recipient_role: Role,
) -> Result<usize, DatabaseError> {
    let changed = conn.execute(
        "UPDATE notifications SET is_read = 1
         WHERE recipient_id = ?1 AND recipient_role = ?2 AND is_read = 0",
        params![recipient_id.to_string(), recipient_role.as_str()],
    )?;
    Ok(changed)
}

pub fn count_unread_notifications(
    conn: &Connection,
    recipient_id: &Uuid,
    recipient_role: Role,
) -> Result<i64, DatabaseError> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM notifications
         WHERE recipient_id = ?1 AND recipient_role = ?2 AND is_read = 0",
        params![recipient_id.to_string(), recipient_role.as_str()],
        |row| row.get(0),
    )?)
}
