use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::{parse_uuid, DatabaseError};
use crate::models::OutboxStatus;

/// One queued email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxEmail {
    pub id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub status: OutboxStatus,
    pub attempts: u32,
    pub next_attempt_at: String,
    pub last_error: Option<String>,
}

const OUTBOX_COLUMNS: &str =
    "id, appointment_id, recipient, subject, body, status, attempts, next_attempt_at, last_error";

type OutboxRow = (
    String,
    Option<String>,
    String,
    String,
    String,
    String,
    u32,
    String,
    Option<String>,
);

fn map_email(row: &rusqlite::Row<'_>) -> rusqlite::Result<OutboxRow> {
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
    ))
}

fn into_email(row: OutboxRow) -> Result<OutboxEmail, DatabaseError> {
    let (id, appointment_id, recipient, subject, body, status, attempts, next_attempt_at, last_error) =
        row;
    Ok(OutboxEmail {
        id: parse_uuid(&id)?,
        appointment_id: appointment_id.map(|id| parse_uuid(&id)).transpose()?,
        recipient,
        subject,
        body,
        status: OutboxStatus::from_str(&status)?,
        attempts,
        next_attempt_at,
        last_error,
    })
}

/// Queue an email for immediate delivery.
pub fn enqueue_email(
    conn: &Connection,
    id: &Uuid,
    appointment_id: Option<&Uuid>,
    recipient: &str,
    subject: &str,
    body: &str,
    now: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO email_outbox
         (id, appointment_id, recipient, subject, body, status, attempts, next_attempt_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 'pending', 0, ?6, ?6)",
        params![
            id.to_string(),
            appointment_id.map(|a| a.to_string()),
            recipient,
            subject,
            body,
            now,
        ],
    )?;
    Ok(())
}

/// Pending emails whose next attempt is due at `now`, oldest first.
pub fn due_emails(
    conn: &Connection,
    now: &str,
    limit: usize,
) -> Result<Vec<OutboxEmail>, DatabaseError> {
    let sql = format!(
        "SELECT {OUTBOX_COLUMNS} FROM email_outbox
         WHERE status = 'pending' AND next_attempt_at <= ?1
         ORDER BY next_attempt_at ASC, rowid ASC
         LIMIT ?2"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![now, limit as i64], map_email)?;

    let mut emails = Vec::new();
    for row in rows {
        emails.push(into_email(row?)?);
    }
    Ok(emails)
}

pub fn get_outbox_email(conn: &Connection, id: &Uuid) -> Result<Option<OutboxEmail>, DatabaseError> {
    let sql = format!("SELECT {OUTBOX_COLUMNS} FROM email_outbox WHERE id = ?1");
    conn.query_row(&sql, params![id.to_string()], map_email)
        .optional()?
        .map(into_email)
        .transpose()
}

pub fn list_outbox_for_appointment(
    conn: &Connection,
    appointment_id: &Uuid,
) -> Result<Vec<OutboxEmail>, DatabaseError> {
    let sql = format!(
        "SELECT {OUTBOX_COLUMNS} FROM email_outbox WHERE appointment_id = ?1 ORDER BY rowid ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![appointment_id.to_string()], map_email)?;

    let mut emails = Vec::new();
    for row in rows {
        emails.push(into_email(row?)?);
    }
    Ok(emails)
}

pub fn mark_email_sent(conn: &Connection, id: &Uuid, now: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE email_outbox
         SET status = 'sent', attempts = attempts + 1, sent_at = ?1, last_error = NULL
         WHERE id = ?2",
        params![now, id.to_string()],
    )?;
    Ok(())
}

/// Record a failed attempt. `retry_at = None` gives up on the message.
pub fn record_email_failure(
    conn: &Connection,
    id: &Uuid,
    error: &str,
    retry_at: Option<&str>,
) -> Result<(), DatabaseError> {
    match retry_at {
        Some(at) => conn.execute(
            "UPDATE email_outbox
             SET attempts = attempts + 1, last_error = ?1, next_attempt_at = ?2
             WHERE id = ?3",
            params![error, at, id.to_string()],
        )?,
        None => conn.execute(
            "UPDATE email_outbox
             SET attempts = attempts + 1, last_error = ?1, status = 'failed'
             WHERE id = ?2",
            params![error, id.to_string()],
        )?,
    };
    Ok(())
}
