//! Notification fan-out and email delivery.
//!
//! Every booking and accepted transition produces one in-app notification
//! per interested party plus one email to the patient. Notifications and
//! the email row are written in a single transaction; the email itself is
//! sent later by the background dispatcher. Nothing in here can fail the
//! booking or transition that triggered it.

pub mod compose;
pub mod dispatcher;
pub mod email;
pub mod fanout;

pub use dispatcher::{deliver_due, start_email_dispatcher, EmailDispatcherHandle, EmailWaker, RetryPolicy};
pub use email::{EmailMessage, EmailTransport, HttpEmailTransport, LogTransport};
pub use fanout::{fan_out, interested_parties, resolve_admin_recipients, FanOutReport, Recipient};

use rusqlite::Connection;
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{Actor, Appointment, NotificationType};
use crate::transition::{FieldChange, TransitionOutcome};

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Notification storage failed: {0}")]
    Storage(#[from] DatabaseError),
    #[error("Email transport failed: {0}")]
    Transport(String),
    #[error("Email provider rejected message (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
}

impl From<rusqlite::Error> for DeliveryError {
    fn from(err: rusqlite::Error) -> Self {
        DeliveryError::Storage(DatabaseError::classify(err))
    }
}

/// Something that happened to an appointment and must be announced.
#[derive(Debug, Clone, Copy)]
pub struct AppointmentEvent<'a> {
    pub actor: &'a Actor,
    /// State after the event; its schedule is what notifications snapshot.
    pub appointment: &'a Appointment,
    pub notification_type: NotificationType,
    pub changes: &'a [FieldChange],
}

impl<'a> AppointmentEvent<'a> {
    pub fn booked(actor: &'a Actor, appointment: &'a Appointment) -> Self {
        Self {
            actor,
            appointment,
            notification_type: NotificationType::AppointmentBooked,
            changes: &[],
        }
    }

    pub fn transitioned(actor: &'a Actor, outcome: &'a TransitionOutcome) -> Self {
        Self {
            actor,
            appointment: &outcome.appointment,
            notification_type: NotificationType::for_status(outcome.appointment.status),
            changes: &outcome.changes,
        }
    }
}

/// Fan out an event, logging and swallowing any failure.
///
/// Returns the report on success so callers and tests can inspect what was
/// written; `None` means the event was committed but nobody was told.
pub fn notify(
    conn: &mut Connection,
    admin_recipients: &[Uuid],
    event: &AppointmentEvent<'_>,
    waker: Option<&EmailWaker>,
) -> Option<FanOutReport> {
    match fan_out(conn, admin_recipients, event) {
        Ok(report) => {
            if report.email_id.is_some() {
                if let Some(waker) = waker {
                    waker.wake();
                }
            }
            Some(report)
        }
        Err(e) => {
            tracing::error!(
                appointment_id = %event.appointment.id,
                notification_type = %event.notification_type,
                error = %e,
                "Notification fan-out failed"
            );
            None
        }
    }
}
