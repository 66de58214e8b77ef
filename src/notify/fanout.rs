use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::db::{repository, timestamp_now, DatabaseError};
use crate::models::{Actor, Appointment, Notification, Role};

use super::compose;
use super::{AppointmentEvent, DeliveryError};

/// Someone who should hear about an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub id: Uuid,
    pub role: Role,
}

/// What a fan-out wrote.
#[derive(Debug, Clone)]
pub struct FanOutReport {
    pub notifications: Vec<Notification>,
    /// Outbox row for the patient email; `None` when the patient is gone.
    pub email_id: Option<Uuid>,
}

/// The non-actor side of an event.
///
/// Patient acting: doctor and admins. Doctor acting: patient and admins.
/// Admin acting: patient and doctor. The actor is never included.
pub fn interested_parties(actor: &Actor, appt: &Appointment, admins: &[Uuid]) -> Vec<Recipient> {
    let patient = Recipient {
        id: appt.patient_id,
        role: Role::Patient,
    };
    let doctor = Recipient {
        id: appt.doctor_id,
        role: Role::Doctor,
    };
    let admin_recipients = admins.iter().map(|&id| Recipient {
        id,
        role: Role::Admin,
    });

    let candidates: Vec<Recipient> = match actor.role {
        Role::Patient => std::iter::once(doctor).chain(admin_recipients).collect(),
        Role::Doctor => std::iter::once(patient).chain(admin_recipients).collect(),
        Role::Admin => vec![patient, doctor],
    };

    let mut parties: Vec<Recipient> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if actor.is(&candidate.id, candidate.role) || parties.contains(&candidate) {
            continue;
        }
        parties.push(candidate);
    }
    parties
}

/// Configured admin ids, or every admin account when none are configured.
pub fn resolve_admin_recipients(
    conn: &Connection,
    configured: &[Uuid],
) -> Result<Vec<Uuid>, DatabaseError> {
    if !configured.is_empty() {
        return Ok(configured.to_vec());
    }
    repository::list_admin_ids(conn)
}

/// Write one notification per interested party and queue the patient email,
/// all in one transaction.
pub fn fan_out(
    conn: &mut Connection,
    admin_recipients: &[Uuid],
    event: &AppointmentEvent<'_>,
) -> Result<FanOutReport, DeliveryError> {
    let appt = event.appointment;
    let admins = resolve_admin_recipients(conn, admin_recipients)?;
    let parties = interested_parties(event.actor, appt, &admins);
    if admins.is_empty() && event.actor.role != Role::Admin {
        tracing::warn!(appointment_id = %appt.id, "No admin recipients configured or registered");
    }

    let title = compose::title(event.notification_type);
    let message = compose::message(event);
    let now = timestamp_now();

    let tx = conn.transaction()?;

    let mut notifications = Vec::with_capacity(parties.len());
    for party in &parties {
        let notification = Notification {
            id: Uuid::new_v4(),
            recipient_id: party.id,
            recipient_role: party.role,
            sender_id: event.actor.id,
            sender_role: event.actor.role,
            sender_name: event.actor.name.clone(),
            appointment_id: Some(appt.id),
            notification_type: event.notification_type,
            title: title.to_string(),
            message: message.clone(),
            appointment_date: appt.date,
            appointment_time: appt.time.clone(),
            is_read: false,
            created_at: now.clone(),
        };
        repository::insert_notification(&tx, &notification)?;
        notifications.push(notification);
    }

    let email_id = match repository::get_patient(&tx, &appt.patient_id)? {
        Some(patient) => {
            let email = compose::patient_email(event, &patient);
            let id = Uuid::new_v4();
            repository::enqueue_email(
                &tx,
                &id,
                Some(&appt.id),
                &email.to,
                &email.subject,
                &email.body,
                &now,
            )?;
            Some(id)
        }
        None => {
            tracing::warn!(
                appointment_id = %appt.id,
                patient_id = %appt.patient_id,
                "Patient record missing, email skipped"
            );
            None
        }
    };

    tx.commit()?;

    tracing::info!(
        appointment_id = %appt.id,
        notification_type = %event.notification_type,
        recipients = notifications.len(),
        email_queued = email_id.is_some(),
        "Notifications fanned out"
    );

    Ok(FanOutReport {
        notifications,
        email_id,
    })
}
