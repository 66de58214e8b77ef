//! Notification and email text. Rendered once, when the event happens;
//! stored notifications never change afterwards.

use crate::models::{NotificationType, Patient};

use super::email::EmailMessage;
use super::AppointmentEvent;

pub fn title(kind: NotificationType) -> &'static str {
    match kind {
        NotificationType::AppointmentBooked => "Appointment booked",
        NotificationType::AppointmentCleared => "Appointment completed",
        NotificationType::AppointmentDelayed => "Appointment rescheduled",
        NotificationType::AppointmentCanceled => "Appointment canceled",
        NotificationType::AppointmentUpdated => "Appointment updated",
    }
}

fn verb(kind: NotificationType) -> &'static str {
    match kind {
        NotificationType::AppointmentBooked => "booked",
        NotificationType::AppointmentCleared => "completed",
        NotificationType::AppointmentDelayed => "rescheduled",
        NotificationType::AppointmentCanceled => "canceled",
        NotificationType::AppointmentUpdated => "updated",
    }
}

/// One-line message embedding the actor's name and the diff.
///
/// `Dr. Grey rescheduled the appointment on 2025-03-02 at 10:00
/// (status: booked → rescheduled; date: 2025-03-01 → 2025-03-02; time: 09:00 → 10:00).`
pub fn message(event: &AppointmentEvent<'_>) -> String {
    let appt = event.appointment;
    let mut text = format!(
        "{} {} the appointment on {} at {}",
        event.actor.name,
        verb(event.notification_type),
        appt.date,
        appt.time
    );
    if event.changes.is_empty() {
        if event.notification_type == NotificationType::AppointmentUpdated {
            text.push_str(" (notes changed)");
        }
    } else {
        let summary: Vec<String> = event.changes.iter().map(|c| c.summary()).collect();
        text.push_str(&format!(" ({})", summary.join("; ")));
    }
    text.push('.');
    text
}

/// The patient's copy of the event.
pub fn patient_email(event: &AppointmentEvent<'_>, patient: &Patient) -> EmailMessage {
    let mut body = format!("Dear {},\n\n{}\n", patient.name, message(event));
    if let Some(notes) = event.appointment.notes.as_deref() {
        body.push_str(&format!("\nNotes: {notes}\n"));
    }
    body.push_str("\nYou can review your appointments at any time in OptiDoc.\n");

    EmailMessage {
        to: patient.email.clone(),
        subject: format!("OptiDoc: {}", title(event.notification_type)),
        body,
    }
}
